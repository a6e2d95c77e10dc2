//! Wiring of every Waypoint component around one shared keyed store.

use std::sync::Arc;

use waypoint_contracts::{config::WaypointConfig, context::PlanContext};
use waypoint_core::{
    traits::{Clock, SystemClock},
    PlanExecutor, PlanGenerator, PlanStore,
};
use waypoint_memory::KeyedMemoryStore;
use waypoint_rules::RuleEngine;
use waypoint_store::{InMemoryKeyedStore, KeyedStore};

use crate::mock_data::{MockToolbox, ScriptedCompletion, StaticKnowledgeBase};

pub const AGENT_ID: &str = "assistant-1";
pub const OWNER_ID: &str = "owner-1";

/// A fully wired assistant: planner, executor, rules and memory over one
/// in-memory store, with mock tools and a scripted model.
///
/// Handles to the mocks are kept so callers can inspect what the runtime
/// did.
pub struct AssistantRuntime {
    pub store: Arc<InMemoryKeyedStore>,
    pub toolbox: Arc<MockToolbox>,
    pub completion: Arc<ScriptedCompletion>,
    pub rules: Arc<RuleEngine>,
    pub memory: Arc<KeyedMemoryStore>,
    pub planner: PlanGenerator,
    pub executor: PlanExecutor,
}

impl AssistantRuntime {
    pub fn new(config: &WaypointConfig, toolbox: MockToolbox, completion: ScriptedCompletion) -> Self {
        Self::with_clock(config, toolbox, completion, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &WaypointConfig,
        toolbox: MockToolbox,
        completion: ScriptedCompletion,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(InMemoryKeyedStore::new());
        let shared: Arc<dyn KeyedStore> = store.clone();

        let toolbox = Arc::new(toolbox);
        let completion = Arc::new(completion);
        let rules = Arc::new(RuleEngine::new(shared.clone()));
        let memory = Arc::new(
            KeyedMemoryStore::new(shared.clone(), config.memory.clone()).with_clock(clock.clone()),
        );
        let plans = PlanStore::new(shared);

        let planner = PlanGenerator::new(
            plans.clone(),
            completion.clone(),
            memory.clone(),
            config.planner.clone(),
        )
        .with_knowledge_base(Arc::new(StaticKnowledgeBase))
        .with_clock(clock.clone());

        let executor = PlanExecutor::new(
            plans,
            rules.clone(),
            memory.clone(),
            toolbox.clone(),
            completion.clone(),
            config.executor.clone(),
        )
        .with_clock(clock);

        Self {
            store,
            toolbox,
            completion,
            rules,
            memory,
            planner,
            executor,
        }
    }

    /// The planning context for the reference agent.
    pub fn context(&self) -> PlanContext {
        PlanContext {
            agent_id: AGENT_ID.to_string(),
            owner_id: OWNER_ID.to_string(),
            available_tools: MockToolbox::tool_names(),
            knowledge_base_ids: vec!["kb-handbook".to_string()],
            constraints: vec!["Post digests to #me only".to_string()],
        }
    }
}
