//! Persisted rule engine.
//!
//! `RuleEngine` stores rules in each agent's partition of a `KeyedStore` and
//! implements the `RuleEvaluator` trait from waypoint-core.
//!
//! Evaluation algorithm:
//!
//! 1. Load the agent's enabled rules.
//! 2. Order them by `created_at`, then stably by `priority` descending, so
//!    equal-priority rules keep their creation order.
//! 3. For each rule whose conditions hold, record it and append its actions.
//!    A rule carrying `stop_execution` sets `should_stop` and ends the walk;
//!    lower-priority rules are never looked at.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use waypoint_contracts::{
    context::EvaluationContext,
    error::{WaypointError, WaypointResult},
    rule::{Action, ActionKind, Condition, Rule, RuleDefinition, RuleEvaluation, RuleUpdate},
};
use waypoint_core::traits::RuleEvaluator;
use waypoint_store::{agent_partition, rule_key, KeyedStore, KeyedStoreExt, RULE_PREFIX};

use crate::condition::{conditions_hold, validate_condition};

/// Shape of a TOML rule file: a list of `[[rules]]` tables.
///
/// ```toml
/// [[rules]]
/// name = "no-external-mail"
/// kind = "guardrail"
/// priority = 100
///
/// [[rules.conditions]]
/// field = "input.to"
/// operator = "regex"
/// value = "@partner\\.org$"
///
/// [[rules.actions]]
/// kind = "stop_execution"
/// params = { reason = "external recipients need review" }
/// ```
#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

/// The Waypoint rule engine.
///
/// ```rust,ignore
/// let engine = RuleEngine::new(store.clone());
/// engine.seed_from_file("agent-1", "owner-1", Path::new("rules/assistant.toml"))?;
/// let eval = engine.evaluate_rules(&ctx)?;
/// ```
#[derive(Clone)]
pub struct RuleEngine {
    store: Arc<dyn KeyedStore>,
}

impl RuleEngine {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }

    // ── Management ────────────────────────────────────────────────────────────

    /// Validate and persist a new rule for `agent_id`.
    pub fn create_rule(
        &self,
        agent_id: &str,
        owner_id: &str,
        definition: RuleDefinition,
    ) -> WaypointResult<Rule> {
        validate_definition(&definition)?;

        let now = Utc::now();
        let rule = Rule {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            owner_id: owner_id.to_string(),
            name: definition.name,
            description: definition.description,
            kind: definition.kind,
            priority: definition.priority,
            enabled: definition.enabled,
            conditions: definition.conditions,
            actions: definition.actions,
            created_at: now,
            updated_at: now,
        };

        self.store
            .put_json(&agent_partition(agent_id), &rule_key(&rule.id), &rule)?;
        info!(rule_id = %rule.id, agent_id = %agent_id, name = %rule.name, "rule created");
        Ok(rule)
    }

    /// Apply the `Some` fields of `update`. The result is validated as a
    /// whole before anything is written.
    pub fn update_rule(
        &self,
        agent_id: &str,
        rule_id: &str,
        update: RuleUpdate,
    ) -> WaypointResult<Rule> {
        let mut rule = self.require(agent_id, rule_id)?;

        if let Some(name) = update.name {
            rule.name = name;
        }
        if let Some(description) = update.description {
            rule.description = description;
        }
        if let Some(kind) = update.kind {
            rule.kind = kind;
        }
        if let Some(priority) = update.priority {
            rule.priority = priority;
        }
        if let Some(enabled) = update.enabled {
            rule.enabled = enabled;
        }
        if let Some(conditions) = update.conditions {
            rule.conditions = conditions;
        }
        if let Some(actions) = update.actions {
            rule.actions = actions;
        }

        validate_parts(&rule.name, &rule.conditions, &rule.actions)?;
        rule.updated_at = Utc::now();

        self.store
            .update_json(&agent_partition(agent_id), &rule_key(rule_id), &rule)?;
        debug!(rule_id = %rule_id, agent_id = %agent_id, "rule updated");
        Ok(rule)
    }

    pub fn delete_rule(&self, agent_id: &str, rule_id: &str) -> WaypointResult<()> {
        if self.store.delete(&agent_partition(agent_id), &rule_key(rule_id))? {
            info!(rule_id = %rule_id, agent_id = %agent_id, "rule deleted");
            Ok(())
        } else {
            Err(WaypointError::not_found("rule", rule_id))
        }
    }

    /// Flip `enabled` and return the updated rule.
    pub fn toggle_rule(&self, agent_id: &str, rule_id: &str) -> WaypointResult<Rule> {
        let mut rule = self.require(agent_id, rule_id)?;
        rule.enabled = !rule.enabled;
        rule.updated_at = Utc::now();

        self.store
            .update_json(&agent_partition(agent_id), &rule_key(rule_id), &rule)?;
        info!(rule_id = %rule_id, enabled = rule.enabled, "rule toggled");
        Ok(rule)
    }

    pub fn get_rule(&self, agent_id: &str, rule_id: &str) -> WaypointResult<Option<Rule>> {
        self.store
            .get_json(&agent_partition(agent_id), &rule_key(rule_id))
    }

    /// Every rule of the agent, enabled or not, in creation order.
    pub fn list_rules(&self, agent_id: &str) -> WaypointResult<Vec<Rule>> {
        self.store
            .query_json(&agent_partition(agent_id), Some(RULE_PREFIX))
    }

    // ── Seeding ───────────────────────────────────────────────────────────────

    /// Create every `[[rules]]` table in `s`, in declaration order.
    ///
    /// Returns `WaypointError::Config` if the TOML is malformed, and
    /// `Validation` for the first rule that fails validation. All rules are
    /// validated before any is written.
    pub fn seed_from_toml(
        &self,
        agent_id: &str,
        owner_id: &str,
        s: &str,
    ) -> WaypointResult<Vec<Rule>> {
        let file: RuleFile = toml::from_str(s).map_err(|e| WaypointError::Config {
            reason: format!("failed to parse rule TOML: {}", e),
        })?;

        for definition in &file.rules {
            validate_definition(definition)?;
        }

        file.rules
            .into_iter()
            .map(|definition| self.create_rule(agent_id, owner_id, definition))
            .collect()
    }

    /// Read the file at `path` and seed its rules.
    pub fn seed_from_file(
        &self,
        agent_id: &str,
        owner_id: &str,
        path: &Path,
    ) -> WaypointResult<Vec<Rule>> {
        let contents = std::fs::read_to_string(path).map_err(|e| WaypointError::Config {
            reason: format!("failed to read rule file '{}': {}", path.display(), e),
        })?;
        self.seed_from_toml(agent_id, owner_id, &contents)
    }

    // ── Evaluation ────────────────────────────────────────────────────────────

    /// Evaluate the agent's enabled rules against `ctx`. No side effects.
    pub fn evaluate_rules(&self, ctx: &EvaluationContext) -> WaypointResult<RuleEvaluation> {
        let mut rules: Vec<Rule> = self
            .list_rules(&ctx.agent_id)?
            .into_iter()
            .filter(|r| r.enabled)
            .collect();
        rules.sort_by_key(|r| r.created_at);
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        let snapshot = ctx.to_value();
        let mut evaluation = RuleEvaluation::default();

        for rule in rules {
            if !conditions_hold(&rule.conditions, &snapshot) {
                continue;
            }

            debug!(
                rule_id = %rule.id,
                name = %rule.name,
                step = ctx.step_index,
                "rule matched"
            );

            let stop = rule.has_stop_action();
            evaluation.actions.extend(rule.actions.iter().cloned());
            evaluation.matched_rules.push(rule);

            if stop {
                evaluation.should_stop = true;
                warn!(
                    agent_id = %ctx.agent_id,
                    plan_id = %ctx.plan_id,
                    step = ctx.step_index,
                    "stop_execution rule matched; skipping remaining rules"
                );
                break;
            }
        }

        Ok(evaluation)
    }

    fn require(&self, agent_id: &str, rule_id: &str) -> WaypointResult<Rule> {
        self.get_rule(agent_id, rule_id)?
            .ok_or_else(|| WaypointError::not_found("rule", rule_id))
    }
}

impl RuleEvaluator for RuleEngine {
    fn evaluate(&self, ctx: &EvaluationContext) -> WaypointResult<RuleEvaluation> {
        self.evaluate_rules(ctx)
    }
}

fn validate_definition(definition: &RuleDefinition) -> WaypointResult<()> {
    validate_parts(&definition.name, &definition.conditions, &definition.actions)
}

fn validate_parts(name: &str, conditions: &[Condition], actions: &[Action]) -> WaypointResult<()> {
    if name.trim().is_empty() {
        return Err(WaypointError::validation("rule name must not be empty"));
    }
    for condition in conditions {
        validate_condition(condition)?;
    }
    for action in actions {
        validate_action(name, action)?;
    }
    Ok(())
}

/// Actions are mostly opaque payloads; only the keys the executor reads are
/// checked.
fn validate_action(rule_name: &str, action: &Action) -> WaypointResult<()> {
    let needs = |key: &str| -> WaypointResult<()> {
        match action.params.get(key).and_then(|v| v.as_str()) {
            Some(_) => Ok(()),
            None => Err(WaypointError::validation(format!(
                "rule '{}': {:?} action needs a string '{}' param",
                rule_name, action.kind, key
            ))),
        }
    };

    match action.kind {
        ActionKind::ExecuteTool => needs("tool"),
        ActionKind::StoreMemory => needs("content"),
        ActionKind::SendNotification | ActionKind::UpdateContext | ActionKind::StopExecution => {
            Ok(())
        }
    }
}
