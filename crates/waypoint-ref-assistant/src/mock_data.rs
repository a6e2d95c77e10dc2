//! Simulated collaborators for the Waypoint reference runtime.
//!
//! Everything here is hardcoded and fictional. No mail server, calendar,
//! chat service or language model is contacted; these types stand in for
//! the real integrations a deployment would inject.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Map, Value};
use tracing::debug;

use waypoint_contracts::{
    context::CompletionRequest,
    error::{WaypointError, WaypointResult},
};
use waypoint_core::traits::{Clock, CompletionService, KnowledgeBase, ToolInvoker};

// ── Inbox (mock) ─────────────────────────────────────────────────────────────

/// Three unread messages, newest first.
pub fn unread_messages() -> Value {
    json!([
        {
            "id": "msg-301",
            "from": "dana@example.com",
            "subject": "Q3 budget review moved to Thursday",
            "snippet": "Finance asked to push the review by two days so the forecast can be updated."
        },
        {
            "id": "msg-300",
            "from": "cfo@partner.org",
            "subject": "Signed contract attached",
            "snippet": "Please confirm receipt and forward to legal before Friday."
        },
        {
            "id": "msg-299",
            "from": "it-helpdesk@example.com",
            "subject": "Laptop refresh scheduled",
            "snippet": "Your replacement laptop will be ready for pickup on Monday at 10:00."
        }
    ])
}

/// Upcoming calendar entries.
pub fn upcoming_events() -> Value {
    json!([
        { "title": "Q3 budget review", "start": "2026-03-05T14:00:00Z", "minutes": 60 },
        { "title": "1:1 with Dana", "start": "2026-03-06T09:30:00Z", "minutes": 30 }
    ])
}

// ── Toolbox ──────────────────────────────────────────────────────────────────

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub action: String,
    pub params: Map<String, Value>,
}

/// A `ToolInvoker` serving `gmail`, `calendar`, `slack` and `notification`
/// from canned data. Tools marked offline fail every call.
#[derive(Debug, Default)]
pub struct MockToolbox {
    offline: HashSet<String>,
    calls: Mutex<Vec<ToolCall>>,
}

impl MockToolbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offline(mut self, tool: &str) -> Self {
        self.offline.insert(tool.to_string());
        self
    }

    /// Every invocation so far, in call order.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Names of the tools this box answers for.
    pub fn tool_names() -> Vec<String> {
        ["gmail", "calendar", "slack"].iter().map(|s| s.to_string()).collect()
    }
}

impl ToolInvoker for MockToolbox {
    fn invoke(&self, tool: &str, action: &str, params: &Map<String, Value>) -> WaypointResult<Value> {
        debug!(tool = %tool, action = %action, "mock tool invoked");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ToolCall {
                tool: tool.to_string(),
                action: action.to_string(),
                params: params.clone(),
            });
        }

        if self.offline.contains(tool) {
            return Err(WaypointError::ExecutionFailure {
                reason: format!("{} service unavailable", tool),
            });
        }

        let text = |key: &str| params.get(key).and_then(Value::as_str).unwrap_or_default();

        match (tool, action) {
            ("gmail", "list_unread") => {
                let max = params.get("max").and_then(Value::as_u64).unwrap_or(10) as usize;
                let mut messages = unread_messages();
                if let Some(list) = messages.as_array_mut() {
                    list.truncate(max);
                }
                Ok(messages)
            }
            ("gmail", "send") => Ok(json!({ "sent": true, "to": text("to"), "id": "msg-302" })),
            ("calendar", "list_events") => Ok(upcoming_events()),
            ("calendar", "book") => Ok(json!({ "booked": true, "title": text("title") })),
            ("slack", "post_message") => Ok(json!({
                "ok": true,
                "channel": text("channel"),
                "ts": "1772442000.000100"
            })),
            ("notification", "send") => Ok(json!({ "delivered": true })),
            _ => Err(WaypointError::ExecutionFailure {
                reason: format!("unknown tool action '{}.{}'", tool, action),
            }),
        }
    }
}

// ── Completion (scripted) ────────────────────────────────────────────────────

/// A `CompletionService` with canned answers.
///
/// Planning requests (the brief starts with `Task:`) are answered with the
/// queued plan replies in order, or `[]` once the queue is empty. Any other
/// request is answered with a one-line summary of its prompt.
#[derive(Debug, Default)]
pub struct ScriptedCompletion {
    plans: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, reply: impl Into<String>) -> Self {
        self.queue_plan(reply);
        self
    }

    pub fn queue_plan(&self, reply: impl Into<String>) {
        if let Ok(mut plans) = self.plans.lock() {
            plans.push_back(reply.into());
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl CompletionService for ScriptedCompletion {
    fn complete(&self, request: &CompletionRequest) -> WaypointResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        if prompt.starts_with("Task:") {
            let mut plans = self.plans.lock().map_err(|e| WaypointError::ExecutionFailure {
                reason: format!("scripted completion poisoned: {}", e),
            })?;
            return Ok(plans.pop_front().unwrap_or_else(|| "[]".to_string()));
        }

        let gist: String = prompt.chars().take(80).collect();
        Ok(format!("Summary: {}", gist))
    }
}

// ── Knowledge base (mock) ────────────────────────────────────────────────────

/// Fixed excerpts for the `kb-handbook` knowledge base.
#[derive(Debug, Default)]
pub struct StaticKnowledgeBase;

const HANDBOOK: &[&str] = &[
    "Digests go to the #me channel, never to shared channels.",
    "Contracts from partners must be forwarded to legal@example.com.",
    "Meetings are booked in 30-minute slots unless stated otherwise.",
];

impl KnowledgeBase for StaticKnowledgeBase {
    fn search(&self, knowledge_base_ids: &[String], _query: &str, limit: usize) -> WaypointResult<Vec<String>> {
        if !knowledge_base_ids.iter().any(|id| id == "kb-handbook") {
            return Ok(Vec::new());
        }
        Ok(HANDBOOK.iter().take(limit).map(|s| s.to_string()).collect())
    }
}

// ── Clock ────────────────────────────────────────────────────────────────────

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ScriptedClock {
    now: Mutex<DateTime<Utc>>,
}

impl ScriptedClock {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Monday 2 March 2026, 09:00 UTC.
    pub fn monday_morning() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).single().unwrap_or_default())
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|now| *now).unwrap_or_else(|_| Utc::now())
    }
}
