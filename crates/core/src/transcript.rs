//! Transcript and Turn domain types.
//!
//! A transcript is the conversation one iteration loop run owns:
//! system instructions → user task → assistant decisions → action results.
//! It is append-only; the only way to add a turn is [`Transcript::push`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{ActionError, TranscriptError};

/// Unique identifier for a transcript (one agent run attempt).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TranscriptId(pub String);

impl TranscriptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TranscriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Static instructions, set once at the start
    System,
    /// The task text
    User,
    /// The reasoning service's output
    Assistant,
    /// The textual output of one executed action
    ActionResult,
}

/// A single entry in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who produced this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Actions requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<ActionRequest>,

    /// For action results, the request this turn answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            requests: Vec::new(),
            request_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Create a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create an assistant turn with plain text.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create an assistant turn that requests actions.
    pub fn assistant_with_requests(
        content: impl Into<String>,
        requests: Vec<ActionRequest>,
    ) -> Self {
        let mut turn = Self::new(Role::Assistant, content.into());
        turn.requests = requests;
        turn
    }

    /// Create an action-result turn answering `request_id`.
    pub fn action_result(request_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::ActionResult, content.into());
        turn.request_id = Some(request_id.into());
        turn
    }
}

/// An action the reasoning service asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Unique ID for this request (the service's call id)
    pub id: String,

    /// Name of the action to invoke
    pub name: String,

    /// Arguments as a raw JSON string, exactly as received
    pub arguments: String,
}

impl ActionRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument payload. An empty payload is treated as `{}`.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, ActionError> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments).map_err(|e| {
            ActionError::InvalidArguments(format!("arguments for '{}' are not valid JSON: {e}", self.name))
        })
    }
}

/// An ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Unique transcript ID
    pub id: TranscriptId,

    /// Ordered turns
    turns: Vec<Turn>,

    /// When this transcript was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Transcript {
    /// Create a new empty transcript.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: TranscriptId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a transcript with a system instruction and a user task.
    pub fn with_task(system: impl Into<String>, task: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(Turn::system(system));
        transcript.push(Turn::user(task));
        transcript
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// All action-result turns, in order.
    pub fn action_results(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter().filter(|t| t.role == Role::ActionResult)
    }

    /// Text of the most recent assistant turn, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::Assistant)
            .map(|t| t.content.as_str())
    }

    /// Requests in the trailing assistant turn that have no result yet.
    pub fn unanswered(&self) -> Vec<&ActionRequest> {
        let Some(pos) = self.turns.iter().rposition(|t| t.role == Role::Assistant) else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.turns[pos + 1..]
            .iter()
            .filter_map(|t| t.request_id.as_deref())
            .collect();
        self.turns[pos]
            .requests
            .iter()
            .filter(|r| !answered.contains(r.id.as_str()))
            .collect()
    }

    /// Check the request/result pairing invariant.
    ///
    /// Every action-result must answer a request of the immediately
    /// preceding assistant turn, no request may be answered twice, and every
    /// request must be answered before any other kind of turn follows.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        let mut open: Vec<&str> = Vec::new();
        let mut answered: HashSet<&str> = HashSet::new();

        for turn in &self.turns {
            match turn.role {
                Role::ActionResult => {
                    let id = turn.request_id.as_deref().unwrap_or_default();
                    if !open.contains(&id) {
                        return Err(TranscriptError::Orphan(id.to_string()));
                    }
                    if !answered.insert(id) {
                        return Err(TranscriptError::Duplicate(id.to_string()));
                    }
                }
                _ => {
                    if let Some(missing) = open.iter().find(|id| !answered.contains(*id)) {
                        return Err(TranscriptError::Unanswered((*missing).to_string()));
                    }
                    answered.clear();
                    open = turn.requests.iter().map(|r| r.id.as_str()).collect();
                }
            }
        }

        match open.iter().find(|id| !answered.contains(*id)) {
            Some(missing) => Err(TranscriptError::Unanswered((*missing).to_string())),
            None => Ok(()),
        }
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> ActionRequest {
        ActionRequest::new(id, "echo", "{}")
    }

    #[test]
    fn with_task_seeds_system_and_user() {
        let t = Transcript::with_task("be brief", "say hi");
        assert_eq!(t.len(), 2);
        assert_eq!(t.turns()[0].role, Role::System);
        assert_eq!(t.turns()[1].role, Role::User);
        assert!(t.validate().is_ok());
    }

    #[test]
    fn answered_requests_validate() {
        let mut t = Transcript::with_task("sys", "task");
        t.push(Turn::assistant_with_requests("", vec![request("a"), request("b")]));
        t.push(Turn::action_result("a", "one"));
        t.push(Turn::action_result("b", "two"));
        t.push(Turn::assistant("done"));
        assert!(t.validate().is_ok());
        assert_eq!(t.action_results().count(), 2);
        assert_eq!(t.last_assistant_text(), Some("done"));
    }

    #[test]
    fn unanswered_request_is_reported() {
        let mut t = Transcript::with_task("sys", "task");
        t.push(Turn::assistant_with_requests("", vec![request("a"), request("b")]));
        t.push(Turn::action_result("a", "one"));
        assert_eq!(t.unanswered().len(), 1);
        assert_eq!(t.unanswered()[0].id, "b");
        assert_eq!(t.validate(), Err(TranscriptError::Unanswered("b".into())));
    }

    #[test]
    fn duplicate_result_is_rejected() {
        let mut t = Transcript::with_task("sys", "task");
        t.push(Turn::assistant_with_requests("", vec![request("a")]));
        t.push(Turn::action_result("a", "one"));
        t.push(Turn::action_result("a", "again"));
        assert_eq!(t.validate(), Err(TranscriptError::Duplicate("a".into())));
    }

    #[test]
    fn result_for_older_turn_is_orphan() {
        let mut t = Transcript::with_task("sys", "task");
        t.push(Turn::assistant_with_requests("", vec![request("a")]));
        t.push(Turn::action_result("a", "one"));
        t.push(Turn::assistant_with_requests("", vec![request("b")]));
        t.push(Turn::action_result("a", "late"));
        assert_eq!(t.validate(), Err(TranscriptError::Orphan("a".into())));
    }

    #[test]
    fn empty_arguments_parse_as_object() {
        let req = ActionRequest::new("1", "list", "  ");
        assert_eq!(req.parse_arguments().unwrap(), serde_json::json!({}));
        let bad = ActionRequest::new("2", "list", "{not json");
        assert!(matches!(bad.parse_arguments(), Err(ActionError::InvalidArguments(_))));
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::action_result("call_1", "42");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("action_result"));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_id.as_deref(), Some("call_1"));
    }
}
