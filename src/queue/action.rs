//! Queued mutation records.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Action Type ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Create => "create",
            ActionType::Update => "update",
            ActionType::Delete => "delete",
        };
        f.write_str(name)
    }
}

// == New Action ==
/// A mutation as submitted, before the queue assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Kind of entity the mutation targets, e.g. "recipe"
    pub entity_kind: String,
    #[serde(default, alias = "data")]
    pub payload: Value,
}

impl NewAction {
    pub fn new(action_type: ActionType, entity_kind: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type,
            entity_kind: entity_kind.into(),
            payload,
        }
    }
}

// == Pending Action ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// UUID v4
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub entity_kind: String,
    pub payload: Value,
    pub enqueued_at: u64,
    /// Only ever increases
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<u64>,
}

impl PendingAction {
    pub(crate) fn from_new(action: NewAction, id: String, now_ms: u64) -> Self {
        Self {
            id,
            action_type: action.action_type,
            entity_kind: action.entity_kind,
            payload: action.payload,
            enqueued_at: now_ms,
            attempts: 0,
            last_attempt_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_action_accepts_data_alias() {
        let action: NewAction = serde_json::from_value(json!({
            "type": "update",
            "entityKind": "pantryItem",
            "data": {"qty": 2}
        }))
        .unwrap();

        assert_eq!(action.action_type, ActionType::Update);
        assert_eq!(action.payload, json!({"qty": 2}));
    }

    #[test]
    fn test_pending_action_wire_shape() {
        let action = PendingAction::from_new(
            NewAction::new(ActionType::Delete, "recipe", json!({"id": 9})),
            "abc".to_string(),
            42,
        );

        let json = serde_json::to_value(&action).unwrap();

        assert_eq!(json["type"], "delete");
        assert_eq!(json["entityKind"], "recipe");
        assert_eq!(json["enqueuedAt"], 42);
        assert_eq!(json["attempts"], 0);
        assert!(json.get("lastAttemptAt").is_none());
    }
}
