use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change a request asks CI to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Add,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Lifecycle state of a pending request.
///
/// Requests whose effect is visible in the local working copy are removed
/// from the store rather than given a terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    /// Request file committed; effect not yet observed on the remote branch.
    #[default]
    Submitted,
    /// Effect observed on the remote branch; a local sync is still needed.
    AppliedRemote,
}

impl PendingState {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AppliedRemote => "applied remotely",
        }
    }
}

/// One outstanding change request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub category: String,
    pub action: Action,
    /// Target row. Empty for adds until CI assigns one.
    #[serde(default)]
    pub ipn: String,
    /// IPN of the row an add turned into, once observed.
    #[serde(default)]
    pub resolved_ipn: String,
    /// Proposed row content for adds.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    /// For adds, local rows that already matched `fields` at submission.
    /// `None` when the local table was not known then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_matches_at_submit: Option<Vec<String>>,
    /// Proposed column changes for updates.
    #[serde(default, alias = "set", skip_serializing_if = "BTreeMap::is_empty")]
    pub set_fields: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    /// `FETCH_HEAD` mtime when the request was submitted, if any fetch had happened.
    #[serde(default)]
    pub fetch_mtime_at_submit: Option<DateTime<Utc>>,
    /// `origin/<branch>` commit at submission. Empty if unknown.
    #[serde(default)]
    pub origin_sha_at_submit: String,
    #[serde(default)]
    pub seen_remote: bool,
    #[serde(default)]
    pub state: PendingState,
    /// Repository-relative path of the request file on the remote.
    #[serde(default)]
    pub req_path: String,
}

impl PendingRequest {
    /// IPN this request targets, trimmed.
    pub fn target_ipn(&self) -> &str {
        self.ipn.trim()
    }

    /// IPN an add resolved to, trimmed.
    pub fn resolved(&self) -> Option<&str> {
        Some(self.resolved_ipn.trim()).filter(|s| !s.is_empty())
    }

    /// True if `ipn` already matched this add locally before it was submitted.
    pub fn matched_before_submit(&self, ipn: &str) -> bool {
        self.local_matches_at_submit
            .as_ref()
            .is_some_and(|ipns| ipns.iter().any(|p| p == ipn))
    }

    pub fn is_applied_remote(&self) -> bool {
        self.state == PendingState::AppliedRemote
    }

    /// Short label for listings.
    pub fn label(&self) -> String {
        match self.action {
            Action::Add => match self.resolved() {
                Some(ipn) => format!("add {ipn}"),
                None => {
                    let hint = ["MPN", "Value", "Description"]
                        .iter()
                        .find_map(|k| self.fields.get(*k).filter(|v| !v.trim().is_empty()));
                    match hint {
                        Some(h) => format!("add (pending IPN) {h}"),
                        None => "add (pending IPN)".to_string(),
                    }
                }
            },
            Action::Update => {
                let cols: Vec<&str> = self.set_fields.keys().map(String::as_str).collect();
                format!("update {} [{}]", self.target_ipn(), cols.join(", "))
            }
            Action::Delete => format!("delete {}", self.target_ipn()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::factories::{pending_add, pending_delete, pending_update};
    use rstest::rstest;

    #[test]
    fn deserializes_legacy_set_key_and_missing_optionals() {
        let json = r#"{
            "category": "Resistors",
            "action": "update",
            "ipn": "R0001",
            "set": {"Value": "22k"},
            "created_at": "2024-05-01T10:00:00Z"
        }"#;
        let req: PendingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.action, Action::Update);
        assert_eq!(req.set_fields["Value"], "22k");
        assert_eq!(req.state, PendingState::Submitted);
        assert!(!req.seen_remote);
        assert_eq!(req.fetch_mtime_at_submit, None);
    }

    #[test]
    fn serializes_state_in_snake_case() {
        let mut req = pending_delete("Resistors", "R0001");
        req.state = PendingState::AppliedRemote;
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["state"], "applied_remote");
        assert_eq!(value["action"], "delete");
        assert!(value.get("fields").is_none());
    }

    #[rstest]
    #[case::delete(pending_delete("Resistors", "R0001"), "delete R0001")]
    #[case::update(pending_update("Resistors", "R0001", &[("Value", "22k")]), "update R0001 [Value]")]
    #[case::add(pending_add("Resistors", &[("MPN", "X1"), ("Manufacturer", "ACME")]), "add (pending IPN) X1")]
    fn test_label(#[case] req: PendingRequest, #[case] expected: &str) {
        assert_eq!(req.label(), expected);
    }

    #[test]
    fn resolved_ignores_whitespace() {
        let mut req = pending_add("Resistors", &[]);
        req.resolved_ipn = "  ".to_string();
        assert_eq!(req.resolved(), None);
        req.resolved_ipn = " R0009 ".to_string();
        assert_eq!(req.resolved(), Some("R0009"));
        assert_eq!(req.label(), "add R0009");
    }
}
