//! Submission of change requests.
//!
//! A request is a small JSON file committed under `Requests/` on the base
//! branch through the GitHub contents API. CI picks it up, edits the category
//! table and deletes the file. The request is tracked locally only once the
//! file was created.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use super::error::{PendingError, Result};
use super::matching::matching_ipns;
use super::model::{Action, PendingRequest, PendingState};
use super::store::PendingStore;
use crate::infra::git::GitFacade;
use crate::infra::github::{ContentsClient, CreateFileRequest};
use crate::library::RowMap;

const REQUESTS_DIR: &str = "Requests";
const SCHEMA_VERSION: u32 = 1;
const SOURCE: &str = "partdb";

/// A change the user wants CI to make.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestDraft {
    Add {
        category: String,
        fields: BTreeMap<String, String>,
    },
    Update {
        category: String,
        ipn: String,
        set_fields: BTreeMap<String, String>,
    },
    Delete {
        category: String,
        ipn: String,
    },
}

impl RequestDraft {
    pub fn action(&self) -> Action {
        match self {
            Self::Add { .. } => Action::Add,
            Self::Update { .. } => Action::Update,
            Self::Delete { .. } => Action::Delete,
        }
    }

    pub fn category(&self) -> &str {
        match self {
            Self::Add { category, .. }
            | Self::Update { category, .. }
            | Self::Delete { category, .. } => category,
        }
    }

    fn ipn(&self) -> &str {
        match self {
            Self::Add { .. } => "",
            Self::Update { ipn, .. } | Self::Delete { ipn, .. } => ipn.trim(),
        }
    }

    pub fn default_commit_message(&self) -> String {
        format!("request: {} {}", self.action().as_str(), self.category())
    }
}

/// Everything a submission needs besides the draft itself.
pub struct SubmitContext<'a, G: GitFacade + ?Sized> {
    pub store: &'a PendingStore,
    pub git: &'a G,
    pub base_branch: &'a str,
    pub user: &'a str,
    /// Current rows of the draft's category, if the table could be read.
    pub local: Option<&'a RowMap>,
}

/// Reject drafts that could never be applied or that conflict with requests
/// already pending.
pub fn validate(draft: &RequestDraft, store: &PendingStore) -> Result<()> {
    let invalid = |msg: &str| -> Result<()> { Err(PendingError::Invalid(msg.to_string()).into()) };

    match draft {
        RequestDraft::Add { fields, .. } => {
            if fields.values().all(|v| v.trim().is_empty()) {
                return invalid("add needs at least one non-empty field");
            }
            return Ok(());
        }
        RequestDraft::Update {
            ipn, set_fields, ..
        } => {
            if ipn.trim().is_empty() {
                return invalid("update needs an IPN");
            }
            if set_fields.is_empty() {
                return invalid("update needs at least one column to set");
            }
        }
        RequestDraft::Delete { ipn, .. } => {
            if ipn.trim().is_empty() {
                return invalid("delete needs an IPN");
            }
        }
    }

    let category = draft.category();
    let ipn = draft.ipn();
    let pending_delete = store
        .list_for(category)
        .iter()
        .any(|r| r.action == Action::Delete && r.target_ipn() == ipn);
    if !pending_delete {
        return Ok(());
    }

    let (category, ipn) = (category.to_string(), ipn.to_string());
    match draft.action() {
        Action::Delete => Err(PendingError::DuplicateDelete { category, ipn }.into()),
        _ => Err(PendingError::PendingDeletion { category, ipn }.into()),
    }
}

/// Keep user names safe for use in a file name.
fn sanitize_user(user: &str) -> String {
    let cleaned: String = user
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned
    }
}

/// The committed request file: repository path and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestArtifact {
    pub path: String,
    pub body: Value,
}

impl RequestArtifact {
    /// Pretty JSON with sorted keys and a trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(&self.body)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

pub fn build_artifact(
    draft: &RequestDraft,
    created_at: DateTime<Utc>,
    user: &str,
    id: &str,
) -> RequestArtifact {
    let stamp = created_at.format("%Y%m%dT%H%M%SZ").to_string();
    let user = sanitize_user(user);

    let mut body: BTreeMap<&str, Value> = BTreeMap::from([
        ("schema_version", json!(SCHEMA_VERSION)),
        ("action", json!(draft.action().as_str())),
        ("created_at", json!(stamp)),
        ("created_by", json!(user)),
        ("source", json!(SOURCE)),
        ("category", json!(draft.category())),
    ]);
    match draft {
        RequestDraft::Add { fields, .. } => {
            body.insert("fields", json!(fields));
        }
        RequestDraft::Update { set_fields, .. } => {
            body.insert("ipn", json!(draft.ipn()));
            body.insert("set", json!(set_fields));
        }
        RequestDraft::Delete { .. } => {
            body.insert("ipn", json!(draft.ipn()));
        }
    }

    RequestArtifact {
        path: format!("{REQUESTS_DIR}/{stamp}_{user}_{id}.json"),
        body: json!(body),
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Validate, commit the request file and track the request.
///
/// Nothing is stored unless the file was created.
pub async fn submit<C, G>(
    client: &C,
    ctx: &SubmitContext<'_, G>,
    draft: RequestDraft,
    commit_message: Option<&str>,
) -> Result<PendingRequest>
where
    C: ContentsClient,
    G: GitFacade + ?Sized,
{
    validate(&draft, ctx.store)?;

    let created_at = Utc::now();
    let artifact = build_artifact(&draft, created_at, ctx.user, &short_id());
    let message = commit_message
        .map(str::to_string)
        .unwrap_or_else(|| draft.default_commit_message());
    let content = artifact.to_bytes()?;

    client
        .create_file(CreateFileRequest {
            path: &artifact.path,
            branch: ctx.base_branch,
            message: &message,
            content: &content,
        })
        .await?;
    tracing::info!(path = %artifact.path, "request file created");

    let fetch_mtime_at_submit = ctx
        .git
        .fetch_marker_mtime()
        .inspect_err(|e| tracing::debug!("no fetch marker at submit: {e:#}"))
        .ok()
        .flatten();
    let origin_sha_at_submit = ctx
        .git
        .rev_parse(&format!("origin/{}", ctx.base_branch))
        .inspect_err(|e| tracing::debug!("no origin sha at submit: {e:#}"))
        .unwrap_or_default();

    let action = draft.action();
    let category = draft.category().to_string();
    let ipn = draft.ipn().to_string();
    let (fields, set_fields, local_matches_at_submit) = match draft {
        RequestDraft::Add { fields, .. } => {
            let matches = ctx.local.map(|rows| matching_ipns(&fields, rows));
            (fields, BTreeMap::new(), matches)
        }
        RequestDraft::Update { set_fields, .. } => (BTreeMap::new(), set_fields, None),
        RequestDraft::Delete { .. } => (BTreeMap::new(), BTreeMap::new(), None),
    };
    let request = PendingRequest {
        category: category.clone(),
        action,
        ipn,
        resolved_ipn: String::new(),
        fields,
        local_matches_at_submit,
        set_fields,
        created_at,
        fetch_mtime_at_submit,
        origin_sha_at_submit,
        seen_remote: false,
        state: PendingState::Submitted,
        req_path: artifact.path,
    };

    ctx.store.add(&category, request.clone())?;
    Ok(request)
}
