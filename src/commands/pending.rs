use std::collections::BTreeMap;
use std::path::Path;

use anyhow::bail;
use chrono::Utc;
use clap::Subcommand;

use super::context::RepoContext;
use crate::infra::git::GitFacade;
use crate::infra::github::{ContentsClient, GitHubClient, GitHubError, resolve_token};
use crate::library;
use crate::pending::PendingRequest;
use crate::pending::submit::{self, RequestDraft, SubmitContext};
use crate::shared::env_var::EnvVars;

/// Parse a `COLUMN=VALUE` argument.
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected COLUMN=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty column name in `{s}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Pending change request commands.
#[derive(Subcommand, Clone, PartialEq, Eq)]
pub enum PendingCommands {
    /// List requests not yet visible in the working copy
    List {
        /// Only this category
        category: Option<String>,
    },

    /// Request a new part
    Add {
        category: String,
        /// Column values as COLUMN=VALUE
        #[arg(value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,
        /// Commit message for the request file
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Request changes to an existing part
    Update {
        category: String,
        ipn: String,
        /// Column values as COLUMN=VALUE
        #[arg(value_parser = parse_field, required = true)]
        fields: Vec<(String, String)>,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Request deletion of a part
    Delete {
        category: String,
        ipn: String,
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Forget tracked requests without touching the remote
    Clear {
        category: Option<String>,
        /// Clear every category
        #[arg(long, conflicts_with = "category")]
        all: bool,
    },
}

impl PendingCommands {
    pub fn run(&self, repo: Option<&Path>) -> anyhow::Result<()> {
        let ctx = RepoContext::open(repo)?;
        match self {
            Self::List { category } => {
                ctx.reconcile_all(Utc::now())?;
                print!("{}", format_list(&listing(&ctx, category.as_deref())));
            }
            Self::Add {
                category,
                fields,
                message,
            } => {
                let draft = RequestDraft::Add {
                    category: category.clone(),
                    fields: to_map(fields),
                };
                submit_with_github(&ctx, draft, message.as_deref())?;
            }
            Self::Update {
                category,
                ipn,
                fields,
                message,
            } => {
                let draft = RequestDraft::Update {
                    category: category.clone(),
                    ipn: ipn.clone(),
                    set_fields: to_map(fields),
                };
                submit_with_github(&ctx, draft, message.as_deref())?;
            }
            Self::Delete {
                category,
                ipn,
                message,
            } => {
                let draft = RequestDraft::Delete {
                    category: category.clone(),
                    ipn: ipn.clone(),
                };
                submit_with_github(&ctx, draft, message.as_deref())?;
            }
            Self::Clear { category, all } => {
                let cleared = clear(&ctx, category.as_deref(), *all)?;
                println!("Cleared {cleared} request(s).");
            }
        }
        Ok(())
    }
}

fn to_map(fields: &[(String, String)]) -> BTreeMap<String, String> {
    fields.iter().cloned().collect()
}

fn listing<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    category: Option<&str>,
) -> Vec<PendingRequest> {
    match category {
        Some(name) => ctx.store.list_for(name),
        None => ctx.store.items_by_category().into_values().flatten().collect(),
    }
}

fn format_list(items: &[PendingRequest]) -> String {
    if items.is_empty() {
        return "No pending requests.\n".to_string();
    }
    let width = items.iter().map(|r| r.category.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|r| {
            format!(
                "{:<width$}  {}  {}  [{}]\n",
                r.category,
                r.created_at.format("%Y-%m-%d %H:%M"),
                r.label(),
                r.state.display_name(),
            )
        })
        .collect()
}

fn clear<G: GitFacade + ?Sized>(
    ctx: &RepoContext<G>,
    category: Option<&str>,
    all: bool,
) -> anyhow::Result<usize> {
    let targets: Vec<String> = match (category, all) {
        (Some(name), _) => vec![name.to_string()],
        (None, true) => ctx.store.items_by_category().into_keys().collect(),
        (None, false) => bail!("Specify a category or --all"),
    };
    let mut cleared = 0;
    for name in targets {
        cleared += ctx.store.list_for(&name).len();
        ctx.store.clear(&name)?;
    }
    Ok(cleared)
}

#[tokio::main]
async fn submit_with_github(
    ctx: &RepoContext,
    draft: RequestDraft,
    message: Option<&str>,
) -> anyhow::Result<()> {
    let (owner, repo) = ctx.config.owner_repo().ok_or(GitHubError::RepoNotConfigured)?;
    let token = resolve_token()?;
    let client = GitHubClient::new(&token, &owner, &repo)?;
    let request = submit_draft(&client, ctx, draft, message).await?;
    println!("Submitted {} ({})", request.label(), request.req_path);
    Ok(())
}

async fn submit_draft<C: ContentsClient, G: GitFacade + ?Sized>(
    client: &C,
    ctx: &RepoContext<G>,
    draft: RequestDraft,
    message: Option<&str>,
) -> anyhow::Result<PendingRequest> {
    let env = EnvVars::load();
    let local = library::find_category(&ctx.root, draft.category())
        .and_then(|category| library::table::load_table(&category.csv_path))
        .map(|table| table.by_ipn())
        .inspect_err(|e| tracing::warn!("local table unavailable at submit: {e:#}"))
        .ok();
    let submit_ctx = SubmitContext {
        store: &ctx.store,
        git: ctx.git.as_ref(),
        base_branch: &ctx.branch,
        user: env.user(),
        local: local.as_ref(),
    };
    submit::submit(client, &submit_ctx, draft, message).await
}
