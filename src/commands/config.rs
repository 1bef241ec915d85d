use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;

use crate::shared::config::{REPO_OVERLAY_PATH, generate_schema};
use crate::shared::paths;

#[derive(Subcommand, Clone, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Print JSON Schema for config.yaml
    Schema,

    /// Print where configuration is read from
    Path,
}

impl ConfigCommands {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            Self::Schema => {
                println!("{}", serde_json::to_string_pretty(&generate_schema())?);
            }
            Self::Path => {
                let dir = paths::config_base().context("Cannot determine config directory")?;
                println!("{}", user_config_path(&dir).display());
                println!("<repo>/{REPO_OVERLAY_PATH}");
            }
        }
        Ok(())
    }
}

/// The existing config file in `dir`, or where a new one belongs.
fn user_config_path(dir: &Path) -> PathBuf {
    ["config.yaml", "config.yml"]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
        .unwrap_or_else(|| dir.join("config.yaml"))
}
