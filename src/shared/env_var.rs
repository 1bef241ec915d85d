//! Centralized reader for the environment variables partdb honors.
//!
//! Variable names are private constants here; other modules read values
//! through [`EnvVars`].

const REPO: &str = "PARTDB_REPO";
const GITHUB_TOKEN_OVERRIDE: &str = "PARTDB_GITHUB_TOKEN";
const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
const LOG: &str = "PARTDB_LOG";
const CACHE_DIR: &str = "PARTDB_CACHE_DIR";
const GH_CONFIG_DIR: &str = "GH_CONFIG_DIR";
const USER: &str = "USER";
const USERNAME: &str = "USERNAME";

/// Snapshot of the relevant environment at load time.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    /// Database repository path, overriding `repo_path` in the config file.
    pub repo: Option<String>,
    pub partdb_github_token: Option<String>,
    pub github_token: Option<String>,
    /// `tracing` filter directive for console output.
    pub log: Option<String>,
    /// Overrides the cache directory (logs, remote SHA cache).
    pub cache_dir: Option<String>,
    pub gh_config_dir: Option<String>,
    user: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl EnvVars {
    pub fn load() -> Self {
        Self {
            repo: non_empty_var(REPO),
            partdb_github_token: non_empty_var(GITHUB_TOKEN_OVERRIDE),
            github_token: non_empty_var(GITHUB_TOKEN),
            log: non_empty_var(LOG),
            cache_dir: non_empty_var(CACHE_DIR),
            gh_config_dir: non_empty_var(GH_CONFIG_DIR),
            user: non_empty_var(USER).or_else(|| non_empty_var(USERNAME)),
        }
    }

    /// Token from the environment, `PARTDB_GITHUB_TOKEN` first.
    pub fn github_token(&self) -> Option<&str> {
        self.partdb_github_token
            .as_deref()
            .or(self.github_token.as_deref())
            .map(str::trim)
    }

    /// Login name recorded in request files.
    pub fn user(&self) -> &str {
        self.user.as_deref().unwrap_or("user")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values_are_unset() {
        temp_env::with_vars(
            [
                (REPO, Some("")),
                (LOG, Some("  ")),
                (USER, None),
                (USERNAME, Some("jane")),
            ],
            || {
                let env = EnvVars::load();
                assert_eq!(env.repo, None);
                assert_eq!(env.log, None);
                assert_eq!(env.user(), "jane");
            },
        );
    }

    #[test]
    fn github_token_prefers_partdb_variable() {
        temp_env::with_vars(
            [
                (GITHUB_TOKEN_OVERRIDE, Some(" tok-a ")),
                (GITHUB_TOKEN, Some("tok-b")),
            ],
            || assert_eq!(EnvVars::load().github_token(), Some("tok-a")),
        );
    }

    #[test]
    fn user_falls_back_to_placeholder() {
        temp_env::with_vars([(USER, None::<&str>), (USERNAME, None)], || {
            assert_eq!(EnvVars::load().user(), "user");
        });
    }
}
