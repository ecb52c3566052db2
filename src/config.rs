use std::collections::HashSet;
use std::fmt;

use thiserror::Error;

pub const TOKEN_VAR: &str = "ACCESS_TOKEN";
pub const USER_VAR: &str = "GITHUB_ACTOR";
pub const EXCLUDED_REPOS_VAR: &str = "EXCLUDED";
pub const EXCLUDED_LANGS_VAR: &str = "EXCLUDED_LANGS";
pub const IGNORE_FORKS_VAR: &str = "EXCLUDE_FORKED_REPOS";
pub const EMAILS_VAR: &str = "GIT_EMAILS";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("a personal access token is required: set ACCESS_TOKEN")]
    MissingToken,

    #[error("the GitHub user is required: set GITHUB_ACTOR")]
    MissingUser,
}

/// Who the statistics are about, and the token that reads them.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub access_token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            access_token: access_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Everything the aggregator needs to know, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// `owner/name` identifiers left out of every statistic.
    pub exclude_repos: HashSet<String>,
    /// Language names, matched case-insensitively.
    pub exclude_langs: HashSet<String>,
    /// Skip contributed-to repositories while aggregating.
    pub ignore_forked_repos: bool,
    /// Commit-attribution identities; empty means "use the username".
    pub emails: Vec<String>,
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            exclude_repos: HashSet::new(),
            exclude_langs: HashSet::new(),
            ignore_forked_repos: false,
            emails: Vec::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup.
    ///
    /// Fails before any network activity when the token or the user is
    /// missing; every other setting is optional.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_token = lookup(TOKEN_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let username = lookup(USER_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingUser)?;

        let mut emails = Vec::new();
        for email in split_list(lookup(EMAILS_VAR).as_deref()) {
            if !emails.contains(&email) {
                emails.push(email);
            }
        }

        Ok(Self {
            credentials: Credentials::new(username, access_token),
            exclude_repos: split_list(lookup(EXCLUDED_REPOS_VAR).as_deref()).collect(),
            exclude_langs: split_list(lookup(EXCLUDED_LANGS_VAR).as_deref()).collect(),
            ignore_forked_repos: lookup(IGNORE_FORKS_VAR)
                .as_deref()
                .is_some_and(is_truthy),
            emails,
        })
    }
}

/// Comma-separated list; items are trimmed and blanks dropped.
fn split_list(raw: Option<&str>) -> impl Iterator<Item = String> + '_ {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
}

/// Anything but an empty string or a literal `false` turns a flag on.
fn is_truthy(raw: &str) -> bool {
    !raw.is_empty() && !raw.trim().eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_token_before_anything_else() {
        let err = Config::from_lookup(lookup(&[(USER_VAR, "octo")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);

        let err = Config::from_lookup(lookup(&[(TOKEN_VAR, ""), (USER_VAR, "octo")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingToken);
    }

    #[test]
    fn requires_user() {
        let err = Config::from_lookup(lookup(&[(TOKEN_VAR, "t")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingUser);
        assert!(err.to_string().contains(USER_VAR));
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[(TOKEN_VAR, "t"), (USER_VAR, "octo")]))
            .expect("valid config");

        assert_eq!(config.username(), "octo");
        assert_eq!(config.credentials.access_token, "t");
        assert!(config.exclude_repos.is_empty());
        assert!(config.exclude_langs.is_empty());
        assert!(!config.ignore_forked_repos);
        assert!(config.emails.is_empty());
    }

    #[test]
    fn parses_lists_and_flags() {
        let config = Config::from_lookup(lookup(&[
            (TOKEN_VAR, "t"),
            (USER_VAR, "octo"),
            (EXCLUDED_REPOS_VAR, " octo/one , ,octo/two"),
            (EXCLUDED_LANGS_VAR, "HTML,CSS"),
            (IGNORE_FORKS_VAR, "yes"),
            (EMAILS_VAR, "a@x.io, b@x.io, a@x.io"),
        ]))
        .expect("valid config");

        assert_eq!(
            config.exclude_repos,
            HashSet::from(["octo/one".to_string(), "octo/two".to_string()])
        );
        assert!(config.exclude_langs.contains("HTML"));
        assert!(config.ignore_forked_repos);
        assert_eq!(config.emails, vec!["a@x.io".to_string(), "b@x.io".to_string()]);
    }

    #[test]
    fn truthiness_of_fork_flag() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy(" "));
        assert!(!is_truthy(""));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(" FALSE "));
    }

    #[test]
    fn debug_output_redacts_token() {
        let credentials = Credentials::new("octo", "ghp_secret");
        let printed = format!("{credentials:?}");
        assert!(printed.contains("octo"));
        assert!(!printed.contains("ghp_secret"));
    }
}
