//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `webhook.secret`.
pub const ENV_WEBHOOK_SECRET: &str = "WEBHOOK_SECRET";
/// Environment variable overriding `dispatch.token`.
pub const ENV_GITHUB_PAT: &str = "GITHUB_PAT";
/// Accepted for `dispatch.token` when `GITHUB_PAT` is unset.
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
/// Environment variable supplying `dispatch.owner` and `dispatch.repo` as
/// `owner/repo` when the file leaves them empty.
pub const ENV_GITHUB_REPOSITORY: &str = "GITHUB_REPOSITORY";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Secrets from the environment take precedence over the file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: GateConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay secrets read through `lookup` onto `config`.
///
/// Empty values are ignored so an exported-but-blank variable does not
/// clobber a configured secret.
pub fn apply_env_overrides<F>(config: &mut GateConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup(ENV_WEBHOOK_SECRET).filter(|s| !s.is_empty()) {
        config.webhook.secret = Some(secret);
    }
    let token = [ENV_GITHUB_PAT, ENV_GITHUB_TOKEN]
        .into_iter()
        .find_map(|key| lookup(key).filter(|s| !s.is_empty()));
    if let Some(token) = token {
        config.dispatch.token = Some(token);
    }
    let target_unset = config.dispatch.owner.is_empty() && config.dispatch.repo.is_empty();
    if let Some(repository) = lookup(ENV_GITHUB_REPOSITORY).filter(|_| target_unset) {
        match repository.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => {
                config.dispatch.owner = owner.to_string();
                config.dispatch.repo = repo.to_string();
            }
            _ if repository.is_empty() => {}
            _ => tracing::warn!(value = %repository, "Ignoring {} not in owner/repo form", ENV_GITHUB_REPOSITORY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let mut config = GateConfig::default();
        config.webhook.secret = Some("from-file".into());

        apply_env_overrides(&mut config, |key| match key {
            ENV_WEBHOOK_SECRET => Some("from-env".into()),
            ENV_GITHUB_TOKEN => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.webhook.secret.as_deref(), Some("from-env"));
        assert!(config.dispatch.token.is_none());
    }

    #[test]
    fn test_token_from_pat_or_alias() {
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| (key == ENV_GITHUB_PAT).then(|| "ghp_pat".to_string()));
        assert_eq!(config.dispatch.token.as_deref(), Some("ghp_pat"));

        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| (key == ENV_GITHUB_TOKEN).then(|| "ghp_alias".to_string()));
        assert_eq!(config.dispatch.token.as_deref(), Some("ghp_alias"));

        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_GITHUB_PAT => Some("ghp_pat".into()),
            ENV_GITHUB_TOKEN => Some("ghp_alias".into()),
            _ => None,
        });
        assert_eq!(config.dispatch.token.as_deref(), Some("ghp_pat"));

        // A blank PAT falls through to the alias.
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            ENV_GITHUB_PAT => Some(String::new()),
            ENV_GITHUB_TOKEN => Some("ghp_alias".into()),
            _ => None,
        });
        assert_eq!(config.dispatch.token.as_deref(), Some("ghp_alias"));
    }

    #[test]
    fn test_repository_override() {
        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| (key == ENV_GITHUB_REPOSITORY).then(|| "rower/logbook".to_string()));
        assert_eq!(config.dispatch.owner, "rower");
        assert_eq!(config.dispatch.repo, "logbook");

        // A configured target wins.
        apply_env_overrides(&mut config, |key| (key == ENV_GITHUB_REPOSITORY).then(|| "other/repo".to_string()));
        assert_eq!(config.dispatch.owner, "rower");

        let mut config = GateConfig::default();
        apply_env_overrides(&mut config, |key| (key == ENV_GITHUB_REPOSITORY).then(|| "no-slash".to_string()));
        assert!(config.dispatch.owner.is_empty());
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [dispatch]
            owner = "rower"
            repo = "logbook-backup"
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.dispatch.owner, "rower");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nwindow_secs = 0").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.contains(&ValidationError::Zero("rate_limit.window_secs")));
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_unparseable_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit\nwindow_secs = ").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
