//! Configuration validation.

use super::{Config, LoaderConfig};
use crate::error::{BulkMergeError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.target.host.is_empty() {
        return Err(BulkMergeError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(BulkMergeError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(BulkMergeError::Config("target.user is required".into()));
    }
    if config.target.schema.is_empty() {
        return Err(BulkMergeError::Config("target.schema cannot be empty".into()));
    }

    validate_loader(&config.loader)
}

/// Validate loader settings on their own.
pub fn validate_loader(loader: &LoaderConfig) -> Result<()> {
    if loader.inserts_per_thread == 0 {
        return Err(BulkMergeError::Config("loader.inserts_per_thread must be at least 1".into()));
    }
    if loader.command_timeout_secs == 0 {
        return Err(BulkMergeError::Config("loader.command_timeout_secs must be at least 1".into()));
    }
    if loader.connection_timeout_secs == 0 {
        return Err(BulkMergeError::Config(
            "loader.connection_timeout_secs must be at least 1".into(),
        ));
    }
    // The orchestrator keeps one connection for the whole run, so loader
    // tasks need at least one more.
    if loader.max_connections < 2 {
        return Err(BulkMergeError::Config(format!(
            "loader.max_connections must be at least 2, got {}",
            loader.max_connections
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LoaderConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            target: TargetConfig {
                host: "localhost".to_string(),
                port: 1433,
                database: "warehouse".to_string(),
                user: "sa".to_string(),
                password: "password".to_string(),
                schema: "dbo".to_string(),
                ssl_mode: "disable".to_string(),
            },
            loader: LoaderConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_target_host() {
        let mut config = valid_config();
        config.target.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_target_user() {
        let mut config = valid_config();
        config.target.user = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_chunk_size() {
        let mut config = valid_config();
        config.loader.inserts_per_thread = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("inserts_per_thread"));
    }

    #[test]
    fn test_zero_command_timeout() {
        let mut config = valid_config();
        config.loader.command_timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_pool_must_leave_room_for_loaders() {
        let mut config = valid_config();
        config.loader.max_connections = 1;
        assert!(validate(&config).is_err());
        config.loader.max_connections = 2;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_loader_alone() {
        let loader = LoaderConfig {
            max_connections: 0,
            ..LoaderConfig::default()
        };
        let err = validate_loader(&loader).unwrap_err();
        assert!(err.to_string().contains("max_connections"));
        assert!(validate_loader(&LoaderConfig::default()).is_ok());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
