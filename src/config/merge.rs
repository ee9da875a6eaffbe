//! Configuration merging utilities
//!
//! This module provides functions to merge configuration from files
//! with command-line arguments, where CLI arguments take precedence.

use super::args::ServerArgs;
use super::file::ConfigFile;
use super::*;

/// Merge configuration file values with CLI arguments.
/// CLI arguments take precedence over config file values.
/// Only applies config file values where CLI uses defaults.
pub fn merge_config_with_args(mut args: ServerArgs, config: &ConfigFile) -> ServerArgs {
    // Helper macro to apply config value if CLI is at default
    macro_rules! apply_if_default {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(val) = $config_val {
                if args.$field == $default {
                    args.$field = val;
                }
            }
        };
    }

    macro_rules! apply_if_default_string {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(ref val) = $config_val {
                if args.$field == $default {
                    args.$field = val.clone();
                }
            }
        };
    }

    macro_rules! apply_option {
        ($field:ident, $config_val:expr) => {
            if args.$field.is_none() {
                if let Some(val) = $config_val {
                    args.$field = Some(val);
                }
            }
        };
    }

    // Server section
    apply_if_default_string!(bind_addr, config.server.bind_addr, DEFAULT_BIND_ADDR);
    apply_if_default_string!(log_level, config.server.log_level, DEFAULT_LOG_LEVEL);
    apply_if_default!(
        ws_keepalive_secs,
        config.server.ws_keepalive_secs,
        DEFAULT_WS_KEEPALIVE_SECS
    );
    apply_if_default!(
        shutdown_timeout,
        config.server.shutdown_timeout,
        crate::server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT_SECS
    );
    apply_if_default!(
        drain_timeout,
        config.server.drain_timeout,
        crate::server::shutdown::DEFAULT_DRAIN_TIMEOUT_SECS
    );

    // Storage section
    if let Some(ref path) = config.storage.db_path {
        if args.db_path == std::path::Path::new(DEFAULT_DB_PATH) {
            args.db_path = path.clone();
        }
    }
    apply_if_default!(in_memory, config.storage.in_memory, DEFAULT_IN_MEMORY);

    // Auth section
    apply_option!(jwt_secret, config.auth.jwt_secret.clone());
    apply_if_default!(
        token_ttl_days,
        config.auth.token_ttl_days,
        DEFAULT_TOKEN_TTL_DAYS
    );

    // Bus section
    apply_if_default!(
        topic_capacity,
        config.bus.topic_capacity,
        crate::pubsub::DEFAULT_TOPIC_CAPACITY
    );

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// Create default ServerArgs for testing
    fn default_args() -> ServerArgs {
        ServerArgs {
            config: None,
            generate_config: false,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            in_memory: DEFAULT_IN_MEMORY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            jwt_secret: None,
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            topic_capacity: crate::pubsub::DEFAULT_TOPIC_CAPACITY,
            ws_keepalive_secs: DEFAULT_WS_KEEPALIVE_SECS,
            shutdown_timeout: crate::server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            drain_timeout: crate::server::shutdown::DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }

    /// Create an empty ConfigFile for testing
    fn empty_config() -> ConfigFile {
        ConfigFile::default()
    }

    #[test]
    fn test_merge_with_empty_config() {
        let args = default_args();
        let config = empty_config();

        let merged = merge_config_with_args(args.clone(), &config);

        // With empty config, args should remain unchanged
        assert_eq!(merged.bind_addr, args.bind_addr);
        assert_eq!(merged.db_path, args.db_path);
        assert_eq!(merged.log_level, args.log_level);
        assert_eq!(merged.token_ttl_days, args.token_ttl_days);
    }

    #[test]
    fn test_merge_server_section() {
        let args = default_args();
        let mut config = empty_config();

        config.server.bind_addr = Some("0.0.0.0:9000".to_string());
        config.server.log_level = Some("debug".to_string());
        config.server.ws_keepalive_secs = Some(60);
        config.server.shutdown_timeout = Some(45);

        let merged = merge_config_with_args(args, &config);

        assert_eq!(merged.bind_addr, "0.0.0.0:9000");
        assert_eq!(merged.log_level, "debug");
        assert_eq!(merged.ws_keepalive_secs, 60);
        assert_eq!(merged.shutdown_timeout, 45);
    }

    #[test]
    fn test_cli_takes_precedence_over_config() {
        let mut args = default_args();
        // CLI sets non-default values
        args.bind_addr = "192.168.1.1:8080".to_string();
        args.log_level = "warn".to_string();

        let mut config = empty_config();
        // Config file tries to set different values
        config.server.bind_addr = Some("127.0.0.1:9000".to_string());
        config.server.log_level = Some("debug".to_string());

        let merged = merge_config_with_args(args, &config);

        // CLI values should take precedence
        assert_eq!(merged.bind_addr, "192.168.1.1:8080");
        assert_eq!(merged.log_level, "warn");
    }

    #[test]
    fn test_merge_storage_section() {
        let args = default_args();
        let mut config = empty_config();

        config.storage.db_path = Some(PathBuf::from("/custom/blog.db"));
        config.storage.in_memory = Some(true);

        let merged = merge_config_with_args(args, &config);

        assert_eq!(merged.db_path, PathBuf::from("/custom/blog.db"));
        assert!(merged.in_memory);
    }

    #[test]
    fn test_merge_auth_section() {
        let args = default_args();
        let mut config = empty_config();

        config.auth.jwt_secret = Some("file-secret".to_string());
        config.auth.token_ttl_days = Some(30);

        let merged = merge_config_with_args(args, &config);

        assert_eq!(merged.jwt_secret, Some("file-secret".to_string()));
        assert_eq!(merged.token_ttl_days, 30);
    }

    #[test]
    fn test_merge_bus_section() {
        let args = default_args();
        let mut config = empty_config();

        config.bus.topic_capacity = Some(4096);

        let merged = merge_config_with_args(args, &config);

        assert_eq!(merged.topic_capacity, 4096);
    }

    #[test]
    fn test_cli_option_set_config_also_set() {
        let mut args = default_args();
        // CLI explicitly sets the secret
        args.jwt_secret = Some("cli-secret".to_string());

        let mut config = empty_config();
        config.auth.jwt_secret = Some("file-secret".to_string());

        let merged = merge_config_with_args(args, &config);

        // CLI value should win for Option fields
        assert_eq!(merged.jwt_secret, Some("cli-secret".to_string()));
    }

    #[test]
    fn test_partial_config_merge() {
        let args = default_args();
        let mut config = empty_config();

        // Only set a few values
        config.server.log_level = Some("trace".to_string());
        config.storage.in_memory = Some(true);

        let merged = merge_config_with_args(args, &config);

        // Only specified values should change
        assert_eq!(merged.log_level, "trace");
        assert!(merged.in_memory);

        // Other values should remain at defaults
        assert_eq!(merged.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(merged.token_ttl_days, DEFAULT_TOKEN_TTL_DAYS);
        assert_eq!(merged.topic_capacity, crate::pubsub::DEFAULT_TOPIC_CAPACITY);
    }
}
