//! Service configuration
//!
//! Configuration is read from an optional TOML file, with every value
//! overridable through `HANDOFF_`-prefixed environment variables (nested
//! sections are separated by `__`, e.g. `HANDOFF_JOB_DB__URL`).

use std::{net::SocketAddr, path::Path};

use figment::{
    providers::{Env, Format as _, Toml},
    Figment,
};
use job_db::DEFAULT_POOL_SIZE;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Extract(#[from] figment::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the event API binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    pub job_db: JobDbConfig,

    pub transfer: TransferConfig,

    /// Downstream notification of the polling function. Omitting the section
    /// disables notification entirely.
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDbConfig {
    /// Database connection URL
    pub url: String,

    /// Size of the connection pool (default: 10)
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferConfig {
    /// ARN of the internal bucket holding finished job output.
    pub source_bucket_arn: String,

    /// ARN of the role DataSync assumes to access both buckets.
    pub bucket_access_role_arn: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Secrets Manager secret whose JSON value holds the polling function ARN.
    pub secret_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Emit JSON-formatted log lines.
    #[serde(default)]
    pub json: bool,
}

fn default_listen_addr() -> SocketAddr {
    ([0, 0, 0, 0], 1620).into()
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

impl Config {
    /// Loads the configuration from `file` (if given) merged with the
    /// environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        let config = figment
            .merge(Env::prefixed("HANDOFF_").split("__"))
            .extract()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn minimal_file_fills_in_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "handoff.toml",
                r#"
                    [job_db]
                    url = "postgres://localhost/handoff"

                    [transfer]
                    source_bucket_arn = "arn:aws:s3:::internal-output"
                    bucket_access_role_arn = "arn:aws:iam::123456789012:role/bucket-access"
                "#,
            )?;

            let config = Config::load(Some(Path::new("handoff.toml"))).expect("config loads");

            assert_eq!(config.job_db.pool_size, 10);
            assert_eq!(config.listen_addr, ([0, 0, 0, 0], 1620).into());
            assert!(config.notifier.is_none());
            assert!(!config.log.json);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "handoff.toml",
                r#"
                    [job_db]
                    url = "postgres://localhost/handoff"
                    pool_size = 5

                    [transfer]
                    source_bucket_arn = "arn:aws:s3:::internal-output"
                    bucket_access_role_arn = "arn:aws:iam::123456789012:role/bucket-access"

                    [notifier]
                    secret_id = "handoff/polling"
                "#,
            )?;
            jail.set_env("HANDOFF_JOB_DB__POOL_SIZE", "20");
            jail.set_env("HANDOFF_LOG__JSON", "true");

            let config = Config::load(Some(Path::new("handoff.toml"))).expect("config loads");

            assert_eq!(config.job_db.pool_size, 20);
            assert!(config.log.json);
            assert_eq!(
                config.notifier.expect("notifier configured").secret_id,
                "handoff/polling"
            );
            Ok(())
        });
    }
}
