use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

/// Everything needed to launch and talk to the wallet daemon.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Full path to the walletd binary
    pub path: String,
    /// Address the daemon binds its RPC server to
    pub bind_address: String,
    pub rpc_port: u16,
    pub rpc_password: String,
    /// Full path to the encrypted container file
    pub container_file: String,
    pub container_password: String,
    /// Upstream network node the daemon syncs from
    pub node_address: String,
    pub node_port: u16,
    pub log_file: String,
    /// 0 - 4 verbosity
    pub log_level: u8,
}

/// Intervals and thresholds for the periodic supervision tasks.
/// All intervals are in milliseconds, matching the daemon's own units.
#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    /// Path of the persisted `{scanHeight, lastBlock}` record
    pub progress_file: String,
    /// Ping the daemon every n ms
    pub polling_interval_ms: u64,
    /// Look for new transactions every n ms
    pub scan_interval_ms: u64,
    /// Save and back up the container every n ms
    pub save_interval_ms: u64,
    /// Per-ping timeout in ms
    pub ping_timeout_ms: u64,
    pub max_ping_failures: u32,
    pub max_backup_failures: u32,
    /// First restart delay after a fatal error; doubles per attempt
    pub restart_backoff_ms: u64,
    pub restart_backoff_cap_ms: u64,
}

impl SupervisorConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_millis(self.save_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Chain parameters that change when the service is forked to another network.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Minor units per display unit (100 for TRTL)
    pub divisor: u32,
    /// Network fee in minor units
    pub fee: u64,
    /// Ring size for outgoing transactions
    pub mixin: u64,
    /// Human-readable address prefix
    pub address_prefix: String,
    /// Accepted address body lengths, excluding the prefix
    pub address_body_lengths: Vec<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub daemon: DaemonConfig,
    pub supervisor: SupervisorConfig,
    pub chain: ChainConfig,
}

impl ServiceConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // Database defaults
            .set_default("database.host", "localhost")?
            .set_default("database.port", 3306)?
            .set_default("database.user", "root")?
            .set_default("database.password", "")?
            .set_default("database.name", "tx_history")?
            .set_default("database.max_connections", 20)?
            // Daemon defaults
            .set_default("daemon.path", "./turtle-service")?
            .set_default("daemon.bind_address", "localhost")?
            .set_default("daemon.rpc_port", 8070)?
            .set_default("daemon.rpc_password", "")?
            .set_default("daemon.container_file", "./data/container.wallet")?
            .set_default("daemon.container_password", "")?
            .set_default("daemon.node_address", "turtlenode.online")?
            .set_default("daemon.node_port", 11898)?
            .set_default("daemon.log_file", "./data/turtle.log")?
            .set_default("daemon.log_level", 4)?
            // Supervisor defaults
            .set_default("supervisor.progress_file", "./data/ha.data")?
            .set_default("supervisor.polling_interval_ms", 10_000)?
            .set_default("supervisor.scan_interval_ms", 5_000)?
            .set_default("supervisor.save_interval_ms", 60_000)?
            .set_default("supervisor.ping_timeout_ms", 5_000)?
            .set_default("supervisor.max_ping_failures", 30)?
            .set_default("supervisor.max_backup_failures", 5)?
            .set_default("supervisor.restart_backoff_ms", 1_000)?
            .set_default("supervisor.restart_backoff_cap_ms", 60_000)?
            // Chain defaults (TRTL)
            .set_default("chain.divisor", 100)?
            .set_default("chain.fee", 10)?
            .set_default("chain.mixin", 3)?
            .set_default("chain.address_prefix", "TRTL")?
            .set_default("chain.address_body_lengths", vec![95, 183])?
            // Load from config.toml if exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (prefix: WALLET_)
            // Use __ as separator so WALLET_DAEMON__RPC_PASSWORD -> daemon.rpc_password
            .add_source(
                Environment::with_prefix("WALLET")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let service_config: ServiceConfig = config.try_deserialize()?;

        service_config.validate()?;

        Ok(service_config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.rpc_password.is_empty() {
            return Err(ConfigError::Message(
                "Daemon RPC password cannot be empty".to_string(),
            ));
        }
        if self.daemon.container_file.is_empty() {
            return Err(ConfigError::Message(
                "Container file path cannot be empty".to_string(),
            ));
        }
        if self.database.host.is_empty() {
            return Err(ConfigError::Message(
                "Database host cannot be empty".to_string(),
            ));
        }
        if self.database.name.is_empty() {
            return Err(ConfigError::Message(
                "Database name cannot be empty".to_string(),
            ));
        }
        if self.chain.divisor == 0 {
            return Err(ConfigError::Message(
                "Chain divisor must be positive".to_string(),
            ));
        }
        if self.supervisor.max_ping_failures == 0 {
            return Err(ConfigError::Message(
                "max_ping_failures must be positive".to_string(),
            ));
        }
        Ok(())
    }

}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 3306,
                user: "root".to_string(),
                password: "".to_string(),
                name: "tx_history".to_string(),
                max_connections: 20,
            },
            daemon: DaemonConfig {
                path: "./turtle-service".to_string(),
                bind_address: "localhost".to_string(),
                rpc_port: 8070,
                rpc_password: "change-me".to_string(),
                container_file: "./data/container.wallet".to_string(),
                container_password: "".to_string(),
                node_address: "turtlenode.online".to_string(),
                node_port: 11898,
                log_file: "./data/turtle.log".to_string(),
                log_level: 4,
            },
            supervisor: SupervisorConfig {
                progress_file: "./data/ha.data".to_string(),
                polling_interval_ms: 10_000,
                scan_interval_ms: 5_000,
                save_interval_ms: 60_000,
                ping_timeout_ms: 5_000,
                max_ping_failures: 30,
                max_backup_failures: 5,
                restart_backoff_ms: 1_000,
                restart_backoff_cap_ms: 60_000,
            },
            chain: ChainConfig {
                divisor: 100,
                fee: 10,
                mixin: 3,
                address_prefix: "TRTL".to_string(),
                address_body_lengths: vec![95, 183],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_trtl_network() {
        let config = ServiceConfig::default();
        assert_eq!(config.chain.divisor, 100);
        assert_eq!(config.chain.fee, 10);
        assert_eq!(config.daemon.rpc_port, 8070);
        assert_eq!(config.supervisor.max_ping_failures, 30);
    }

    #[test]
    fn intervals_convert_to_durations() {
        let config = ServiceConfig::default();
        assert_eq!(config.supervisor.ping_timeout(), Duration::from_secs(5));
        assert_eq!(
            config.supervisor.polling_interval(),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn database_url_includes_credentials() {
        let config = ServiceConfig::default();
        assert_eq!(
            config.database.url(),
            "mysql://root:@localhost:3306/tx_history"
        );
    }
}
