use std::collections::HashSet;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Comma-delimited table names whose row changes are delivered.
    /// Rows for any other table are counted as outliers and skipped.
    pub table_allow_list: String,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,
}

impl Config {
    pub fn allowed_tables(&self) -> HashSet<String> {
        self.table_allow_list
            .split(',')
            .map(str::trim)
            .filter(|table| !table.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    pub kafka_hosts: String,

    /// Destination topic; one topic per replicated schema.
    pub kafka_topic: String,

    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "100000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "")]
    pub kafka_client_id: String,

    /// Budget for draining in-flight sends when the producer is cycled on a
    /// binlog rotation, and for explicit flushes.
    #[envconfig(default = "30000")]
    pub producer_close_timeout_ms: u64,

    /// Per-attempt poll timeout while recovering the last delivered row of a
    /// partition at startup.
    #[envconfig(default = "1000")]
    pub recovery_poll_timeout_ms: u64,

    /// Poll attempts per partition before startup recovery is declared failed.
    #[envconfig(default = "100")]
    pub recovery_poll_rounds: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_allow_list(raw: &str) -> Config {
        Config {
            table_allow_list: raw.to_string(),
            kafka: KafkaConfig {
                kafka_hosts: "localhost:9092".to_string(),
                kafka_topic: "replicated".to_string(),
                kafka_producer_linger_ms: 20,
                kafka_producer_queue_mib: 400,
                kafka_message_timeout_ms: 100000,
                kafka_compression_codec: "none".to_string(),
                kafka_tls: false,
                kafka_client_id: String::new(),
                producer_close_timeout_ms: 30000,
                recovery_poll_timeout_ms: 1000,
                recovery_poll_rounds: 100,
            },
        }
    }

    #[test]
    fn allow_list_splits_and_trims() {
        let config = config_with_allow_list("orders, users ,payments");
        let tables = config.allowed_tables();
        assert_eq!(tables.len(), 3);
        assert!(tables.contains("orders"));
        assert!(tables.contains("users"));
        assert!(tables.contains("payments"));
    }

    #[test]
    fn empty_allow_list_yields_no_tables() {
        assert!(config_with_allow_list("").allowed_tables().is_empty());
        assert!(config_with_allow_list(" , ,").allowed_tables().is_empty());
    }
}
