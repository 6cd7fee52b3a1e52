use thiserror::Error;

/// Errors surfaced through the [`Applier`](crate::appliers::Applier) contract.
///
/// Any `Err` means the orchestrator must stop advancing the binlog position:
/// acknowledging past a failed delivery would turn at-least-once into
/// silent loss.
#[derive(Error, Debug)]
pub enum ApplierError {
    #[error("row change carries no table name")]
    MissingTableName,

    #[error("row identity {current} does not sort after {previous}; binlog segment replayed or out of order")]
    OrderingViolation { previous: String, current: String },

    #[error("an earlier publish to kafka failed, refusing to send further rows")]
    PublishFailed,

    #[error("failed to serialize row: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("kafka client error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}
