use async_trait::async_trait;

use crate::augmenter::{AugmentedRowsEvent, AugmentedSchemaChangeEvent};
use crate::binlog::RawEvent;
use crate::error::ApplierError;

pub mod counting;
pub mod kafka;
pub mod print;

/// Sink contract invoked once per classified binlog event.
///
/// Implementations are free to no-op any per-kind hook. Every operation may
/// report a delivery error, and callers must stop advancing the binlog
/// position when one does.
#[async_trait]
pub trait Applier: Send + Sync {
    /// Deliver a batch of row changes from one source log event. Takes the
    /// event by value: the applier owns the rows from here on, including the
    /// right to assign their `unique_id`.
    async fn apply_rows(&self, event: AugmentedRowsEvent) -> Result<(), ApplierError>;

    async fn apply_schema_change(
        &self,
        event: AugmentedSchemaChangeEvent,
    ) -> Result<(), ApplierError>;

    /// Transaction commit (XID or COMMIT query).
    async fn apply_commit(&self) -> Result<(), ApplierError>;

    async fn apply_format_description(&self, event: &RawEvent) -> Result<(), ApplierError>;

    async fn apply_table_map(&self, event: &RawEvent) -> Result<(), ApplierError>;

    /// Binlog file switch. Only issued at a point where flushing is safe.
    async fn apply_rotate(&self, event: &RawEvent) -> Result<(), ApplierError>;

    /// Block until all previously accepted work is durably confirmed.
    async fn force_flush(&self) -> Result<(), ApplierError>;

    /// Block until outstanding asynchronous work has completed.
    async fn wait_until_all_rows_committed(&self) -> Result<(), ApplierError>;
}
