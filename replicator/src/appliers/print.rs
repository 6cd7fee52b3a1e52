use async_trait::async_trait;

use metrics::{counter, histogram};
use tracing::info;

use crate::appliers::Applier;
use crate::augmenter::{AugmentedRowsEvent, AugmentedSchemaChangeEvent};
use crate::binlog::RawEvent;
use crate::error::ApplierError;

/// Logs replicated work instead of delivering it. Handy when bringing up a
/// new source without a broker in the loop.
pub struct PrintApplier;

#[async_trait]
impl Applier for PrintApplier {
    async fn apply_rows(&self, event: AugmentedRowsEvent) -> Result<(), ApplierError> {
        histogram!("replicator_print_rows_batch_size").record(event.rows.len() as f64);
        counter!("replicator_print_rows_total").increment(event.rows.len() as u64);
        for row in &event.rows {
            info!("row change: {row:?}");
        }
        Ok(())
    }

    async fn apply_schema_change(
        &self,
        event: AugmentedSchemaChangeEvent,
    ) -> Result<(), ApplierError> {
        info!("schema change on {}: {:?}", event.schema_name, event.payload);
        Ok(())
    }

    async fn apply_commit(&self) -> Result<(), ApplierError> {
        info!("transaction commit");
        Ok(())
    }

    async fn apply_format_description(&self, _event: &RawEvent) -> Result<(), ApplierError> {
        Ok(())
    }

    async fn apply_table_map(&self, _event: &RawEvent) -> Result<(), ApplierError> {
        Ok(())
    }

    async fn apply_rotate(&self, event: &RawEvent) -> Result<(), ApplierError> {
        info!("binlog rotated to {:?}", event.rotate_file());
        Ok(())
    }

    async fn force_flush(&self) -> Result<(), ApplierError> {
        Ok(())
    }

    async fn wait_until_all_rows_committed(&self) -> Result<(), ApplierError> {
        Ok(())
    }
}
