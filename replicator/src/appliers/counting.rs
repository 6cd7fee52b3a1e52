use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::appliers::Applier;
use crate::augmenter::{AugmentedRowsEvent, AugmentedSchemaChangeEvent};
use crate::binlog::RawEvent;
use crate::error::ApplierError;

/// Wraps an applier to count the replicated work flowing through it.
///
/// Only calls that represent a unit of replicated work bump the counter;
/// structural calls (rotation, flushing, waiting) are forwarded uncounted.
/// The wrapper never alters timing, ordering, or error propagation, and a
/// call that errors is not counted.
pub struct EventCountingApplier<A> {
    wrapped: A,
    counter: Arc<AtomicU64>,
}

impl<A: Applier> EventCountingApplier<A> {
    pub fn new(wrapped: A, counter: Arc<AtomicU64>) -> EventCountingApplier<A> {
        EventCountingApplier { wrapped, counter }
    }

    fn count_one(&self) {
        self.counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl<A: Applier> Applier for EventCountingApplier<A> {
    async fn apply_rows(&self, event: AugmentedRowsEvent) -> Result<(), ApplierError> {
        self.wrapped.apply_rows(event).await?;
        self.count_one();
        Ok(())
    }

    async fn apply_schema_change(
        &self,
        event: AugmentedSchemaChangeEvent,
    ) -> Result<(), ApplierError> {
        self.wrapped.apply_schema_change(event).await?;
        self.count_one();
        Ok(())
    }

    async fn apply_commit(&self) -> Result<(), ApplierError> {
        self.wrapped.apply_commit().await?;
        self.count_one();
        Ok(())
    }

    async fn apply_format_description(&self, event: &RawEvent) -> Result<(), ApplierError> {
        self.wrapped.apply_format_description(event).await?;
        self.count_one();
        Ok(())
    }

    async fn apply_table_map(&self, event: &RawEvent) -> Result<(), ApplierError> {
        self.wrapped.apply_table_map(event).await?;
        self.count_one();
        Ok(())
    }

    async fn apply_rotate(&self, event: &RawEvent) -> Result<(), ApplierError> {
        self.wrapped.apply_rotate(event).await
    }

    async fn force_flush(&self) -> Result<(), ApplierError> {
        self.wrapped.force_flush().await
    }

    async fn wait_until_all_rows_committed(&self) -> Result<(), ApplierError> {
        self.wrapped.wait_until_all_rows_committed().await
    }
}
