use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use async_trait::async_trait;
use metrics::{counter, gauge, histogram};
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::{ClientConfig, Offset, TopicPartitionList};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, instrument, warn};

use crate::appliers::Applier;
use crate::augmenter::{AugmentedRowsEvent, AugmentedSchemaChangeEvent};
use crate::binlog::RawEvent;
use crate::config::{Config, KafkaConfig};
use crate::error::ApplierError;
use crate::identity::{partition_for, RowIdentity};
use crate::prometheus::{
    OUTLIER_ROWS_TOTAL, PRODUCER_CLOSE_SECONDS, PUBLISH_FAILURES_TOTAL, ROWS_SENT_TOTAL,
};

/// Delivered-row count between progress log lines; also the outlier sampling
/// cadence.
const PROGRESS_LOG_EVERY: u64 = 500;

struct KafkaContext;

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        gauge!("replicator_kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        gauge!("replicator_kafka_callback_queue_depth").set(stats.replyq as f64);
    }
}

/// Applier that publishes each allow-listed row to a partitioned Kafka topic,
/// keyed and deduplicated by [`RowIdentity`].
///
/// All dedup state lives in memory and is reconstructed from the broker at
/// construction time; the engine keeps no durable local store.
pub struct KafkaApplier {
    producer: Mutex<FutureProducer<KafkaContext>>,
    producer_config: ClientConfig,
    topic: String,
    allowed_tables: HashSet<String>,
    partition_count: i32,
    /// Greatest identity confirmed present in the broker, per partition.
    /// Advanced from the ack context as sends succeed.
    high_water_marks: Arc<Mutex<HashMap<i32, RowIdentity>>>,
    /// Identity of the last row processed by this instance, for the strict
    /// monotonicity check.
    last_identity: Mutex<Option<RowIdentity>>,
    publish_failed: Arc<AtomicBool>,
    publish_failures: Arc<AtomicU64>,
    rows_sent: AtomicU64,
    outlier_rows: AtomicU64,
    in_flight: TaskTracker,
    close_timeout: Duration,
}

impl KafkaApplier {
    pub fn new(config: &Config) -> anyhow::Result<KafkaApplier> {
        let kafka = &config.kafka;
        info!("connecting to kafka brokers at {}...", kafka.kafka_hosts);

        let mut producer_config = ClientConfig::new();
        producer_config
            .set("bootstrap.servers", &kafka.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("acks", "all")
            // Retries must not reorder sends within a partition, so pin the
            // request pipeline depth instead of relying on broker support for
            // idempotent producers.
            .set("max.in.flight.requests.per.connection", "1")
            .set("linger.ms", kafka.kafka_producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                kafka.kafka_message_timeout_ms.to_string(),
            )
            .set("compression.codec", kafka.kafka_compression_codec.clone())
            .set(
                "queue.buffering.max.kbytes",
                (kafka.kafka_producer_queue_mib * 1024).to_string(),
            );

        if !kafka.kafka_client_id.is_empty() {
            producer_config.set("client.id", &kafka.kafka_client_id);
        }

        if kafka.kafka_tls {
            producer_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka configuration: {:?}", producer_config);
        let producer: FutureProducer<KafkaContext> =
            producer_config.create_with_context(KafkaContext)?;

        let metadata = producer
            .client()
            .fetch_metadata(Some(&kafka.kafka_topic), Duration::from_secs(10))
            .context("fetching destination topic metadata")?;
        let partition_count = metadata
            .topics()
            .iter()
            .find(|topic| topic.name() == kafka.kafka_topic)
            .map(|topic| topic.partitions().len() as i32)
            .unwrap_or(0);
        if partition_count == 0 {
            bail!(
                "destination topic {} has no partitions or does not exist",
                kafka.kafka_topic
            );
        }
        info!(
            topic = %kafka.kafka_topic,
            partition_count, "connected to kafka brokers"
        );

        let high_water_marks = recover_high_water_marks(kafka, partition_count)?;
        info!(
            recovered = high_water_marks.len(),
            "per-partition delivery state rebuilt from the broker"
        );
        for (partition, mark) in &high_water_marks {
            info!(partition = *partition, last_delivered = %mark, "recovered high-water mark");
        }

        Ok(KafkaApplier {
            producer: Mutex::new(producer),
            producer_config,
            topic: kafka.kafka_topic.clone(),
            allowed_tables: config.allowed_tables(),
            partition_count,
            high_water_marks: Arc::new(Mutex::new(high_water_marks)),
            last_identity: Mutex::new(None),
            publish_failed: Arc::new(AtomicBool::new(false)),
            publish_failures: Arc::new(AtomicU64::new(0)),
            rows_sent: AtomicU64::new(0),
            outlier_rows: AtomicU64::new(0),
            in_flight: TaskTracker::new(),
            close_timeout: Duration::from_millis(kafka.producer_close_timeout_ms),
        })
    }

    /// Rows published by this instance (not counting dedup or outlier skips).
    pub fn rows_sent(&self) -> u64 {
        self.rows_sent.load(Ordering::Relaxed)
    }

    /// Rows skipped because their table is not allow-listed.
    pub fn outlier_rows(&self) -> u64 {
        self.outlier_rows.load(Ordering::Relaxed)
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }

    fn submit(
        &self,
        partition: i32,
        identity: &RowIdentity,
        payload: &str,
    ) -> Result<DeliveryFuture, ApplierError> {
        let producer = self.producer.lock().unwrap().clone();
        match producer.send_result(FutureRecord {
            topic: self.topic.as_str(),
            payload: Some(payload),
            partition: Some(partition),
            key: Some(identity.as_str()),
            timestamp: None,
            headers: None,
        }) {
            Ok(delivery) => Ok(delivery),
            Err((e, _)) => {
                error!(%identity, partition, error = %e, "kafka refused the row at enqueue time");
                Err(ApplierError::Kafka(e))
            }
        }
    }

    /// Watch one in-flight send. On failure the shared flag halts the engine
    /// at the next delivery call; on success the partition's high-water mark
    /// advances.
    fn spawn_ack_watcher(&self, partition: i32, identity: RowIdentity, delivery: DeliveryFuture) {
        let publish_failed = Arc::clone(&self.publish_failed);
        let publish_failures = Arc::clone(&self.publish_failures);
        let high_water_marks = Arc::clone(&self.high_water_marks);
        drop(self.in_flight.spawn(async move {
            let failure = match delivery.await {
                Ok(Ok(_)) => {
                    let mut marks = high_water_marks.lock().unwrap();
                    match marks.entry(partition) {
                        Entry::Occupied(mut mark) => {
                            if *mark.get() < identity {
                                mark.insert(identity);
                            }
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(identity);
                        }
                    }
                    return;
                }
                Ok(Err((e, _))) => format!("broker rejected the row: {e}"),
                Err(_) => "ack wait cancelled before the write timeout".to_string(),
            };

            error!(partition, error = %failure, "failed to produce row to kafka");
            let _ = publish_failed.compare_exchange(
                false,
                true,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            publish_failures.fetch_add(1, Ordering::SeqCst);
            counter!(PUBLISH_FAILURES_TOTAL).increment(1);
        }));
    }

    /// Wait for every previously spawned ack watcher to finish.
    async fn drain_in_flight(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }

    fn fail_if_flagged(&self) -> Result<(), ApplierError> {
        if self.publish_failed.load(Ordering::SeqCst) {
            return Err(ApplierError::PublishFailed);
        }
        Ok(())
    }
}

#[async_trait]
impl Applier for KafkaApplier {
    #[instrument(skip_all, fields(binlog_file = %event.binlog_file_name, rows = event.rows.len()))]
    async fn apply_rows(&self, event: AugmentedRowsEvent) -> Result<(), ApplierError> {
        let binlog_file = event.binlog_file_name;
        for mut row in event.rows {
            self.fail_if_flagged()?;

            let Some(table_name) = row.table_name.clone() else {
                error!(
                    binlog_file = %binlog_file,
                    position = row.position,
                    "row change without a table name"
                );
                return Err(ApplierError::MissingTableName);
            };

            if !self.allowed_tables.contains(&table_name) {
                let outliers = self.outlier_rows.fetch_add(1, Ordering::Relaxed) + 1;
                counter!(OUTLIER_ROWS_TOTAL).increment(1);
                if outliers % PROGRESS_LOG_EVERY == 0 {
                    warn!(
                        outliers,
                        table = %table_name,
                        "still skipping rows for tables outside the allow-list"
                    );
                }
                continue;
            }

            let identity = RowIdentity::new(&binlog_file, row.position, row.row_seq);
            {
                let mut last = self.last_identity.lock().unwrap();
                if let Some(previous) = last.as_ref() {
                    if identity <= *previous {
                        return Err(ApplierError::OrderingViolation {
                            previous: previous.to_string(),
                            current: identity.to_string(),
                        });
                    }
                }
                *last = Some(identity.clone());
            }

            let partition = partition_for(&table_name, self.partition_count);
            let already_delivered = {
                let marks = self.high_water_marks.lock().unwrap();
                marks.get(&partition).is_some_and(|mark| identity <= *mark)
            };
            if already_delivered {
                debug!(%identity, partition, "row was delivered before the last restart, skipping");
                continue;
            }

            row.unique_id = Some(identity.as_str().to_owned());
            let payload = serde_json::to_string(&row)?;
            let delivery = self.submit(partition, &identity, &payload)?;
            self.spawn_ack_watcher(partition, identity, delivery);

            let sent = self.rows_sent.fetch_add(1, Ordering::Relaxed) + 1;
            counter!(ROWS_SENT_TOTAL).increment(1);
            if sent % PROGRESS_LOG_EVERY == 0 {
                info!(rows_sent = sent, "delivered another batch of rows to kafka");
            }
        }
        Ok(())
    }

    async fn apply_schema_change(
        &self,
        event: AugmentedSchemaChangeEvent,
    ) -> Result<(), ApplierError> {
        // Schema bookkeeping belongs to appliers that maintain schema state.
        debug!(schema = %event.schema_name, "schema change observed, nothing to publish");
        Ok(())
    }

    async fn apply_commit(&self) -> Result<(), ApplierError> {
        Ok(())
    }

    async fn apply_format_description(&self, _event: &RawEvent) -> Result<(), ApplierError> {
        Ok(())
    }

    async fn apply_table_map(&self, _event: &RawEvent) -> Result<(), ApplierError> {
        Ok(())
    }

    /// Cycle the producer on a binlog file switch: drain and flush within the
    /// close budget, then start a fresh connection. Bounds connection and
    /// queue growth across file boundaries and gives a hard confirmation
    /// point.
    #[instrument(skip_all)]
    async fn apply_rotate(&self, event: &RawEvent) -> Result<(), ApplierError> {
        let next_file = event.rotate_file().unwrap_or("<unknown>");
        info!(next_file, "binlog rotated, cycling the kafka producer");
        let started = Instant::now();

        self.in_flight.close();
        if tokio::time::timeout(self.close_timeout, self.in_flight.wait())
            .await
            .is_err()
        {
            warn!(
                timeout_ms = self.close_timeout.as_millis() as u64,
                "in-flight sends still unacknowledged at close timeout, abandoning them"
            );
        }
        self.in_flight.reopen();

        let fresh: FutureProducer<KafkaContext> =
            self.producer_config.create_with_context(KafkaContext)?;
        let old = std::mem::replace(&mut *self.producer.lock().unwrap(), fresh);
        if let Err(e) = old.flush(self.close_timeout) {
            warn!(error = %e, "old producer did not fully flush within the close timeout");
        }

        histogram!(PRODUCER_CLOSE_SECONDS).record(started.elapsed().as_secs_f64());
        info!("a fresh kafka producer is in place");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn force_flush(&self) -> Result<(), ApplierError> {
        let producer = self.producer.lock().unwrap().clone();
        producer.flush(self.close_timeout)?;
        self.drain_in_flight().await;
        self.fail_if_flagged()
    }

    #[instrument(skip_all)]
    async fn wait_until_all_rows_committed(&self) -> Result<(), ApplierError> {
        self.drain_in_flight().await;
        self.fail_if_flagged()
    }
}

/// Rebuild the per-partition dedup state from the broker.
///
/// For every partition with records, step back one offset from the high
/// watermark and poll until the stored row at that offset yields its
/// embedded identity. Failing to recover a non-empty partition is fatal:
/// starting with unknown dedup state risks silent loss or unbounded
/// duplication.
fn recover_high_water_marks(
    config: &KafkaConfig,
    partition_count: i32,
) -> anyhow::Result<HashMap<i32, RowIdentity>> {
    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_hosts)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "latest")
        .create()
        .context("creating recovery consumer")?;

    let poll_timeout = Duration::from_millis(config.recovery_poll_timeout_ms);
    let mut marks = HashMap::new();

    for partition in 0..partition_count {
        let (_low, high) = consumer
            .fetch_watermarks(&config.kafka_topic, partition, poll_timeout)
            .with_context(|| format!("fetching watermarks for partition {partition}"))?;
        if high <= 0 {
            debug!(partition, "no prior records, nothing to deduplicate against");
            continue;
        }

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(&config.kafka_topic, partition, Offset::Offset(high - 1))
            .context("building recovery assignment")?;
        consumer
            .assign(&assignment)
            .with_context(|| format!("assigning partition {partition} at offset {}", high - 1))?;

        let mut recovered: Option<RowIdentity> = None;
        for _ in 0..config.recovery_poll_rounds {
            match consumer.poll(poll_timeout) {
                Some(Ok(message)) => {
                    if message.partition() != partition {
                        // Residue from the previous partition's assignment.
                        continue;
                    }
                    let Some(payload) = message.payload() else {
                        continue;
                    };
                    match extract_unique_id(payload) {
                        Some(identity) => {
                            recovered = Some(RowIdentity::from_string(identity));
                            break;
                        }
                        None => {
                            warn!(
                                partition,
                                offset = message.offset(),
                                "stored record has no readable unique_id, skipping it"
                            );
                        }
                    }
                }
                Some(Err(e)) => warn!(partition, error = %e, "recovery poll error"),
                None => {}
            }
        }

        match recovered {
            Some(identity) => {
                marks.insert(partition, identity);
            }
            None => bail!(
                "could not read back the last delivered row for partition {partition} of {}; \
                 records may have been purged",
                config.kafka_topic
            ),
        }
    }

    Ok(marks)
}

fn extract_unique_id(payload: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    value.get("unique_id")?.as_str().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augmenter::AugmentedRow;
    use rdkafka::mocking::MockCluster;
    use rdkafka::producer::DefaultProducerContext;
    use serde_json::json;

    const TOPIC: &str = "replicated_rows";

    fn mock_config(bootstrap_servers: String, allow_list: &str) -> Config {
        Config {
            table_allow_list: allow_list.to_string(),
            kafka: KafkaConfig {
                kafka_hosts: bootstrap_servers,
                kafka_topic: TOPIC.to_string(),
                kafka_producer_linger_ms: 0,
                kafka_producer_queue_mib: 50,
                kafka_message_timeout_ms: 5000,
                kafka_compression_codec: "none".to_string(),
                kafka_tls: false,
                kafka_client_id: String::new(),
                producer_close_timeout_ms: 5000,
                recovery_poll_timeout_ms: 500,
                recovery_poll_rounds: 20,
            },
        }
    }

    fn row(table: Option<&str>, file: &str, position: u64, row_seq: u32) -> AugmentedRow {
        AugmentedRow {
            table_name: table.map(str::to_owned),
            binlog_file_name: file.to_string(),
            position,
            row_seq,
            payload: json!({"id": position}),
            unique_id: None,
        }
    }

    fn rows_event(file: &str, rows: Vec<AugmentedRow>) -> AugmentedRowsEvent {
        AugmentedRowsEvent {
            binlog_file_name: file.to_string(),
            rows,
        }
    }

    async fn start_on_mock() -> (MockCluster<'static, DefaultProducerContext>, KafkaApplier) {
        let cluster = MockCluster::new(1).expect("failed to create mock brokers");
        cluster
            .create_topic(TOPIC, 4, 1)
            .expect("failed to create mock topic");
        let config = mock_config(cluster.bootstrap_servers(), "orders");
        let applier = KafkaApplier::new(&config).expect("failed to create applier");
        (cluster, applier)
    }

    #[tokio::test]
    async fn missing_table_name_is_fatal() {
        let (_cluster, applier) = start_on_mock().await;
        let event = rows_event("bin.000001", vec![row(None, "bin.000001", 154, 0)]);
        let err = applier.apply_rows(event).await.unwrap_err();
        assert!(matches!(err, ApplierError::MissingTableName));
    }

    #[tokio::test]
    async fn outliers_are_counted_not_published() {
        let (_cluster, applier) = start_on_mock().await;
        let event = rows_event(
            "bin.000001",
            vec![row(Some("not_allow_listed"), "bin.000001", 154, 0)],
        );
        applier.apply_rows(event).await.expect("outliers are not errors");
        assert_eq!(applier.outlier_rows(), 1);
        assert_eq!(applier.rows_sent(), 0);
    }

    #[tokio::test]
    async fn out_of_order_identity_is_fatal() {
        let (_cluster, applier) = start_on_mock().await;
        applier
            .apply_rows(rows_event(
                "bin.000001",
                vec![row(Some("orders"), "bin.000001", 200, 0)],
            ))
            .await
            .expect("first event in order");

        let err = applier
            .apply_rows(rows_event(
                "bin.000001",
                vec![row(Some("orders"), "bin.000001", 100, 0)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplierError::OrderingViolation { .. }));

        applier.wait_until_all_rows_committed().await.expect("first row acked");
    }

    #[tokio::test]
    async fn flagged_publish_failure_fails_fast() {
        let (_cluster, applier) = start_on_mock().await;
        applier.publish_failed.store(true, Ordering::SeqCst);

        let event = rows_event(
            "bin.000001",
            vec![row(Some("orders"), "bin.000001", 154, 0)],
        );
        let err = applier.apply_rows(event).await.unwrap_err();
        assert!(matches!(err, ApplierError::PublishFailed));
        assert_eq!(applier.rows_sent(), 0, "no new sends after a flagged failure");

        let err = applier.wait_until_all_rows_committed().await.unwrap_err();
        assert!(matches!(err, ApplierError::PublishFailed));
    }
}
