//! Row and event shapes at the schema-augmentation boundary.
//!
//! Upstream augmentation enriches raw row mutations with column metadata and
//! hands them over in these types. The delivery engine reads the routing
//! fields (table name, binlog position) and treats `payload` as opaque.

use serde::{Deserialize, Serialize};

/// One augmented row change.
///
/// `unique_id` is `None` when the row leaves the augmenter; the delivery
/// engine assigns it (taking the whole event by value) just before
/// publishing, and it travels inside the serialized message so recovery can
/// read it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRow {
    pub table_name: Option<String>,
    pub binlog_file_name: String,
    /// Byte offset of the originating event within its binlog file.
    pub position: u64,
    /// Index of this row within its source event.
    pub row_seq: u32,
    /// Augmented column data; never interpreted by the delivery engine.
    pub payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
}

/// All rows produced by one source log event, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedRowsEvent {
    pub binlog_file_name: String,
    pub rows: Vec<AugmentedRow>,
}

/// A DDL/schema transition, forwarded as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedSchemaChangeEvent {
    pub schema_name: String,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> AugmentedRow {
        AugmentedRow {
            table_name: Some("orders".to_string()),
            binlog_file_name: "bin.000007".to_string(),
            position: 154,
            row_seq: 0,
            payload: json!({"order_id": 42, "status": "shipped"}),
            unique_id: None,
        }
    }

    #[test]
    fn unique_id_is_omitted_until_assigned() {
        let serialized = serde_json::to_value(row()).unwrap();
        assert!(serialized.get("unique_id").is_none());
    }

    #[test]
    fn assigned_unique_id_is_embedded_and_round_trips() {
        let mut row = row();
        row.unique_id = Some("bin.000007:00000000000000000154:000".to_string());

        let serialized = serde_json::to_string(&row).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(
            parsed["unique_id"].as_str(),
            Some("bin.000007:00000000000000000154:000")
        );

        let deserialized: AugmentedRow = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, row);
    }

    #[test]
    fn missing_table_name_survives_serde() {
        let mut row = row();
        row.table_name = None;
        let serialized = serde_json::to_string(&row).unwrap();
        let deserialized: AugmentedRow = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized.table_name, None);
    }
}
