//! Boundary types for the legacy binlog parser.
//!
//! The legacy decoder reports the event type as a raw numeric wire code and
//! uses distinct codes for the v1 and v2 encodings of row events. Decoding
//! itself happens upstream; these types are the hand-off shape.

/// Wire-level event type codes as the legacy parser reports them.
pub mod type_codes {
    pub const QUERY_EVENT: u32 = 2;
    pub const STOP_EVENT: u32 = 3;
    pub const ROTATE_EVENT: u32 = 4;
    pub const FORMAT_DESCRIPTION_EVENT: u32 = 15;
    pub const XID_EVENT: u32 = 16;
    pub const TABLE_MAP_EVENT: u32 = 19;
    pub const WRITE_ROWS_EVENT: u32 = 23;
    pub const UPDATE_ROWS_EVENT: u32 = 24;
    pub const DELETE_ROWS_EVENT: u32 = 25;
    pub const WRITE_ROWS_EVENT_V2: u32 = 30;
    pub const UPDATE_ROWS_EVENT_V2: u32 = 31;
    pub const DELETE_ROWS_EVENT_V2: u32 = 32;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHeader {
    pub event_type: u32,
    /// Event timestamp in milliseconds since the epoch.
    pub timestamp: u64,
    /// Byte offset of the event within its binlog file.
    pub position: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LegacyPayload {
    /// ROTATE_EVENT: the binlog file the server switched to.
    Rotate { next_binlog_file: String },
    #[default]
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEvent {
    pub header: Option<LegacyHeader>,
    pub payload: LegacyPayload,
}

impl LegacyEvent {
    pub fn new(event_type: u32, timestamp: u64, position: u64) -> LegacyEvent {
        LegacyEvent {
            header: Some(LegacyHeader {
                event_type,
                timestamp,
                position,
            }),
            payload: LegacyPayload::Opaque,
        }
    }

    pub fn rotate(timestamp: u64, position: u64, next_binlog_file: &str) -> LegacyEvent {
        LegacyEvent {
            header: Some(LegacyHeader {
                event_type: type_codes::ROTATE_EVENT,
                timestamp,
                position,
            }),
            payload: LegacyPayload::Rotate {
                next_binlog_file: next_binlog_file.to_string(),
            },
        }
    }
}
