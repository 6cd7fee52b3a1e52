//! Raw binlog events and their backend-independent classification.
//!
//! Two parser backends feed the pipeline. [`RawEvent`] wraps whichever one
//! produced a given event and collapses both into one canonical
//! [`EventKind`], so everything downstream of classification is agnostic to
//! the decoding library in use.

pub mod connector;
pub mod legacy;

pub use connector::{ConnectorEvent, ConnectorEventType};
pub use legacy::LegacyEvent;

use connector::ConnectorPayload;
use legacy::{type_codes, LegacyPayload};

/// Backend-independent classification of a raw binlog event.
///
/// The v1/v2 (legacy) and pre-GA/current/extended (connector) wire encodings
/// of each row mutation collapse into a single kind; the wire version carries
/// no meaning for appliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Query,
    TableMap,
    WriteRows,
    UpdateRows,
    DeleteRows,
    /// Transaction commit.
    Xid,
    FormatDescription,
    Rotate,
    Stop,
    Unknown,
}

/// A raw event from one of the two supported parser backends.
///
/// Exactly one backend representation is active, chosen at construction;
/// classification and header access dispatch over the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Legacy(LegacyEvent),
    Connector(ConnectorEvent),
}

impl From<LegacyEvent> for RawEvent {
    fn from(event: LegacyEvent) -> RawEvent {
        RawEvent::Legacy(event)
    }
}

impl From<ConnectorEvent> for RawEvent {
    fn from(event: ConnectorEvent) -> RawEvent {
        RawEvent::Connector(event)
    }
}

impl RawEvent {
    pub fn has_header(&self) -> bool {
        match self {
            RawEvent::Legacy(event) => event.header.is_some(),
            RawEvent::Connector(event) => event.header.is_some(),
        }
    }

    /// Event timestamp in milliseconds, if the backend delivered a header.
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            RawEvent::Legacy(event) => event.header.as_ref().map(|header| header.timestamp),
            RawEvent::Connector(event) => event.header.as_ref().map(|header| header.timestamp),
        }
    }

    /// Classify the event. Headerless or unrecognized events are `Unknown`;
    /// classification never fails.
    pub fn kind(&self) -> EventKind {
        match self {
            RawEvent::Legacy(event) => match &event.header {
                Some(header) => classify_legacy(header.event_type),
                None => EventKind::Unknown,
            },
            RawEvent::Connector(event) => match &event.header {
                Some(header) => classify_connector(header.event_type),
                None => EventKind::Unknown,
            },
        }
    }

    pub fn is_query(&self) -> bool {
        self.kind() == EventKind::Query
    }

    pub fn is_table_map(&self) -> bool {
        self.kind() == EventKind::TableMap
    }

    pub fn is_write_rows(&self) -> bool {
        self.kind() == EventKind::WriteRows
    }

    pub fn is_update_rows(&self) -> bool {
        self.kind() == EventKind::UpdateRows
    }

    pub fn is_delete_rows(&self) -> bool {
        self.kind() == EventKind::DeleteRows
    }

    pub fn is_xid(&self) -> bool {
        self.kind() == EventKind::Xid
    }

    pub fn is_format_description(&self) -> bool {
        self.kind() == EventKind::FormatDescription
    }

    pub fn is_rotate(&self) -> bool {
        self.kind() == EventKind::Rotate
    }

    pub fn is_stop(&self) -> bool {
        self.kind() == EventKind::Stop
    }

    /// For rotate events, the binlog file the server switched to.
    pub fn rotate_file(&self) -> Option<&str> {
        match self {
            RawEvent::Legacy(event) => match &event.payload {
                LegacyPayload::Rotate { next_binlog_file } => Some(next_binlog_file),
                LegacyPayload::Opaque => None,
            },
            RawEvent::Connector(event) => match &event.payload {
                ConnectorPayload::Rotate(rotate) => Some(&rotate.binlog_filename),
                ConnectorPayload::Opaque => None,
            },
        }
    }
}

fn classify_legacy(event_type: u32) -> EventKind {
    match event_type {
        type_codes::QUERY_EVENT => EventKind::Query,
        type_codes::TABLE_MAP_EVENT => EventKind::TableMap,
        type_codes::WRITE_ROWS_EVENT | type_codes::WRITE_ROWS_EVENT_V2 => EventKind::WriteRows,
        type_codes::UPDATE_ROWS_EVENT | type_codes::UPDATE_ROWS_EVENT_V2 => EventKind::UpdateRows,
        type_codes::DELETE_ROWS_EVENT | type_codes::DELETE_ROWS_EVENT_V2 => EventKind::DeleteRows,
        type_codes::XID_EVENT => EventKind::Xid,
        type_codes::FORMAT_DESCRIPTION_EVENT => EventKind::FormatDescription,
        type_codes::ROTATE_EVENT => EventKind::Rotate,
        type_codes::STOP_EVENT => EventKind::Stop,
        _ => EventKind::Unknown,
    }
}

fn classify_connector(event_type: ConnectorEventType) -> EventKind {
    if event_type.is_write() {
        return EventKind::WriteRows;
    }
    if event_type.is_update() {
        return EventKind::UpdateRows;
    }
    if event_type.is_delete() {
        return EventKind::DeleteRows;
    }
    match event_type {
        ConnectorEventType::Query => EventKind::Query,
        ConnectorEventType::TableMap => EventKind::TableMap,
        ConnectorEventType::Xid => EventKind::Xid,
        ConnectorEventType::FormatDescription => EventKind::FormatDescription,
        ConnectorEventType::Rotate => EventKind::Rotate,
        ConnectorEventType::Stop => EventKind::Stop,
        _ => EventKind::Unknown,
    }
}
