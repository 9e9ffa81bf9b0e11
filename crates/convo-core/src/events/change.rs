//! Change events - row-level notifications delivered by a change feed
//!
//! Every adapter (Postgres `LISTEN/NOTIFY`, Redis pub/sub, the in-memory
//! store) produces the same JSON envelope:
//!
//! ```json
//! { "table": "messages", "kind": "INSERT", "record": { "id": "...", ... } }
//! ```
//!
//! `record` is the new row for inserts and updates and the old row for
//! deletes.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tables the engine subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Conversations,
    ConversationMembers,
    Messages,
    MessageReactions,
    MessageAttachments,
    MessageReadReceipts,
    TypingIndicators,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Conversations,
        Table::ConversationMembers,
        Table::Messages,
        Table::MessageReactions,
        Table::MessageAttachments,
        Table::MessageReadReceipts,
        Table::TypingIndicators,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conversations => "conversations",
            Self::ConversationMembers => "conversation_members",
            Self::Messages => "messages",
            Self::MessageReactions => "message_reactions",
            Self::MessageAttachments => "message_attachments",
            Self::MessageReadReceipts => "message_read_receipts",
            Self::TypingIndicators => "typing_indicators",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown table: {s}"))
    }
}

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn mask(self) -> EventMask {
        match self {
            Self::Insert => EventMask::INSERT,
            Self::Update => EventMask::UPDATE,
            Self::Delete => EventMask::DELETE,
        }
    }
}

bitflags! {
    /// Set of change kinds a subscription wants
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventMask: u8 {
        const INSERT = 1 << 0;
        const UPDATE = 1 << 1;
        const DELETE = 1 << 2;

        const ALL = Self::INSERT.bits() | Self::UPDATE.bits() | Self::DELETE.bits();
    }
}

impl Default for EventMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Equality filter on one column of the changed row (`column=eq.value`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeFilter {
    pub column: String,
    pub value: String,
}

impl ChangeFilter {
    pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
        Self {
            column: column.into(),
            value: value.to_string(),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event
            .field(&self.column)
            .is_some_and(|value| value == self.value)
    }
}

impl fmt::Display for ChangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// What a subscriber wants to hear about
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub table: Table,
    pub filter: Option<ChangeFilter>,
    pub events: EventMask,
}

impl Subscription {
    /// All events on `table`, unfiltered
    pub fn table(table: Table) -> Self {
        Self {
            table,
            filter: None,
            events: EventMask::ALL,
        }
    }

    pub fn events(mut self, events: EventMask) -> Self {
        self.events = events;
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter = Some(ChangeFilter::eq(column, value));
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table == event.table
            && self.events.contains(event.kind.mask())
            && self.filter.as_ref().map_or(true, |f| f.matches(event))
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{:?}]", self.table, self.events)?;
        if let Some(filter) = &self.filter {
            write!(f, "?{filter}")?;
        }
        Ok(())
    }
}

/// A row-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Value,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record: Value) -> Self {
        Self { table, kind, record }
    }

    /// Build an event from any serializable row
    pub fn from_row<T: Serialize>(table: Table, kind: ChangeKind, row: &T) -> Self {
        Self::new(
            table,
            kind,
            serde_json::to_value(row).unwrap_or(Value::Null),
        )
    }

    /// Column of the changed row rendered as text; numbers and strings both
    /// compare equal to the decimal form of an ID.
    pub fn field(&self, column: &str) -> Option<String> {
        match self.record.get(column)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Callback invoked for each matching event
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Opaque subscription handle returned by a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn into_inner(self) -> u64 {
        self.0
    }
}
