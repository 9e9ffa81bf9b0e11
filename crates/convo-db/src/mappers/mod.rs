//! Model to entity mappers
//!
//! `From<Model> for Entity` conversions from database rows to domain objects,
//! plus the ID-slice conversion used by every `= ANY($1)` query.

mod conversation;
mod membership;
mod message;
mod reaction;
mod receipt;
mod typing;

use convo_core::Snowflake;

/// Convert a slice of IDs into a `BIGINT[]` bind parameter
pub fn id_array(ids: &[Snowflake]) -> Vec<i64> {
    ids.iter().map(|id| id.into_inner()).collect()
}
