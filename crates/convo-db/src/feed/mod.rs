//! Change feed backed by Postgres `LISTEN/NOTIFY`

mod postgres;

pub use postgres::{decode_notification, PgChangeFeed, PgFeedConfig, CHANGE_CHANNEL};
