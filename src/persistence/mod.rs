pub mod sqlite;

pub use sqlite::{SqliteStore, PENDING_TABLE, TRADED_TABLE};
