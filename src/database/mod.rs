pub mod changes;
pub mod manager;
pub mod query_builder;
pub mod repository;
pub mod store;

pub use changes::{Changes, ColumnValue};
pub use manager::{DatabaseError, DatabaseManager};
pub use repository::PgStore;
pub use store::{Ownership, Store};
