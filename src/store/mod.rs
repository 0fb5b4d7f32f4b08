//! Persistence layer: the `Database` trait, its libSQL backend and an
//! in-memory double.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryDatabase;
pub use traits::{CompletionCommit, Database, SavedSchedule};
