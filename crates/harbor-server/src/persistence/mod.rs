//! SQLite persistence for the edited mask and restricted areas.
//!
//! The in-memory stores are authoritative while the server runs; writes go
//! through to SQLite so a restart restores them.

pub mod db;
pub mod masks;
pub mod restricted_areas;

pub use db::{init_database, Database};
