//! SQLite persistence layer
//!
//! Device registry (keyed by MAC) and the bounded alert log

mod connection;
pub mod models;
pub mod queries;
mod schema;

pub use connection::Database;
pub use models::{AlertRecord, AlertType, DeviceRecord};
