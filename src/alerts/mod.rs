//! Price alerts
//!
//! Rules live in an [`AlertEngine`], persisted through a [`KeyValueStore`]
//! under a single key as a JSON array.

pub mod engine;
pub mod rule;
pub mod storage;

pub use engine::AlertEngine;
pub use rule::{format_usd, AlertCondition, AlertNotification, AlertRule};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
