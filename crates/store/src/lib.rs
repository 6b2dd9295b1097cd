//! Configuration storage for periodica timers
//!
//! - [`ConfigStore`]: the contract a timer reads its configuration through
//! - [`MemoryConfigStore`]: in-process implementation
//! - [`TimerConfig`]: TOML file format

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod field;
pub mod memory;
pub mod store;

pub use config::{TimerConfig, CONFIG_FILE_NAME};
pub use field::{ConfigField, ConfigSnapshot, FieldValue};
pub use memory::{MemoryConfigStore, ResourceStatus};
pub use store::{
    ChangeKind, ConfigEvent, ConfigListener, ConfigStore, FieldLease, SubscriptionId,
};
