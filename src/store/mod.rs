//! Key/value configuration persistence in an ESP-IDF NVS partition.
//!
//! Entries are written in the NVS page format so the gateway firmware reads
//! them back through `Preferences`. Writes go through a [`StoreSession`]
//! that only touches flash on commit, and only for values that changed.

mod error;
mod flash;
mod nvs;
mod region;
mod set;

pub use error::StoreError;
pub use flash::{ConfigStorage, ConfigStore, StoreSession};
pub use region::{config_region, RegionError};
pub use set::{EntrySet, StoreEntry, StoreValue};
