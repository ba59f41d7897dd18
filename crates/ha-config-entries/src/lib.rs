//! Config Entries
//!
//! This crate provides the configuration entry system for Home Assistant.
//! Config entries represent individual integration instances; config flows
//! are the wizards that create them.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntries`] - Store for all config entries
//! - [`ConfigFlow`] - A multi-step setup wizard owned by an integration
//! - [`ConfigFlowManager`] - Runs flows and creates entries from them
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod entry;
pub mod flow;
pub mod flow_manager;
pub mod manager;
pub mod storage;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntrySource};

pub use flow::{
    ConfigFlow, ConfigFlowFactory, FieldType, FlowError, FlowResult, FlowResultType, FlowStep,
    FormField,
};

pub use flow_manager::{ConfigFlowHandler, ConfigFlowManager, ABORT_ALREADY_CONFIGURED};

pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};
