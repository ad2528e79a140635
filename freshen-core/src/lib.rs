//! Freshen core library — record domain types, store and roster collaborators.
//!
//! Public API surface:
//! - [`types`] — newtypes, [`Record`], [`WriteIntent`]
//! - [`error`] — [`StoreError`], [`RosterError`], [`PayloadError`]
//! - [`store`] — [`RecordStore`] / [`RecordSink`] traits plus in-memory and JSON file stores
//! - [`roster`] — client roster sources (local file or HTTP object URL)
//! - [`payload`] — YAML payload loading

pub mod error;
pub mod payload;
pub mod roster;
pub mod store;
pub mod types;

pub use error::{PayloadError, RosterError, StoreError};
pub use roster::{FileRoster, HttpRoster, RosterSource};
pub use store::{JsonFileStore, MemoryStore, RecordSink, RecordStore};
pub use types::{
    Category, ClientId, Fingerprint, GenerationId, Payload, Record, RecordKey, WriteIntent,
};
