//! Library persistence backends for tunescan.
//!
//! Both backends implement [`LibraryStore`] on top of the same
//! [`Library`] model:
//!
//! - [`JsonLibraryStore`] writes the library to a JSON file after every
//!   acknowledged command
//! - [`MemoryStore`] keeps everything in memory and records each command,
//!   with optional fault injection for exercising retry paths

mod json;
mod library;
mod memory;

pub use json::JsonLibraryStore;
pub use library::{Library, LibraryStats, StoredTrack};
pub use memory::{MemoryStore, StoreCall};

pub use tunescan_core::LibraryStore;
