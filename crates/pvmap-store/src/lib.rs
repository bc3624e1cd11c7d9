//! Hierarchical storage used by the PERMAS-HDF and VMAP converters.
//!
//! Both file formats are trees of groups holding typed datasets and
//! attributes. This crate provides:
//! - the `Storage` / `StorageMut` primitives the converters are written against
//! - `TreeFile`, an in-memory tree persisted as one JSON document with
//!   atomic replacement of the target file

pub mod error;
pub mod traits;
pub mod tree;

pub use error::{Result, StoreError};
pub use traits::{EntryKind, Storage, StorageMut};
pub use tree::{AttrValue, DataBuffer, Dataset, Entry, Group, TreeFile, join_path, split_path};
