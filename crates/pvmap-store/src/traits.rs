//! Read/write primitives every storage backend provides.
//!
//! The converters only talk to storage through these traits. Paths are
//! `/`-separated group names; attributes live on groups.

use crate::error::Result;
use crate::tree::{AttrValue, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Group,
    Dataset,
}

pub trait Storage {
    fn entry_kind(&self, path: &str) -> Option<EntryKind>;

    /// Child names of a group, sorted byte-wise by name (`"10"` before `"2"`),
    /// whatever the order they were created in.
    fn children(&self, path: &str) -> Result<Vec<String>>;

    /// Borrowed view of a dataset; readers never copy payloads.
    fn dataset(&self, path: &str) -> Result<&Dataset>;

    fn attribute(&self, path: &str, name: &str) -> Result<Option<&AttrValue>>;

    fn exists(&self, path: &str) -> bool {
        self.entry_kind(path).is_some()
    }

    fn is_group(&self, path: &str) -> bool {
        self.entry_kind(path) == Some(EntryKind::Group)
    }
}

pub trait StorageMut: Storage {
    /// Creates the group and any missing parents. Existing groups are kept.
    fn create_group(&mut self, path: &str) -> Result<()>;

    /// Replaces any dataset already stored at `path`.
    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()>;

    fn set_attribute(&mut self, path: &str, name: &str, value: AttrValue) -> Result<()>;
}
