//! In-memory group tree persisted as a single JSON document.
//!
//! `TreeFile` is the backend used by the converters. The whole hierarchy is
//! held in memory for the duration of a run and written back in one piece,
//! through a temporary file in the destination directory that is renamed
//! over the target only after the write succeeded.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};
use crate::traits::{EntryKind, Storage, StorageMut};

const DOCUMENT_FORMAT: &str = "pvmap-tree";
const DOCUMENT_VERSION: u32 = 1;

/// Typed payload of a dataset. The element width is kept as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum DataBuffer {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
}

impl DataBuffer {
    pub fn len(&self) -> usize {
        match self {
            DataBuffer::Int32(v) => v.len(),
            DataBuffer::Int64(v) => v.len(),
            DataBuffer::Float32(v) => v.len(),
            DataBuffer::Float64(v) => v.len(),
            DataBuffer::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            DataBuffer::Int32(_) => "int32",
            DataBuffer::Int64(_) => "int64",
            DataBuffer::Float32(_) => "float32",
            DataBuffer::Float64(_) => "float64",
            DataBuffer::Text(_) => "text",
        }
    }

    /// Integer view. Float buffers are accepted only when every value is integral.
    pub fn to_i64(&self) -> Option<Vec<i64>> {
        match self {
            DataBuffer::Int32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            DataBuffer::Int64(v) => Some(v.clone()),
            DataBuffer::Float32(v) => v.iter().map(|&x| integral(f64::from(x))).collect(),
            DataBuffer::Float64(v) => v.iter().map(|&x| integral(x)).collect(),
            DataBuffer::Text(_) => None,
        }
    }

    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            DataBuffer::Int32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            DataBuffer::Int64(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataBuffer::Float32(v) => Some(v.iter().map(|&x| f64::from(x)).collect()),
            DataBuffer::Float64(v) => Some(v.clone()),
            DataBuffer::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            DataBuffer::Text(v) => Some(v),
            _ => None,
        }
    }
}

fn integral(x: f64) -> Option<i64> {
    if x.is_finite() && x.fract() == 0.0 {
        Some(x as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub shape: Vec<usize>,
    pub data: DataBuffer,
}

impl Dataset {
    pub fn new(shape: Vec<usize>, data: DataBuffer) -> Self {
        Self { shape, data }
    }

    /// One-dimensional dataset sized to its payload.
    pub fn vector(data: DataBuffer) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn matrix(rows: usize, columns: usize, data: DataBuffer) -> Self {
        Self {
            shape: vec![rows, columns],
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// Values per row; trailing dimensions are flattened.
    pub fn columns(&self) -> usize {
        if self.shape.len() < 2 {
            1
        } else {
            self.shape[1..].iter().product()
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.shape.iter().product::<usize>() == self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntList(Vec<i64>),
    FloatList(Vec<f64>),
    TextList(Vec<String>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            AttrValue::FloatList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            AttrValue::IntList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<Vec<f64>> for AttrValue {
    fn from(v: Vec<f64>) -> Self {
        AttrValue::FloatList(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::IntList(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrValue>,
    #[serde(default)]
    pub children: BTreeMap<String, Entry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Group(Group),
    Dataset(Dataset),
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    format: &'a str,
    version: u32,
    root: &'a Group,
}

#[derive(Deserialize)]
struct Document {
    format: String,
    version: u32,
    root: Group,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeFile {
    root: Group,
}

impl TreeFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let tree = Self::from_json_slice(&bytes)?;
        debug!("opened {} ({} bytes)", path.display(), bytes.len());
        Ok(tree)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let doc: Document = serde_json::from_slice(bytes)?;
        if doc.format != DOCUMENT_FORMAT {
            return Err(StoreError::Format(format!(
                "expected format '{DOCUMENT_FORMAT}', found '{}'",
                doc.format
            )));
        }
        if doc.version > DOCUMENT_VERSION {
            return Err(StoreError::Format(format!(
                "document version {} is newer than supported version {DOCUMENT_VERSION}",
                doc.version
            )));
        }
        Ok(Self { root: doc.root })
    }

    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        let doc = DocumentRef {
            format: DOCUMENT_FORMAT,
            version: DOCUMENT_VERSION,
            root: &self.root,
        };
        Ok(serde_json::to_vec(&doc)?)
    }

    /// Writes the document next to `path` and renames it into place.
    /// On error the previous file at `path`, if any, is left untouched.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let bytes = self.to_json_vec()?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;
        debug!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }

    pub fn group(&self, path: &str) -> Result<&Group> {
        match self.entry(path)? {
            Entry::Group(group) => Ok(group),
            Entry::Dataset(_) => Err(StoreError::NotAGroup(path.to_string())),
        }
    }

    fn entry(&self, path: &str) -> Result<&Entry> {
        let parts = split_path(path)?;
        let Some((last, parents)) = parts.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };
        let mut group = &self.root;
        for name in parents {
            group = match group.children.get(*name) {
                Some(Entry::Group(child)) => child,
                Some(Entry::Dataset(_)) => return Err(StoreError::NotAGroup(path.to_string())),
                None => return Err(StoreError::NotFound(path.to_string())),
            };
        }
        group
            .children
            .get(*last)
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    fn lookup_group(&self, path: &str) -> Result<&Group> {
        if split_path(path)?.is_empty() {
            Ok(&self.root)
        } else {
            self.group(path)
        }
    }

    /// Walks `parts`, creating missing groups on the way.
    fn group_mut(&mut self, parts: &[&str], path: &str) -> Result<&mut Group> {
        let mut group = &mut self.root;
        for name in parts {
            let entry = group
                .children
                .entry((*name).to_string())
                .or_insert_with(|| Entry::Group(Group::default()));
            group = match entry {
                Entry::Group(child) => child,
                Entry::Dataset(_) => return Err(StoreError::NotAGroup(path.to_string())),
            };
        }
        Ok(group)
    }
}

impl Storage for TreeFile {
    fn entry_kind(&self, path: &str) -> Option<EntryKind> {
        if matches!(split_path(path), Ok(parts) if parts.is_empty()) {
            return Some(EntryKind::Group);
        }
        match self.entry(path) {
            Ok(Entry::Group(_)) => Some(EntryKind::Group),
            Ok(Entry::Dataset(_)) => Some(EntryKind::Dataset),
            Err(_) => None,
        }
    }

    fn children(&self, path: &str) -> Result<Vec<String>> {
        Ok(self.lookup_group(path)?.children.keys().cloned().collect())
    }

    fn dataset(&self, path: &str) -> Result<&Dataset> {
        match self.entry(path)? {
            Entry::Dataset(dataset) => Ok(dataset),
            Entry::Group(_) => Err(StoreError::NotADataset(path.to_string())),
        }
    }

    fn attribute(&self, path: &str, name: &str) -> Result<Option<&AttrValue>> {
        Ok(self.lookup_group(path)?.attributes.get(name))
    }
}

impl StorageMut for TreeFile {
    fn create_group(&mut self, path: &str) -> Result<()> {
        let parts = split_path(path)?;
        self.group_mut(&parts, path)?;
        Ok(())
    }

    fn write_dataset(&mut self, path: &str, dataset: Dataset) -> Result<()> {
        if !dataset.is_consistent() {
            return Err(StoreError::Shape {
                path: path.to_string(),
                shape: dataset.shape,
                len: dataset.data.len(),
            });
        }
        let parts = split_path(path)?;
        let Some((last, parents)) = parts.split_last() else {
            return Err(StoreError::InvalidPath(path.to_string()));
        };
        let parent = self.group_mut(parents, path)?;
        if let Some(Entry::Group(_)) = parent.children.get(*last) {
            return Err(StoreError::NotADataset(path.to_string()));
        }
        parent
            .children
            .insert((*last).to_string(), Entry::Dataset(dataset));
        Ok(())
    }

    fn set_attribute(&mut self, path: &str, name: &str, value: AttrValue) -> Result<()> {
        let parts = split_path(path)?;
        let group = self.group_mut(&parts, path)?;
        group.attributes.insert(name.to_string(), value);
        Ok(())
    }
}

/// Splits an absolute or relative path into its names. `/` is the root.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = trimmed.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{name}")
}
