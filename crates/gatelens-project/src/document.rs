//! A format-neutral document tree for plugin sections.
//!
//! Plugins never see JSON directly. Each one reads and writes its own
//! [`DocNode`] subtree, which the file manager embeds in the project file.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One value in a document tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocNode {
    #[default]
    Null,
    Bool(bool),
    /// Integers outside the `i64` range are read back as [`DocNode::Float`].
    Int(i64),
    /// Must be finite. JSON has no NaN or infinity, and the file manager
    /// refuses to save a section holding one.
    Float(f64),
    String(String),
    Array(Vec<DocNode>),
    Map(BTreeMap<String, DocNode>),
}

impl DocNode {
    /// An empty map node.
    pub fn map() -> Self {
        DocNode::Map(BTreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DocNode::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DocNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DocNode::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The value as a float; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DocNode::Float(f) => Some(*f),
            DocNode::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocNode::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[DocNode]> {
        match self {
            DocNode::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<DocNode>> {
        match self {
            DocNode::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, DocNode>> {
        match self {
            DocNode::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, DocNode>> {
        match self {
            DocNode::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Member `key` of a map node.
    pub fn get(&self, key: &str) -> Option<&DocNode> {
        self.as_map().and_then(|m| m.get(key))
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut DocNode> {
        self.as_map_mut().and_then(|m| m.get_mut(key))
    }

    /// Set member `key`, returning the previous value.
    ///
    /// A node that is not a map is replaced by an empty map first.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DocNode>) -> Option<DocNode> {
        if !matches!(self, DocNode::Map(_)) {
            *self = DocNode::map();
        }
        match self {
            DocNode::Map(entries) => entries.insert(key.into(), value.into()),
            _ => None,
        }
    }

    /// Append to an array node. A node that is not an array is replaced by
    /// an empty array first.
    pub fn push(&mut self, value: impl Into<DocNode>) {
        if !matches!(self, DocNode::Array(_)) {
            *self = DocNode::Array(Vec::new());
        }
        if let DocNode::Array(items) = self {
            items.push(value.into());
        }
    }

    /// Number of members of a map or elements of an array; zero otherwise.
    pub fn len(&self) -> usize {
        match self {
            DocNode::Array(items) => items.len(),
            DocNode::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every float in the tree is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            DocNode::Float(f) => f.is_finite(),
            DocNode::Array(items) => items.iter().all(DocNode::is_finite),
            DocNode::Map(entries) => entries.values().all(DocNode::is_finite),
            _ => true,
        }
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            DocNode::Null => "null",
            DocNode::Bool(_) => "bool",
            DocNode::Int(_) => "int",
            DocNode::Float(_) => "float",
            DocNode::String(_) => "string",
            DocNode::Array(_) => "array",
            DocNode::Map(_) => "map",
        }
    }
}

impl fmt::Display for DocNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

impl From<bool> for DocNode {
    fn from(value: bool) -> Self {
        DocNode::Bool(value)
    }
}

impl From<i64> for DocNode {
    fn from(value: i64) -> Self {
        DocNode::Int(value)
    }
}

impl From<i32> for DocNode {
    fn from(value: i32) -> Self {
        DocNode::Int(value.into())
    }
}

impl From<u32> for DocNode {
    fn from(value: u32) -> Self {
        DocNode::Int(value.into())
    }
}

impl From<f64> for DocNode {
    fn from(value: f64) -> Self {
        DocNode::Float(value)
    }
}

impl From<&str> for DocNode {
    fn from(value: &str) -> Self {
        DocNode::String(value.to_string())
    }
}

impl From<String> for DocNode {
    fn from(value: String) -> Self {
        DocNode::String(value)
    }
}

impl From<Vec<DocNode>> for DocNode {
    fn from(value: Vec<DocNode>) -> Self {
        DocNode::Array(value)
    }
}

impl From<BTreeMap<String, DocNode>> for DocNode {
    fn from(value: BTreeMap<String, DocNode>) -> Self {
        DocNode::Map(value)
    }
}
