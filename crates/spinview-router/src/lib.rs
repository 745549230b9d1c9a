//! spinview-router: zero-dependency segment trie router
//!
//! Maps `(method, path)` pairs to an arbitrary route value. The fixture
//! server stores a small `Copy` enum per route; tests use plain `&str`.
//!
//! Paths are split on `/` and matched segment by segment against one tree
//! per method. Empty segments are ignored, so `/index` and `/index/` are the
//! same route.
//!
//! ## Example
//! ```
//! use spinview_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/json_data", "json").unwrap();
//!
//! assert_eq!(router.find("GET", "/json_data/"), Some(&"json"));
//! assert!(router.find("POST", "/json_data").is_none());
//! ```

use std::collections::HashMap;
use std::fmt;

/// Error returned when a route cannot be registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// The same method and path were registered twice
    Conflict { method: String, path: String },
}

impl fmt::Display for InsertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertError::Conflict { method, path } => {
                write!(f, "route already registered: {} {}", method, path)
            }
        }
    }
}

impl std::error::Error for InsertError {}

#[derive(Debug)]
struct Node<T> {
    children: HashMap<String, Node<T>>,
    value: Option<T>,
}

// Manual impl: a derived Default would require `T: Default`.
impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            value: None,
        }
    }
}

/// Segment trie router with one tree per HTTP method
#[derive(Debug)]
pub struct Router<T> {
    trees: HashMap<String, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }
}

impl<T> Router<T> {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` for `method` + `path`. Method names are case-insensitive.
    pub fn insert(&mut self, method: &str, path: &str, value: T) -> Result<(), InsertError> {
        let method = method.to_uppercase();
        let mut node = self.trees.entry(method.clone()).or_default();
        for segment in segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }

        if node.value.is_some() {
            return Err(InsertError::Conflict {
                method,
                path: path.to_string(),
            });
        }
        node.value = Some(value);
        Ok(())
    }

    /// Find the value registered for `method` + `path`
    pub fn find(&self, method: &str, path: &str) -> Option<&T> {
        let mut node = self.trees.get(&method.to_uppercase())?;
        for segment in segments(path) {
            node = node.children.get(segment)?;
        }
        node.value.as_ref()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
