//! ``src/container/namespace.rs``
//! ============================================================================
//! # Namespace: Listing Seam for Tree Population
//!
//! The minimal capability `PathTree::add_recursive` needs from whatever
//! namespace owns the paths being inserted. Both container variants
//! implement it; tests use an in-memory double.

use std::path::Path;

/// A navigable namespace that can enumerate and classify its paths.
pub trait Namespace {
    /// Names of the immediate entries under `path`. Listing failures are
    /// tolerated by returning an empty sequence.
    fn list_children(&self, path: &Path) -> Vec<String>;

    /// Whether `path` denotes a directory-like node.
    fn is_enterable(&self, path: &Path) -> bool;
}

/// In-memory namespace with a fixed shape, for exercising recursive
/// insertion without touching disk. Only a path named `three` is
/// enterable; it lists `three1..three5`, everything else lists
/// `one..five`.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct DummyNamespace;

#[cfg(test)]
impl Namespace for DummyNamespace {
    fn list_children(&self, path: &Path) -> Vec<String> {
        let names: &[&str] = if self.is_enterable(path) {
            &["three1", "three2", "three3", "three4", "three5"]
        } else {
            &["one", "two", "three", "four", "five"]
        };
        names.iter().map(ToString::to_string).collect()
    }

    fn is_enterable(&self, path: &Path) -> bool {
        path.file_name().and_then(|n| n.to_str()) == Some("three")
    }
}
