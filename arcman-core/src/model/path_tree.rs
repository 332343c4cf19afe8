//! ``src/model/path_tree.rs``
//! ============================================================================
//! # `PathTree`: Segment Tree Under a Fixed Root
//!
//! Ownership tree of path segments used for two jobs: the parsed member
//! index of an opened archive, and the selection set ("checked" paths)
//! of each namespace. Nodes live in an arena (`Vec` slots); a node's
//! children are owned through an ordered map on the parent, and the
//! parent link is a plain index used only for path reconstruction and
//! removal.
//!
//! Every operation takes absolute paths and fails with
//! [`AppError::OutOfRange`] when the path does not descend from
//! `root_path` — callers must be able to distinguish "not in the tree"
//! from "not a valid path for this tree".

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::container::namespace::Namespace;
use crate::error::AppError;

const ROOT: usize = 0;

#[derive(Debug, Clone)]
struct Node {
    segment: String,

    /// Non-owning back-reference; `None` only for the root slot.
    parent: Option<usize>,

    /// Children owned by this node, ordered by segment.
    children: BTreeMap<String, usize>,
}

/// Tree of path segments rooted at a fixed absolute path.
#[derive(Debug, Clone)]
pub struct PathTree {
    root_path: PathBuf,
    nodes: Vec<Node>,
    free: Vec<usize>,
}

impl PathTree {
    #[must_use]
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            nodes: vec![Node {
                segment: String::new(),
                parent: None,
                children: BTreeMap::new(),
            }],
            free: Vec::new(),
        }
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// True when no path has been marked (the root alone does not count).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes[ROOT].children.is_empty()
    }

    /// Insert `path`, creating any missing intermediate nodes.
    ///
    /// Inserting a path that already exists merges into the existing
    /// nodes; siblings always keep pairwise-distinct segments.
    pub fn add(&mut self, path: &Path) -> Result<(), AppError> {
        let segments = self.rel_segments(path)?;

        let mut cur = ROOT;
        for seg in segments {
            if let Some(&id) = self.nodes[cur].children.get(&seg) {
                cur = id;
                continue;
            }
            let id = self.alloc(seg.clone(), cur);
            self.nodes[cur].children.insert(seg, id);
            cur = id;
        }

        Ok(())
    }

    /// Insert `path` and, when the owning namespace reports it enterable,
    /// every descendant obtained from its listing.
    ///
    /// Used to populate an archive's full index at open time and to
    /// implement whole-folder selection.
    pub fn add_recursive(&mut self, path: &Path, ns: &dyn Namespace) -> Result<(), AppError> {
        self.add(path)?;

        if ns.is_enterable(path) {
            for name in ns.list_children(path) {
                self.add_recursive(&path.join(name), ns)?;
            }
        }

        Ok(())
    }

    /// Membership test.
    ///
    /// Returns `Ok(false)` as soon as a segment is missing, and
    /// `Err(OutOfRange)` when `path` is not under `root_path` at all.
    pub fn contains(&self, path: &Path) -> Result<bool, AppError> {
        let segments = self.rel_segments(path)?;
        Ok(self.find(&segments).is_some())
    }

    /// Detach `path` and, transitively, every descendant.
    ///
    /// Removing a path that was never added is a no-op; removing the
    /// root itself is likewise ignored.
    pub fn remove(&mut self, path: &Path) -> Result<(), AppError> {
        let segments = self.rel_segments(path)?;
        if segments.is_empty() {
            return Ok(());
        }

        let Some(id) = self.find(&segments) else {
            return Ok(());
        };

        if let Some(parent) = self.nodes[id].parent {
            let seg = self.nodes[id].segment.clone();
            self.nodes[parent].children.remove(&seg);
        }

        // Recycle the whole detached subtree.
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            stack.extend(self.nodes[n].children.values().copied());
            self.nodes[n].children.clear();
            self.free.push(n);
        }

        trace!(path = %path.display(), "removed subtree");
        Ok(())
    }

    /// Ordered child segments of the node at `path`.
    pub fn children_names(&self, path: &Path) -> Result<Vec<String>, AppError> {
        let segments = self.rel_segments(path)?;
        match self.find(&segments) {
            Some(id) => Ok(self.nodes[id].children.keys().cloned().collect()),
            None => Err(AppError::NotFound(path.to_path_buf())),
        }
    }

    /// Number of nodes strictly below `path`, stopping early once `limit`
    /// is reached. A bound for "are you sure" warnings, not a correctness
    /// primitive.
    pub fn count_subtree(&self, path: &Path, limit: Option<usize>) -> Result<usize, AppError> {
        let segments = self.rel_segments(path)?;
        let Some(start) = self.find(&segments) else {
            return Ok(0);
        };

        let mut n = 0usize;
        let mut stack: Vec<usize> = self.nodes[start].children.values().copied().collect();
        while let Some(id) = stack.pop() {
            n += 1;
            if limit.is_some_and(|l| n >= l) {
                return Ok(n);
            }
            stack.extend(self.nodes[id].children.values().copied());
        }

        Ok(n)
    }

    /// Depth-first sequence of marked endpoints, in segment order.
    ///
    /// A childless node is yielded as itself — for an interior path this
    /// means "this whole, possibly empty, directory". A node with
    /// children recurses and yields only its descendants, never itself,
    /// which lets "one file inside a directory" and "the whole empty
    /// directory" coexist without ambiguity. The root is never yielded.
    #[must_use]
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves {
            tree: self,
            stack: self.nodes[ROOT].children.values().rev().copied().collect(),
        }
    }

    /// Reconstructed absolute path of the node at `id`.
    fn node_path(&self, id: usize) -> PathBuf {
        let mut segs = Vec::new();
        let mut cur = id;
        while cur != ROOT {
            segs.push(self.nodes[cur].segment.as_str());
            match self.nodes[cur].parent {
                Some(p) => cur = p,
                None => break,
            }
        }

        let mut path = self.root_path.clone();
        for seg in segs.iter().rev() {
            path.push(seg);
        }
        path
    }

    /// Walk `segments` from the root; `None` on the first missing one.
    fn find(&self, segments: &[String]) -> Option<usize> {
        let mut cur = ROOT;
        for seg in segments {
            cur = *self.nodes[cur].children.get(seg)?;
        }
        Some(cur)
    }

    /// Split `path` into segments relative to `root_path`.
    fn rel_segments(&self, path: &Path) -> Result<Vec<String>, AppError> {
        let rel = path
            .strip_prefix(&self.root_path)
            .map_err(|_| AppError::out_of_range(path, &self.root_path))?;

        let mut segments = Vec::new();
        for comp in rel.components() {
            match comp {
                Component::Normal(seg) => segments.push(seg.to_string_lossy().into_owned()),
                Component::CurDir => {}
                // `..`, a second root, or a prefix cannot name a descendant.
                _ => return Err(AppError::out_of_range(path, &self.root_path)),
            }
        }

        Ok(segments)
    }

    fn alloc(&mut self, segment: String, parent: usize) -> usize {
        let node = Node {
            segment,
            parent: Some(parent),
            children: BTreeMap::new(),
        };

        match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

/// Restartable iterator returned by [`PathTree::leaves`].
pub struct Leaves<'a> {
    tree: &'a PathTree,
    stack: Vec<usize>,
}

impl Iterator for Leaves<'_> {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree.nodes[id];
            if node.children.is_empty() {
                return Some(self.tree.node_path(id));
            }
            self.stack.extend(node.children.values().rev().copied());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::namespace::DummyNamespace;

    fn tree() -> PathTree {
        PathTree::new("/work/src")
    }

    #[test]
    fn add_then_contains_with_ancestors() {
        let mut t = tree();
        t.add(Path::new("/work/src/a/b/c.txt")).unwrap();

        assert!(t.contains(Path::new("/work/src/a/b/c.txt")).unwrap());
        assert!(t.contains(Path::new("/work/src/a/b")).unwrap());
        assert!(t.contains(Path::new("/work/src/a")).unwrap());
        assert!(t.contains(Path::new("/work/src")).unwrap());
    }

    #[test]
    fn add_is_idempotent() {
        let mut t = tree();
        t.add(Path::new("/work/src/a/b")).unwrap();
        let once: Vec<_> = t.leaves().collect();

        t.add(Path::new("/work/src/a/b")).unwrap();
        let twice: Vec<_> = t.leaves().collect();

        assert_eq!(once, twice);
    }

    #[test]
    fn contains_out_of_range_is_an_error() {
        let mut t = tree();
        t.add(Path::new("/work/src/a")).unwrap();

        assert!(matches!(
            t.contains(Path::new("/elsewhere/a")),
            Err(AppError::OutOfRange { .. })
        ));
        // Not-selected under the root stays a plain false.
        assert!(!t.contains(Path::new("/work/src/zzz")).unwrap());
    }

    #[test]
    fn remove_detaches_whole_subtree() {
        let mut t = tree();
        t.add(Path::new("/work/src/a/b/c")).unwrap();
        t.add(Path::new("/work/src/a/b/d")).unwrap();

        t.remove(Path::new("/work/src/a/b")).unwrap();

        assert!(!t.contains(Path::new("/work/src/a/b")).unwrap());
        assert!(!t.contains(Path::new("/work/src/a/b/c")).unwrap());
        assert!(t.contains(Path::new("/work/src/a")).unwrap());
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let mut t = tree();
        t.add(Path::new("/work/src/a")).unwrap();
        t.remove(Path::new("/work/src/never/added")).unwrap();
        assert!(t.contains(Path::new("/work/src/a")).unwrap());
    }

    #[test]
    fn leaves_yield_files_and_empty_dirs_only() {
        let mut t = tree();
        // One file deep inside a directory...
        t.add(Path::new("/work/src/a/aa/file.txt")).unwrap();
        // ...and a separate (empty) directory selected as a whole.
        t.add(Path::new("/work/src/empty-dir")).unwrap();

        let got: Vec<_> = t.leaves().collect();
        assert_eq!(
            got,
            vec![
                PathBuf::from("/work/src/a/aa/file.txt"),
                PathBuf::from("/work/src/empty-dir"),
            ]
        );

        // Interior nodes with children are never yielded themselves.
        assert!(!got.contains(&PathBuf::from("/work/src/a")));
    }

    #[test]
    fn leaves_is_restartable() {
        let mut t = tree();
        t.add(Path::new("/work/src/x")).unwrap();
        assert_eq!(t.leaves().count(), 1);
        assert_eq!(t.leaves().count(), 1);
    }

    #[test]
    fn count_subtree_stops_at_limit() {
        let mut t = tree();
        for i in 0..20 {
            t.add(Path::new(&format!("/work/src/dir/f{i}"))).unwrap();
        }

        assert_eq!(
            t.count_subtree(Path::new("/work/src/dir"), Some(5)).unwrap(),
            5
        );
        assert_eq!(
            t.count_subtree(Path::new("/work/src/dir"), None).unwrap(),
            20
        );
    }

    #[test]
    fn recursive_add_pulls_in_namespace_listing() {
        let mut t = PathTree::new("/dummy");
        t.add_recursive(Path::new("/dummy/three"), &DummyNamespace)
            .unwrap();

        assert!(t.contains(Path::new("/dummy/three/three1")).unwrap());
        assert!(t.contains(Path::new("/dummy/three/three5")).unwrap());
        assert_eq!(t.leaves().count(), 5);
    }

    #[test]
    fn arena_slots_are_recycled() {
        let mut t = tree();
        t.add(Path::new("/work/src/a/b")).unwrap();
        let before = t.nodes.len();

        t.remove(Path::new("/work/src/a")).unwrap();
        t.add(Path::new("/work/src/c/d")).unwrap();

        assert_eq!(t.nodes.len(), before);
    }
}
