//! ``src/model/navigator.rs``
//! ============================================================================
//! # `Navigator`: Session Controller Over Containers, Selections, Views
//!
//! Owns the single active (Container, selection PathTree, ViewArea)
//! triple and the visited-path cache that restores exact prior selection
//! and cursor state when a directory or archive is re-entered. Resolving
//! a path to a container happens here and nowhere else: reuse the current
//! one when the path is enterable in it, or open an archive when the
//! current container is the filesystem and the content sniff matches.
//! Entering an archive found inside another archive is refused.
//!
//! Every tree/path error is converted to an [`Outcome`] at this boundary;
//! nothing escapes to crash the session.

use std::num::NonZeroUsize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::container::{ArchiveContainer, Container};
use crate::engine::create::{self, CreateReport};
use crate::engine::extract::{self, ExtractReport};
use crate::error::{AppError, Outcome};
use crate::model::path_tree::PathTree;
use crate::model::view_area::ViewArea;
use crate::tasks::archive_task::ArchiveJob;

/// One row of the current listing, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub index: usize,
    pub name: String,
    pub path: PathBuf,
    pub is_enterable: bool,
    pub is_selected: bool,
}

/// State cached per visited path.
struct Visited {
    container: Arc<Container>,
    selection: Arc<Mutex<PathTree>>,
    view: ViewArea,
}

pub struct Navigator {
    /// Session boundary; paths outside it are refused.
    root: PathBuf,
    config: Config,

    current: PathBuf,
    container: Arc<Container>,
    selection: Arc<Mutex<PathTree>>,
    view: ViewArea,

    visited: LruCache<PathBuf, Visited>,
}

impl Navigator {
    /// Start a session rooted at `root` (must be an existing directory).
    pub fn new(root: &Path, config: Config, view_height: usize) -> Result<Self, AppError> {
        let root = root
            .canonicalize()
            .map_err(|_| AppError::NotFound(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(AppError::NotFound(root));
        }

        let capacity = NonZeroUsize::new(config.visited_cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        let container = Arc::new(Container::filesystem());
        let selection = Arc::new(Mutex::new(PathTree::new(&root)));
        let view = Self::build_view(&container, &root, &config, view_height, None);

        Ok(Self {
            current: root.clone(),
            root,
            config,
            container,
            selection,
            view,
            visited: LruCache::new(capacity),
        })
    }

    /// Switch the session to `path`.
    ///
    /// On any failure the current state is left untouched and the caller
    /// gets the tagged outcome to surface.
    pub fn change_directory(&mut self, path: &Path) -> Outcome {
        let target = self.absolutize(path);

        if !target.starts_with(&self.root) {
            warn!(path = %target.display(), root = %self.root.display(), "path outside session root");
            return Outcome::OutOfRange;
        }
        if target == self.current {
            return Outcome::Ok;
        }

        // Previously visited: restore container, selection, and cursor.
        if let Some(prev) = self.visited.pop(&target) {
            self.stash_current();
            self.container = prev.container;
            self.selection = prev.selection;
            self.view = prev.view;
            self.current = target;
            return Outcome::Ok;
        }

        // Enterable in the current namespace: same container, fresh view.
        if self.container.is_enterable(&target) {
            let view =
                Self::build_view(&self.container, &target, &self.config, self.view.height(), None);
            self.stash_current();
            self.view = view;
            self.current = target;
            return Outcome::Ok;
        }

        // Entering an archive is only possible from the filesystem.
        if !self.container.is_filesystem() {
            warn!(path = %target.display(), "refusing archive nested in archive");
            return Outcome::UnsupportedFormat;
        }
        if !target.exists() {
            return Outcome::NotFound;
        }

        match ArchiveContainer::open(&target) {
            Ok(archive) => {
                let container = Arc::new(Container::Archive(archive));
                let selection = Arc::new(Mutex::new(PathTree::new(&target)));
                let view =
                    Self::build_view(&container, &target, &self.config, self.view.height(), None);

                self.stash_current();
                self.container = container;
                self.selection = selection;
                self.view = view;
                self.current = target;

                info!(path = %self.current.display(), "entered archive");
                Outcome::Ok
            }
            Err(e) => {
                warn!(path = %target.display(), error = %e, "cannot enter path");
                Outcome::from(&e)
            }
        }
    }

    /// Enter the row under the cursor.
    pub fn enter_selected(&mut self) -> Outcome {
        match self.view.selected_path() {
            Some(path) => self.change_directory(&path),
            None => Outcome::NotFound,
        }
    }

    /// Go to the parent of the current path.
    pub fn go_up(&mut self) -> Outcome {
        match self.current.parent().map(Path::to_path_buf) {
            Some(parent) => self.change_directory(&parent),
            None => Outcome::OutOfRange,
        }
    }

    /// Mark or unmark `path` in the current namespace's selection.
    ///
    /// Marking an enterable path pulls in its whole subtree; unmarking
    /// detaches the node and its descendants.
    pub fn toggle_selection(&mut self, path: &Path) -> Outcome {
        let target = self.absolutize(path);
        let mut selection = self.selection.lock();

        let result = match selection.contains(&target) {
            Ok(true) => selection.remove(&target),
            Ok(false) => {
                if self.container.is_enterable(&target) {
                    selection.add_recursive(&target, self.container.as_ref())
                } else {
                    selection.add(&target)
                }
            }
            Err(e) => Err(e),
        };

        Outcome::from(result)
    }

    /// Membership for rendering. Out-of-range paths are simply "not
    /// selected" here; use the tree directly to distinguish.
    #[must_use]
    pub fn is_selected(&self, path: &Path) -> bool {
        self.selection.lock().contains(path).unwrap_or(false)
    }

    /// Number of marked endpoints in the current namespace.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selection.lock().leaves().count()
    }

    /// Bounded item count below `path`, for the pre-selection warning.
    #[must_use]
    pub fn count_items(&self, path: &Path) -> usize {
        let target = self.absolutize(path);
        self.container
            .count_items(&target, Some(self.config.items_warning))
    }

    /// Visible listing rows with selection and enterability resolved.
    #[must_use]
    pub fn rows(&self) -> Vec<ListingRow> {
        let selection = self.selection.lock();
        self.view
            .visible()
            .map(|(index, name, path)| ListingRow {
                index,
                name: name.to_string(),
                is_enterable: self.container.is_enterable(&path),
                is_selected: selection.contains(&path).unwrap_or(false),
                path,
            })
            .collect()
    }

    pub fn move_cursor(&mut self, offset: isize) {
        self.view.move_selection(offset);
    }

    pub fn resize_view(&mut self, height: usize) {
        self.view.resize(height);
    }

    #[must_use]
    pub fn view(&self) -> &ViewArea {
        &self.view
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn current_path(&self) -> &Path {
        &self.current
    }

    /// Member count when the session is inside an archive.
    #[must_use]
    pub fn member_count(&self) -> Option<usize> {
        self.container.member_count()
    }

    /// Build a background extraction job from the current selection.
    /// Fails unless the session is inside an archive.
    pub fn extract_job(&self, dest: &Path) -> Result<ArchiveJob, AppError> {
        if self.container.as_archive().is_none() {
            return Err(AppError::cannot_open(
                self.current.clone(),
                "not inside an archive",
            ));
        }

        Ok(ArchiveJob::Extract {
            container: Arc::clone(&self.container),
            selection: self.selection_snapshot(),
            dest: self.absolutize(dest),
        })
    }

    /// Build a background creation job from the current selection.
    /// Fails unless the session is on the filesystem.
    pub fn create_job(&self, dest: &Path) -> Result<ArchiveJob, AppError> {
        if !self.container.is_filesystem() {
            return Err(AppError::NonFilesystemSource);
        }

        Ok(ArchiveJob::Create {
            container: Arc::clone(&self.container),
            selection: self.selection.lock().clone(),
            dest: self.absolutize(dest),
        })
    }

    /// Synchronous extraction of the current selection into `dest`.
    pub fn extract_to(
        &self,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExtractReport, AppError> {
        let archive = self.container.as_archive().ok_or_else(|| {
            AppError::cannot_open(self.current.clone(), "not inside an archive")
        })?;

        let selection = self.selection_snapshot();
        extract::extract(archive, selection.as_ref(), &self.absolutize(dest), cancel)
    }

    /// Synchronous creation of a new archive from the current selection.
    pub fn create_archive(
        &self,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<CreateReport, AppError> {
        let selection = self.selection.lock().clone();
        create::create(&self.container, &selection, &self.absolutize(dest), cancel)
    }

    /// Empty selections collapse to "extract everything".
    fn selection_snapshot(&self) -> Option<PathTree> {
        let selection = self.selection.lock();
        if selection.is_empty() {
            None
        } else {
            Some(selection.clone())
        }
    }

    fn stash_current(&mut self) {
        let visited = Visited {
            container: Arc::clone(&self.container),
            selection: Arc::clone(&self.selection),
            view: self.view.clone(),
        };
        self.visited.put(self.current.clone(), visited);
    }

    fn build_view(
        container: &Container,
        path: &Path,
        config: &Config,
        height: usize,
        cursor: Option<usize>,
    ) -> ViewArea {
        let names = container
            .list_children(path)
            .into_iter()
            .filter(|name| config.show_hidden || !name.starts_with('.'))
            .collect();

        let view = ViewArea::new(path.to_path_buf(), names, height);
        match cursor {
            Some(cursor) => view.with_cursor(cursor),
            None => view,
        }
    }

    /// Resolve against the current path and fold out `.`/`..` lexically —
    /// archive-interior paths have no filesystem to canonicalize against.
    fn absolutize(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current.join(path)
        };

        let mut out = PathBuf::new();
        for comp in joined.components() {
            match comp {
                Component::ParentDir => {
                    out.pop();
                }
                Component::CurDir => {}
                other => out.push(other.as_os_str()),
            }
        }
        out
    }
}
