//! Specialization registries and the hierarchy bookkeeping structure.
//!
//! Every declared level of a hierarchy owns a registry mapping full
//! specialization paths to descriptors. The root's registry sees every
//! descendant transitively; an intermediate level sees only its own subtree;
//! a leaf's registry is empty. Entries are inserted during declaration and
//! never removed or overwritten.

use crate::core::accessor::{SpecializationAccessor, TableBinding};
use crate::core::error::SpeciateError;
use crate::core::paths::SpecializationPath;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable descriptor for one declared specialization.
pub struct SpecializationDescriptor {
    pub name: String,
    pub path: SpecializationPath,
    /// Direct parent level; `None` only for the general (root) type.
    pub parent: Option<SpecializationPath>,
    accessor: Arc<dyn SpecializationAccessor>,
}

impl SpecializationDescriptor {
    pub(crate) fn new(
        name: &str,
        path: SpecializationPath,
        parent: Option<SpecializationPath>,
        accessor: Arc<dyn SpecializationAccessor>,
    ) -> Self {
        SpecializationDescriptor {
            name: name.to_string(),
            path,
            parent,
            accessor,
        }
    }

    pub fn accessor(&self) -> &dyn SpecializationAccessor {
        self.accessor.as_ref()
    }
}

impl fmt::Debug for SpecializationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializationDescriptor")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("parent", &self.parent)
            .finish_non_exhaustive()
    }
}

/// Path-to-descriptor mapping for one hierarchy level.
#[derive(Default)]
pub struct Registry {
    entries: FxHashMap<SpecializationPath, Arc<SpecializationDescriptor>>,
}

impl Registry {
    pub fn get(
        &self,
        path: &SpecializationPath,
    ) -> Result<&Arc<SpecializationDescriptor>, SpeciateError> {
        self.entries
            .get(path)
            .ok_or_else(|| SpeciateError::UnknownSpecialization(path.to_string()))
    }

    pub fn contains(&self, path: &SpecializationPath) -> bool {
        self.entries.contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&SpecializationPath, &Arc<SpecializationDescriptor>)> {
        self.entries.iter()
    }

    pub(crate) fn insert(
        &mut self,
        path: SpecializationPath,
        descriptor: Arc<SpecializationDescriptor>,
    ) {
        self.entries.insert(path, descriptor);
    }
}

/// Event record emitted once per successfully registered specialization.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SpecializationDeclared {
    pub event_id: String,
    pub ts: String,
    pub name: String,
    pub path: SpecializationPath,
    pub parent: SpecializationPath,
}

/// Bookkeeping structure for one specialization hierarchy, rooted at a
/// general type with path `/`.
///
/// Levels are addressed by path string, parents through an explicit lookup
/// table; no type holds a reference back to another.
pub struct Hierarchy {
    root: Arc<SpecializationDescriptor>,
    base_binding: TableBinding,
    levels: FxHashMap<SpecializationPath, Registry>,
    parents: FxHashMap<SpecializationPath, SpecializationPath>,
    bindings: FxHashMap<SpecializationPath, TableBinding>,
    pub(crate) subscribers: Vec<Box<dyn Fn(&SpecializationDeclared)>>,
}

impl Hierarchy {
    pub(crate) fn with_root(
        root: Arc<SpecializationDescriptor>,
        base_binding: TableBinding,
    ) -> Self {
        let mut levels = FxHashMap::default();
        levels.insert(root.path.clone(), Registry::default());
        Hierarchy {
            root,
            base_binding,
            levels,
            parents: FxHashMap::default(),
            bindings: FxHashMap::default(),
            subscribers: Vec::new(),
        }
    }

    pub fn root(&self) -> &Arc<SpecializationDescriptor> {
        &self.root
    }

    /// The base table every level of this hierarchy scans through.
    pub fn base_binding(&self) -> &TableBinding {
        &self.base_binding
    }

    /// Own-registry of the type declared at `path`.
    pub fn registry_at(&self, path: &SpecializationPath) -> Result<&Registry, SpeciateError> {
        self.levels
            .get(path)
            .ok_or_else(|| SpeciateError::UnknownSpecialization(path.to_string()))
    }

    /// Descriptor of the type declared at `path` (the root included).
    pub fn descriptor_at(
        &self,
        path: &SpecializationPath,
    ) -> Result<Arc<SpecializationDescriptor>, SpeciateError> {
        if path == &self.root.path {
            return Ok(self.root.clone());
        }
        Ok(self.registry_at(&self.root.path)?.get(path)?.clone())
    }

    /// True when the type at `path` has no further specializations declared.
    pub fn is_leaf(&self, path: &SpecializationPath) -> bool {
        self.levels.get(path).is_some_and(Registry::is_empty)
    }

    /// Default specialization label for a record of the type at `path`:
    /// its own path when the type is a final specialization, nothing
    /// otherwise. Applied at record construction when no label is supplied.
    pub fn default_specialization(
        &self,
        path: &SpecializationPath,
    ) -> Option<SpecializationPath> {
        if self.is_leaf(path) {
            Some(path.clone())
        } else {
            None
        }
    }

    /// All declared paths, root first, sorted for stable presentation.
    pub fn declared_paths(&self) -> Vec<SpecializationPath> {
        let mut paths: Vec<_> = self.levels.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub(crate) fn parent_of(&self, path: &SpecializationPath) -> Option<&SpecializationPath> {
        self.parents.get(path)
    }

    pub(crate) fn binding_of(&self, path: &SpecializationPath) -> Option<&TableBinding> {
        self.bindings.get(path)
    }

    pub(crate) fn level_mut(&mut self, path: &SpecializationPath) -> Option<&mut Registry> {
        self.levels.get_mut(path)
    }

    pub(crate) fn add_level(
        &mut self,
        path: SpecializationPath,
        parent: SpecializationPath,
        binding: Option<TableBinding>,
    ) {
        self.levels.insert(path.clone(), Registry::default());
        self.parents.insert(path.clone(), parent);
        if let Some(binding) = binding {
            self.bindings.insert(path, binding);
        }
    }

    /// Subscribe to "specialization declared" notifications. Fired once per
    /// successful registration, after the registries are updated.
    pub fn subscribe(&mut self, subscriber: impl Fn(&SpecializationDeclared) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("root", &self.root)
            .field("levels", &self.declared_paths())
            .finish_non_exhaustive()
    }
}
