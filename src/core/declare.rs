//! Declaration validation and registration.
//!
//! Types enter a hierarchy through a one-shot registration pass: each
//! declaration is validated, assigned its path, wired to an accessor, and
//! registered in the registries of every strict ancestor up to the root.
//! A declaration is processed exactly once; failure rejects the type with no
//! partial state left behind.

use crate::core::accessor::{AccessorConfig, SpecializationAccessor, TableAccessor, TableBinding};
use crate::core::error::SpeciateError;
use crate::core::paths::SpecializationPath;
use crate::core::registry::{Hierarchy, SpecializationDeclared, SpecializationDescriptor};
use crate::core::time;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Allowed characters in a specialization marker.
static SPECIALIZATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\w+$").unwrap());

/// Declaration of a hierarchy's general (root) type.
pub struct GeneralDeclaration {
    pub name: String,
    /// Carried through from the type's declared metadata; a general type
    /// must not have one.
    pub specialization: Option<String>,
    /// Base table binding: primary key column `id`, label column
    /// `specialization`, plus the listed base columns.
    pub binding: TableBinding,
}

impl GeneralDeclaration {
    pub fn new(name: &str, binding: TableBinding) -> Self {
        GeneralDeclaration {
            name: name.to_string(),
            specialization: None,
            binding,
        }
    }
}

/// Declaration of any non-root type in a hierarchy.
pub struct TypeDeclaration {
    pub name: String,
    pub is_abstract: bool,
    /// Path of the declared parent level.
    pub parent: SpecializationPath,
    pub specialization: Option<String>,
    pub accessor: AccessorConfig,
}

impl TypeDeclaration {
    pub fn new(
        name: &str,
        parent: SpecializationPath,
        specialization: &str,
        accessor: AccessorConfig,
    ) -> Self {
        TypeDeclaration {
            name: name.to_string(),
            is_abstract: false,
            parent,
            specialization: Some(specialization.to_string()),
            accessor,
        }
    }
}

impl Hierarchy {
    /// Declare the general type and open a new hierarchy rooted at `/`.
    pub fn general(decl: GeneralDeclaration) -> Result<Hierarchy, SpeciateError> {
        if decl.specialization.is_some() {
            return Err(SpeciateError::Declaration(
                "general types must not declare a specialization".to_string(),
            ));
        }
        let root_path = SpecializationPath::root();
        let accessor = Arc::new(TableAccessor::new(
            &decl.name,
            root_path.clone(),
            decl.binding.clone(),
            Vec::new(),
        ));
        let root = Arc::new(SpecializationDescriptor::new(
            &decl.name,
            root_path,
            None,
            accessor,
        ));
        Ok(Hierarchy::with_root(root, decl.binding))
    }

    /// Declare one type beneath an already-declared level.
    ///
    /// Abstract declarations are accepted with no path assigned and register
    /// nothing. Concrete declarations are validated, assigned
    /// `parent path + marker + separator`, given an empty own-registry, and
    /// registered at every strict ancestor level up to the root. Returns the
    /// assigned path, or `None` for abstract types.
    pub fn declare(
        &mut self,
        decl: TypeDeclaration,
    ) -> Result<Option<SpecializationPath>, SpeciateError> {
        if decl.is_abstract {
            if decl.specialization.is_some() {
                return Err(SpeciateError::Declaration(
                    "abstract types must not declare a specialization".to_string(),
                ));
            }
            return Ok(None);
        }

        let marker = decl.specialization.as_deref().ok_or_else(|| {
            SpeciateError::Declaration(
                "specialized types must declare a specialization".to_string(),
            )
        })?;
        if !SPECIALIZATION_RE.is_match(marker) {
            return Err(SpeciateError::Validation(
                "specializations must be alphanumeric".to_string(),
            ));
        }
        if self.registry_at(&decl.parent).is_err() {
            return Err(SpeciateError::Declaration(format!(
                "parent level {} is not declared",
                decl.parent
            )));
        }

        let path = decl.parent.child(marker);
        if self.registry_at(&path).is_ok() {
            return Err(SpeciateError::Declaration(format!(
                "specialization {} is already declared",
                path
            )));
        }

        let (accessor, own_binding) = self.wire_accessor(&decl, &path)?;
        let descriptor = Arc::new(SpecializationDescriptor::new(
            &decl.name,
            path.clone(),
            Some(decl.parent.clone()),
            accessor,
        ));

        self.add_level(path.clone(), decl.parent.clone(), own_binding);

        // Register in every strict ancestor's registry, root included.
        let mut ancestor = Some(decl.parent.clone());
        while let Some(level) = ancestor {
            if let Some(registry) = self.level_mut(&level) {
                registry.insert(path.clone(), descriptor.clone());
            }
            ancestor = self.parent_of(&level).cloned();
        }

        let event = SpecializationDeclared {
            event_id: time::new_event_id(),
            ts: time::now_epoch_z(),
            name: decl.name.clone(),
            path: path.clone(),
            parent: decl.parent.clone(),
        };
        for subscriber in &self.subscribers {
            subscriber(&event);
        }

        Ok(Some(path))
    }

    /// Resolve the declaration's accessor configuration into a working
    /// accessor, reusing ancestor storage representations where configured.
    fn wire_accessor(
        &self,
        decl: &TypeDeclaration,
        path: &SpecializationPath,
    ) -> Result<(Arc<dyn SpecializationAccessor>, Option<TableBinding>), SpeciateError> {
        match &decl.accessor {
            AccessorConfig::Custom(accessor) => Ok((accessor.clone(), None)),
            AccessorConfig::Table(binding) => {
                let mut chain = self.ancestor_bindings(&decl.parent);
                chain.push(binding.clone());
                let accessor: Arc<dyn SpecializationAccessor> = Arc::new(TableAccessor::new(
                    &decl.name,
                    path.clone(),
                    self.base_binding().clone(),
                    chain,
                ));
                Ok((accessor, Some(binding.clone())))
            }
            AccessorConfig::Inherit => {
                let chain = self.ancestor_bindings(&decl.parent);
                let accessor: Arc<dyn SpecializationAccessor> = Arc::new(TableAccessor::new(
                    &decl.name,
                    path.clone(),
                    self.base_binding().clone(),
                    chain,
                ));
                Ok((accessor, None))
            }
        }
    }

    /// Table bindings of every bound level between the root (exclusive) and
    /// `parent` (inclusive), ordered root-first.
    fn ancestor_bindings(&self, parent: &SpecializationPath) -> Vec<TableBinding> {
        let mut chain = Vec::new();
        let mut current = Some(parent.clone());
        while let Some(level) = current {
            if let Some(binding) = self.binding_of(&level) {
                chain.push(binding.clone());
            }
            current = self.parent_of(&level).cloned();
        }
        chain.reverse();
        chain
    }
}
