//! Specialization-aware query execution.
//!
//! A [`SpecializedQuery`] runs an ordered scan against the hierarchy's base
//! table, partitions the matching ids by specialization label, issues one
//! bulk fetch per subtype through the registry, and re-emits the records in
//! the scan's order. The caller gets back correctly-specialized instances
//! rather than base-typed rows.

use crate::core::accessor::{FieldSelection, Projection};
use crate::core::error::SpeciateError;
use crate::core::paths::{find_next_path_down, SpecializationPath};
use crate::core::record::{RecordId, Specialized};
use crate::core::registry::{Hierarchy, SpecializationDescriptor};
use rusqlite::types::ToSql;
use rusqlite::Connection;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Whether resolution lands on the most specific (leaf) subtype or on the
/// immediate child of the query's anchor level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Resolution {
    #[default]
    Final,
    Direct,
}

impl Hierarchy {
    /// Specialization-aware query anchored at the general (root) type.
    pub fn specializations(&self) -> SpecializedQuery<'_> {
        SpecializedQuery::new(self, self.root().clone())
    }

    /// Specialization-aware query anchored at an intermediate level. The base
    /// scan is narrowed to that level's subtree by label prefix.
    pub fn specializations_at(
        &self,
        path: &SpecializationPath,
    ) -> Result<SpecializedQuery<'_>, SpeciateError> {
        let anchor = self.descriptor_at(path)?;
        Ok(SpecializedQuery::new(self, anchor))
    }
}

pub struct SpecializedQuery<'h> {
    hierarchy: &'h Hierarchy,
    anchor: Arc<SpecializationDescriptor>,
    resolution: Resolution,
    filters: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    order: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    explicit: Option<SpecializationPath>,
    projection: Projection,
}

impl std::fmt::Debug for SpecializedQuery<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecializedQuery")
            .field("anchor", &self.anchor)
            .field("resolution", &self.resolution)
            .field("filters", &self.filters)
            .field("params", &format_args!("[{} params]", self.params.len()))
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("explicit", &self.explicit)
            .field("projection", &self.projection)
            .finish()
    }
}

impl<'h> SpecializedQuery<'h> {
    fn new(hierarchy: &'h Hierarchy, anchor: Arc<SpecializationDescriptor>) -> Self {
        SpecializedQuery {
            hierarchy,
            anchor,
            resolution: Resolution::Final,
            filters: Vec::new(),
            params: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            explicit: None,
            projection: Projection::default(),
        }
    }

    /// Resolve to the immediate child of the anchor level instead of the
    /// most specific subtype.
    pub fn direct(mut self) -> Self {
        self.resolution = Resolution::Direct;
        self
    }

    /// Resolve to the most specific (leaf) subtype. This is the default.
    pub fn most_specific(mut self) -> Self {
        self.resolution = Resolution::Final;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Append a raw filter clause against the base table's columns.
    pub fn filter(mut self, clause: &str) -> Self {
        self.filters.push(clause.to_string());
        self
    }

    /// Append a filter clause with one bound parameter.
    pub fn filter_bind(mut self, clause: &str, param: impl ToSql + 'static) -> Self {
        self.filters.push(clause.to_string());
        self.params.push(Box::new(param));
        self
    }

    /// Narrow to records whose label sits under `path`.
    pub fn prefix(self, path: &SpecializationPath) -> Self {
        let pattern = format!("{}%", path);
        self.filter_bind("specialization LIKE ?", pattern)
    }

    pub fn order_by(mut self, clause: &str) -> Self {
        self.order.push(clause.to_string());
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Load only the listed columns onto the resolved records; `id` and the
    /// specialization label are always loaded.
    pub fn only(mut self, columns: &[&str]) -> Self {
        self.projection.selection =
            FieldSelection::Only(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Defer loading of the listed columns.
    pub fn defer(mut self, columns: &[&str]) -> Self {
        self.projection.selection =
            FieldSelection::Defer(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Additional select expression copied down onto every per-subtype fetch.
    pub fn extra_select(mut self, name: &str, expr: &str) -> Self {
        self.projection
            .extra
            .push((name.to_string(), expr.to_string()));
        self
    }

    /// Supply the specialization label explicitly for [`get`](Self::get),
    /// bypassing label detection.
    pub fn with_specialization(mut self, path: impl Into<SpecializationPath>) -> Self {
        self.explicit = Some(path.into());
        self
    }

    /// Annotations cannot be reliably copied onto the per-subtype re-fetch,
    /// so they are always rejected.
    pub fn annotate(self, _expr: &str) -> Result<Self, SpeciateError> {
        Err(SpeciateError::Unsupported(
            "SpecializedQuery does not support annotations as these cannot be reliably copied to the specialized instances".to_string(),
        ))
    }

    /// Rejected for the same reason as [`annotate`](Self::annotate).
    pub fn aggregate(self, _expr: &str) -> Result<Self, SpeciateError> {
        Err(SpeciateError::Unsupported(
            "SpecializedQuery does not support aggregation as these values cannot be reliably copied to the specialized instances".to_string(),
        ))
    }

    /// Materialize the query.
    ///
    /// Returns a finite, single-pass sequence of resolved records in the
    /// scan's order; re-issuing the fetch restarts from a fresh scan. Output
    /// length and order always equal the base scan's, and every record's
    /// concrete type is the true leaf type under `Final` resolution or the
    /// anchor's immediate child under `Direct`.
    pub fn fetch(&self, conn: &Connection) -> Result<Materialized, SpeciateError> {
        let scanned = self.scan(conn, None)?;

        // Group ids by label while keeping the scan order in a flat id list.
        let mut ordered_ids: Vec<RecordId> = Vec::with_capacity(scanned.len());
        let mut ids_by_label: FxHashMap<SpecializationPath, Vec<RecordId>> = FxHashMap::default();
        for (label, id) in scanned {
            ids_by_label.entry(label).or_default().push(id);
            ordered_ids.push(id);
        }

        let registry = self.hierarchy.registry_at(&self.anchor.path)?;
        let mut merged: FxHashMap<RecordId, Box<dyn Specialized>> = FxHashMap::default();
        for (label, ids) in ids_by_label {
            let target = match self.resolution {
                Resolution::Direct => find_next_path_down(&self.anchor.path, &label),
                Resolution::Final => label,
            };
            let descriptor = registry.get(&target)?;
            let fetched = descriptor
                .accessor()
                .fetch_by_ids(conn, &ids, &self.projection)?;
            merged.extend(fetched);
        }

        let mut records = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            match merged.remove(&id) {
                Some(record) => records.push(record),
                None => {
                    return Err(SpeciateError::Inconsistency(format!(
                        "id {} was present in the base scan but missing after the per-subtype fetch",
                        id
                    )))
                }
            }
        }
        Ok(Materialized {
            inner: records.into_iter(),
        })
    }

    /// Materialize exactly one record.
    ///
    /// When no explicit label was supplied with
    /// [`with_specialization`](Self::with_specialization), the label is read
    /// off the first base row matching the filters. Zero matching rows, or a
    /// resolved label with no registry entry, fail with `RecordNotFound`.
    pub fn get(&self, conn: &Connection) -> Result<Box<dyn Specialized>, SpeciateError> {
        let mut scanned = self.scan(conn, Some(1))?;
        let (detected, id) = match scanned.pop() {
            Some(pair) => pair,
            None => return Err(self.does_not_exist()),
        };

        let label = self.explicit.clone().unwrap_or(detected);
        let target = match self.resolution {
            Resolution::Direct => find_next_path_down(&self.anchor.path, &label),
            Resolution::Final => label,
        };

        let registry = self.hierarchy.registry_at(&self.anchor.path)?;
        let descriptor = registry.get(&target).map_err(|_| self.does_not_exist())?;
        descriptor.accessor().fetch_by_id(conn, id)
    }

    fn does_not_exist(&self) -> SpeciateError {
        SpeciateError::RecordNotFound(format!(
            "{} matching query does not exist",
            self.anchor.name
        ))
    }

    /// Ordered `(label, id)` scan of the base table with all caller filters,
    /// ordering and slicing applied.
    fn scan(
        &self,
        conn: &Connection,
        limit_override: Option<i64>,
    ) -> Result<Vec<(SpecializationPath, RecordId)>, SpeciateError> {
        let mut sql = format!(
            "SELECT specialization, id FROM {} WHERE 1=1",
            self.hierarchy.base_binding().table
        );

        let prefix_param;
        let mut params: Vec<&dyn ToSql> = Vec::with_capacity(self.params.len() + 1);
        if self.anchor.path.is_root() {
            prefix_param = None;
        } else {
            sql.push_str(" AND specialization LIKE ?");
            prefix_param = Some(format!("{}%", self.anchor.path));
        }
        if let Some(prefix) = &prefix_param {
            params.push(prefix);
        }
        for clause in &self.filters {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        for param in &self.params {
            params.push(param.as_ref());
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        match (limit_override.or(self.limit), self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
            (None, None) => {}
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().copied()))?;
        let mut scanned = Vec::new();
        while let Some(row) = rows.next()? {
            let label: String = row.get(0)?;
            let id: RecordId = row.get(1)?;
            scanned.push((SpecializationPath::from(label), id));
        }
        Ok(scanned)
    }
}

/// Finite, single-pass sequence of resolved records. Restarting requires
/// re-issuing the underlying query.
pub struct Materialized {
    inner: std::vec::IntoIter<Box<dyn Specialized>>,
}

impl std::fmt::Debug for Materialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materialized")
            .field("remaining", &self.inner.len())
            .finish()
    }
}

impl Iterator for Materialized {
    type Item = Box<dyn Specialized>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Materialized {}
