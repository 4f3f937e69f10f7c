//! Per-subtype storage accessors.
//!
//! A specialization's descriptor carries an accessor that can fetch fully
//! typed rows for that subtype: one bulk fetch by id set during
//! materialization, and a single fetch by primary key for instance
//! resolution. Declarations configure the accessor explicitly: bind a table
//! of their own, supply a custom implementation, or inherit the nearest
//! ancestor's storage representation.

use crate::core::error::SpeciateError;
use crate::core::paths::SpecializationPath;
use crate::core::record::{RecordId, Specialized, SpecializedRow};
use rusqlite::types::Value;
use rusqlite::Connection;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Storage binding for one hierarchy level: the level's table plus the
/// columns that level adds on top of its ancestors. Subtype tables share the
/// base table's primary key.
#[derive(Debug, Clone)]
pub struct TableBinding {
    pub table: String,
    pub columns: Vec<String>,
}

impl TableBinding {
    pub fn new(table: &str, columns: &[&str]) -> Self {
        TableBinding {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Accessor configuration attached to a type declaration.
#[derive(Clone)]
pub enum AccessorConfig {
    /// Synthesize a generic accessor joining this table to the ancestor chain.
    Table(TableBinding),
    /// Use the supplied accessor as declared.
    Custom(Arc<dyn SpecializationAccessor>),
    /// Reuse the nearest ancestor's storage representation under this type's
    /// identity. The type adds no columns of its own.
    Inherit,
}

/// Deferred-field-loading configuration, copied down from the originating
/// query onto every per-subtype fetch.
#[derive(Debug, Clone, Default)]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
    Defer(Vec<String>),
}

impl FieldSelection {
    fn keeps(&self, column: &str) -> bool {
        match self {
            FieldSelection::All => true,
            FieldSelection::Only(cols) => cols.iter().any(|c| c == column),
            FieldSelection::Defer(cols) => !cols.iter().any(|c| c == column),
        }
    }
}

/// What a per-subtype fetch selects: the field selection plus any additional
/// select expressions copied from the originating query. Filters and ordering
/// are deliberately absent; those were already applied at the base level.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    pub selection: FieldSelection,
    pub extra: Vec<(String, String)>,
}

pub trait SpecializationAccessor {
    /// One bulk fetch of all rows for this subtype whose ids are in `ids`.
    /// Order of the result does not matter; the materializer reassembles.
    fn fetch_by_ids(
        &self,
        conn: &Connection,
        ids: &[RecordId],
        projection: &Projection,
    ) -> Result<FxHashMap<RecordId, Box<dyn Specialized>>, SpeciateError>;

    /// Fetch a single row by primary key, `RecordNotFound` when absent.
    fn fetch_by_id(
        &self,
        conn: &Connection,
        id: RecordId,
    ) -> Result<Box<dyn Specialized>, SpeciateError>;
}

/// Generic accessor synthesized from table bindings: the base table joined to
/// every bound ancestor level down to (and including) the subtype's own
/// table.
pub struct TableAccessor {
    type_name: String,
    path: SpecializationPath,
    base: TableBinding,
    chain: Vec<TableBinding>,
}

impl TableAccessor {
    pub fn new(
        type_name: &str,
        path: SpecializationPath,
        base: TableBinding,
        chain: Vec<TableBinding>,
    ) -> Self {
        TableAccessor {
            type_name: type_name.to_string(),
            path,
            base,
            chain,
        }
    }

    /// Select list as `(sql, column_name)` pairs. `id` and the specialization
    /// label are always selected; the field selection only governs the rest.
    fn select_list(&self, projection: &Projection) -> Vec<(String, String)> {
        let mut list = vec![
            ("b.id".to_string(), "id".to_string()),
            ("b.specialization".to_string(), "specialization".to_string()),
        ];
        for column in &self.base.columns {
            if projection.selection.keeps(column) {
                list.push((format!("b.{}", column), column.clone()));
            }
        }
        for (i, binding) in self.chain.iter().enumerate() {
            for column in &binding.columns {
                if projection.selection.keeps(column) {
                    list.push((format!("t{}.{}", i, column), column.clone()));
                }
            }
        }
        for (name, expr) in &projection.extra {
            list.push((format!("({}) AS {}", expr, name), name.clone()));
        }
        list
    }

    fn from_clause(&self) -> String {
        let mut from = format!("{} b", self.base.table);
        for (i, binding) in self.chain.iter().enumerate() {
            from.push_str(&format!(" JOIN {} t{} ON t{}.id = b.id", binding.table, i, i));
        }
        from
    }

    fn row_to_record(
        &self,
        row: &rusqlite::Row<'_>,
        names: &[(String, String)],
    ) -> Result<SpecializedRow, SpeciateError> {
        let id: RecordId = row.get(0)?;
        let label: String = row.get(1)?;
        let mut values = BTreeMap::new();
        for (idx, (_, name)) in names.iter().enumerate().skip(2) {
            values.insert(name.clone(), row.get::<_, Value>(idx)?);
        }
        Ok(SpecializedRow::new(
            id,
            SpecializationPath::from(label),
            self.path.clone(),
            self.type_name.clone(),
            values,
        ))
    }
}

impl SpecializationAccessor for TableAccessor {
    fn fetch_by_ids(
        &self,
        conn: &Connection,
        ids: &[RecordId],
        projection: &Projection,
    ) -> Result<FxHashMap<RecordId, Box<dyn Specialized>>, SpeciateError> {
        let mut out: FxHashMap<RecordId, Box<dyn Specialized>> = FxHashMap::default();
        if ids.is_empty() {
            return Ok(out);
        }

        let names = self.select_list(projection);
        let select = names
            .iter()
            .map(|(sql, _)| sql.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT {} FROM {} WHERE b.id IN ({})",
            select,
            self.from_clause(),
            placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(ids.iter()))?;
        while let Some(row) = rows.next()? {
            let record = self.row_to_record(row, &names)?;
            out.insert(record.id(), Box::new(record));
        }
        Ok(out)
    }

    fn fetch_by_id(
        &self,
        conn: &Connection,
        id: RecordId,
    ) -> Result<Box<dyn Specialized>, SpeciateError> {
        let names = self.select_list(&Projection::default());
        let select = names
            .iter()
            .map(|(sql, _)| sql.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE b.id = ?1",
            select,
            self.from_clause()
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Box::new(self.row_to_record(row, &names)?)),
            None => Err(SpeciateError::RecordNotFound(format!(
                "{} matching query does not exist",
                self.type_name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db;

    fn setup() -> (Connection, TableAccessor) {
        let conn = db::open_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE item (id INTEGER PRIMARY KEY, specialization TEXT NOT NULL, name TEXT NOT NULL);
             CREATE TABLE gadget (id INTEGER PRIMARY KEY REFERENCES item(id), voltage INTEGER NOT NULL);
             INSERT INTO item VALUES (1, '/gadget/', 'toaster');
             INSERT INTO item VALUES (2, '/gadget/', 'kettle');
             INSERT INTO gadget VALUES (1, 230);
             INSERT INTO gadget VALUES (2, 110);",
        )
        .unwrap();
        let accessor = TableAccessor::new(
            "Gadget",
            SpecializationPath::from("/gadget/"),
            TableBinding::new("item", &["name"]),
            vec![TableBinding::new("gadget", &["voltage"])],
        );
        (conn, accessor)
    }

    #[test]
    fn test_bulk_fetch_joins_the_chain() {
        let (conn, accessor) = setup();
        let fetched = accessor
            .fetch_by_ids(&conn, &[1, 2], &Projection::default())
            .unwrap();
        assert_eq!(fetched.len(), 2);
        let toaster = fetched[&1].as_any().downcast_ref::<SpecializedRow>().unwrap();
        assert_eq!(toaster.text("name"), Some("toaster"));
        assert_eq!(toaster.integer("voltage"), Some(230));
        assert_eq!(toaster.type_name(), "Gadget");
    }

    #[test]
    fn test_bulk_fetch_empty_id_set_is_a_no_op() {
        let (conn, accessor) = setup();
        let fetched = accessor
            .fetch_by_ids(&conn, &[], &Projection::default())
            .unwrap();
        assert!(fetched.is_empty());
    }

    #[test]
    fn test_projection_defers_columns() {
        let (conn, accessor) = setup();
        let projection = Projection {
            selection: FieldSelection::Defer(vec!["voltage".to_string()]),
            extra: Vec::new(),
        };
        let fetched = accessor.fetch_by_ids(&conn, &[1], &projection).unwrap();
        let row = fetched[&1].as_any().downcast_ref::<SpecializedRow>().unwrap();
        assert_eq!(row.integer("voltage"), None);
        assert_eq!(row.text("name"), Some("toaster"));
    }

    #[test]
    fn test_extra_select_expressions_are_carried() {
        let (conn, accessor) = setup();
        let projection = Projection {
            selection: FieldSelection::All,
            extra: vec![("doubled".to_string(), "voltage * 2".to_string())],
        };
        let fetched = accessor.fetch_by_ids(&conn, &[2], &projection).unwrap();
        let row = fetched[&2].as_any().downcast_ref::<SpecializedRow>().unwrap();
        assert_eq!(row.integer("doubled"), Some(220));
    }

    #[test]
    fn test_fetch_by_id_missing_row() {
        let (conn, accessor) = setup();
        let err = accessor.fetch_by_id(&conn, 99).unwrap_err();
        assert!(matches!(err, SpeciateError::RecordNotFound(_)));
    }
}
