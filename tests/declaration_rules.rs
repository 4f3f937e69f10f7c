//! Hierarchy-level invariants and accessor configuration behavior.

use rusqlite::Connection;
use rustc_hash::FxHashMap;
use speciate::core::accessor::{
    AccessorConfig, Projection, SpecializationAccessor, TableBinding,
};
use speciate::core::db;
use speciate::core::declare::{GeneralDeclaration, TypeDeclaration};
use speciate::core::error::SpeciateError;
use speciate::core::paths::SpecializationPath;
use speciate::core::record::{RecordId, Specialized};
use speciate::core::registry::Hierarchy;
use speciate::demo;
use std::any::Any;
use std::sync::Arc;

#[test]
fn test_every_subtype_is_registered_in_all_strict_ancestors() {
    let hierarchy = demo::writing_implements().unwrap();
    let root_registry = hierarchy.registry_at(&SpecializationPath::root()).unwrap();

    for (path, descriptor) in root_registry.iter() {
        let mut ancestor = descriptor.parent.clone();
        while let Some(level) = ancestor {
            let registry = hierarchy.registry_at(&level).unwrap();
            assert!(
                registry.contains(path),
                "{} missing from registry of {}",
                path,
                level
            );
            ancestor = hierarchy.descriptor_at(&level).unwrap().parent.clone();
        }
    }
}

#[test]
fn test_registry_sizes_reflect_subtrees() {
    let hierarchy = demo::writing_implements().unwrap();
    let root = hierarchy.registry_at(&SpecializationPath::root()).unwrap();
    let pen = hierarchy
        .registry_at(&SpecializationPath::from(demo::PEN))
        .unwrap();

    assert_eq!(root.len(), 4);
    assert_eq!(pen.len(), 2);
    for leaf in [demo::FOUNTAIN_PEN, demo::BALLPOINT_PEN, demo::PENCIL] {
        assert!(hierarchy.is_leaf(&SpecializationPath::from(leaf)));
        assert!(hierarchy
            .registry_at(&SpecializationPath::from(leaf))
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_depth_grows_by_one_per_level() {
    let hierarchy = demo::writing_implements().unwrap();
    let root_registry = hierarchy.registry_at(&SpecializationPath::root()).unwrap();
    for (path, descriptor) in root_registry.iter() {
        let parent = descriptor.parent.as_ref().unwrap();
        assert_eq!(path.depth(), parent.depth() + 1);
    }
}

#[test]
fn test_registry_lookup_miss_is_typed() {
    let hierarchy = demo::writing_implements().unwrap();
    let err = hierarchy
        .registry_at(&SpecializationPath::root())
        .unwrap()
        .get(&SpecializationPath::from("/quill/"))
        .unwrap_err();
    assert!(matches!(err, SpeciateError::UnknownSpecialization(_)));
}

#[test]
fn test_inherit_config_reuses_base_representation() {
    let mut hierarchy = Hierarchy::general(GeneralDeclaration::new(
        "Tool",
        TableBinding::new("tool", &["name"]),
    ))
    .unwrap();
    // A stylus adds no columns of its own; it rides on the base table.
    hierarchy
        .declare(TypeDeclaration::new(
            "Stylus",
            SpecializationPath::root(),
            "stylus",
            AccessorConfig::Inherit,
        ))
        .unwrap();

    let conn = db::open_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tool (id INTEGER PRIMARY KEY, specialization TEXT NOT NULL, name TEXT NOT NULL);
         INSERT INTO tool VALUES (1, '/stylus/', 'Fine stylus');",
    )
    .unwrap();

    let records: Vec<_> = hierarchy
        .specializations()
        .fetch(&conn)
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].type_name(), "Stylus");
    assert_eq!(
        records[0].declared_path(),
        &SpecializationPath::from("/stylus/")
    );
}

/// Typed record produced by a hand-written accessor.
#[derive(Debug)]
struct Hammer {
    id: RecordId,
    name: String,
    weight: i64,
    specialization: SpecializationPath,
    declared: SpecializationPath,
}

impl Specialized for Hammer {
    fn id(&self) -> RecordId {
        self.id
    }

    fn specialization(&self) -> &SpecializationPath {
        &self.specialization
    }

    fn declared_path(&self) -> &SpecializationPath {
        &self.declared
    }

    fn type_name(&self) -> &str {
        "Hammer"
    }

    fn columns(&self) -> Vec<&str> {
        vec!["name", "weight"]
    }

    fn value(&self, _column: &str) -> Option<&rusqlite::types::Value> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct HammerAccessor;

impl HammerAccessor {
    fn row_to_hammer(row: &rusqlite::Row<'_>) -> Result<Hammer, rusqlite::Error> {
        Ok(Hammer {
            id: row.get(0)?,
            name: row.get(1)?,
            weight: row.get(2)?,
            specialization: SpecializationPath::from(row.get::<_, String>(3)?),
            declared: SpecializationPath::from("/hammer/"),
        })
    }
}

impl SpecializationAccessor for HammerAccessor {
    fn fetch_by_ids(
        &self,
        conn: &Connection,
        ids: &[RecordId],
        _projection: &Projection,
    ) -> Result<FxHashMap<RecordId, Box<dyn Specialized>>, SpeciateError> {
        let mut out: FxHashMap<RecordId, Box<dyn Specialized>> = FxHashMap::default();
        if ids.is_empty() {
            return Ok(out);
        }
        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT b.id, b.name, h.weight, b.specialization
             FROM tool b JOIN hammer h ON h.id = b.id WHERE b.id IN ({})",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(ids.iter()))?;
        while let Some(row) = rows.next()? {
            let hammer = Self::row_to_hammer(row)?;
            out.insert(hammer.id, Box::new(hammer));
        }
        Ok(out)
    }

    fn fetch_by_id(
        &self,
        conn: &Connection,
        id: RecordId,
    ) -> Result<Box<dyn Specialized>, SpeciateError> {
        let mut stmt = conn.prepare(
            "SELECT b.id, b.name, h.weight, b.specialization
             FROM tool b JOIN hammer h ON h.id = b.id WHERE b.id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id])?;
        match rows.next()? {
            Some(row) => Ok(Box::new(Self::row_to_hammer(row)?)),
            None => Err(SpeciateError::RecordNotFound(
                "Hammer matching query does not exist".to_string(),
            )),
        }
    }
}

#[test]
fn test_custom_accessor_returns_typed_instances() {
    let mut hierarchy = Hierarchy::general(GeneralDeclaration::new(
        "Tool",
        TableBinding::new("tool", &["name"]),
    ))
    .unwrap();
    hierarchy
        .declare(TypeDeclaration::new(
            "Hammer",
            SpecializationPath::root(),
            "hammer",
            AccessorConfig::Custom(Arc::new(HammerAccessor)),
        ))
        .unwrap();

    let conn = db::open_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE tool (id INTEGER PRIMARY KEY, specialization TEXT NOT NULL, name TEXT NOT NULL);
         CREATE TABLE hammer (id INTEGER PRIMARY KEY REFERENCES tool(id), weight INTEGER NOT NULL);
         INSERT INTO tool VALUES (1, '/hammer/', 'Claw hammer');
         INSERT INTO hammer VALUES (1, 600);",
    )
    .unwrap();

    let records: Vec<_> = hierarchy
        .specializations()
        .fetch(&conn)
        .unwrap()
        .collect();
    assert_eq!(records.len(), 1);

    let hammer = records[0]
        .as_any()
        .downcast_ref::<Hammer>()
        .expect("typed instance");
    assert_eq!(hammer.name, "Claw hammer");
    assert_eq!(hammer.weight, 600);
}
