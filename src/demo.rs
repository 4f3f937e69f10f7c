//! Built-in demonstration hierarchy: writing implements.
//!
//! `WritingImplement` is the general type; `Pen` and `Pencil` specialize it,
//! and `Pen` is further specialized into `FountainPen` and `BallPointPen`.
//! The CLI runs against this schema, and the integration tests use it as
//! their fixture hierarchy.

use crate::core::accessor::{AccessorConfig, TableBinding};
use crate::core::declare::{GeneralDeclaration, TypeDeclaration};
use crate::core::error::SpeciateError;
use crate::core::paths::SpecializationPath;
use crate::core::record::RecordId;
use crate::core::registry::Hierarchy;
use rusqlite::{params, Connection};

pub const PEN: &str = "/pen/";
pub const FOUNTAIN_PEN: &str = "/pen/fountain_pen/";
pub const BALLPOINT_PEN: &str = "/pen/ballpoint_pen/";
pub const PENCIL: &str = "/pencil/";

pub const WRITING_IMPLEMENT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS writing_implement (
        id INTEGER PRIMARY KEY,
        specialization TEXT NOT NULL,
        name TEXT NOT NULL,
        length INTEGER NOT NULL
    )
";
pub const WRITING_IMPLEMENT_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_writing_implement_specialization
     ON writing_implement(specialization)";

pub const PEN_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pen (
        id INTEGER PRIMARY KEY REFERENCES writing_implement(id),
        ink_colour TEXT NOT NULL
    )
";
pub const FOUNTAIN_PEN_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS fountain_pen (
        id INTEGER PRIMARY KEY REFERENCES pen(id),
        nib_width REAL NOT NULL
    )
";
pub const BALLPOINT_PEN_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ballpoint_pen (
        id INTEGER PRIMARY KEY REFERENCES pen(id),
        replaceable_insert INTEGER NOT NULL
    )
";
pub const PENCIL_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pencil (
        id INTEGER PRIMARY KEY REFERENCES writing_implement(id),
        lead TEXT NOT NULL
    )
";

/// Declare the writing-implements hierarchy.
pub fn writing_implements() -> Result<Hierarchy, SpeciateError> {
    let mut hierarchy = Hierarchy::general(GeneralDeclaration::new(
        "WritingImplement",
        TableBinding::new("writing_implement", &["name", "length"]),
    ))?;

    hierarchy.declare(TypeDeclaration::new(
        "Pen",
        SpecializationPath::root(),
        "pen",
        AccessorConfig::Table(TableBinding::new("pen", &["ink_colour"])),
    ))?;
    hierarchy.declare(TypeDeclaration::new(
        "FountainPen",
        SpecializationPath::from(PEN),
        "fountain_pen",
        AccessorConfig::Table(TableBinding::new("fountain_pen", &["nib_width"])),
    ))?;
    hierarchy.declare(TypeDeclaration::new(
        "BallPointPen",
        SpecializationPath::from(PEN),
        "ballpoint_pen",
        AccessorConfig::Table(TableBinding::new("ballpoint_pen", &["replaceable_insert"])),
    ))?;
    hierarchy.declare(TypeDeclaration::new(
        "Pencil",
        SpecializationPath::root(),
        "pencil",
        AccessorConfig::Table(TableBinding::new("pencil", &["lead"])),
    ))?;

    Ok(hierarchy)
}

/// Create the demo tables and the specialization-label index.
pub fn init_store(conn: &Connection) -> Result<(), SpeciateError> {
    conn.execute(WRITING_IMPLEMENT_SCHEMA, [])?;
    conn.execute(WRITING_IMPLEMENT_SCHEMA_INDEX, [])?;
    conn.execute(PEN_SCHEMA, [])?;
    conn.execute(FOUNTAIN_PEN_SCHEMA, [])?;
    conn.execute(BALLPOINT_PEN_SCHEMA, [])?;
    conn.execute(PENCIL_SCHEMA, [])?;
    Ok(())
}

/// Label applied to a new record of the type at `declared` when the caller
/// does not supply one: the type's own path for final specializations.
fn label_for(
    hierarchy: &Hierarchy,
    declared: &SpecializationPath,
    explicit: Option<&str>,
) -> SpecializationPath {
    match explicit {
        Some(label) => SpecializationPath::from(label),
        None => hierarchy
            .default_specialization(declared)
            .unwrap_or_else(|| declared.clone()),
    }
}

fn insert_base(
    conn: &Connection,
    label: &SpecializationPath,
    name: &str,
    length: i64,
) -> Result<RecordId, SpeciateError> {
    conn.execute(
        "INSERT INTO writing_implement (specialization, name, length) VALUES (?1, ?2, ?3)",
        params![label.as_str(), name, length],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_pen(
    conn: &Connection,
    hierarchy: &Hierarchy,
    name: &str,
    length: i64,
    ink_colour: &str,
    specialization: Option<&str>,
) -> Result<RecordId, SpeciateError> {
    let label = label_for(hierarchy, &SpecializationPath::from(PEN), specialization);
    let id = insert_base(conn, &label, name, length)?;
    conn.execute(
        "INSERT INTO pen (id, ink_colour) VALUES (?1, ?2)",
        params![id, ink_colour],
    )?;
    Ok(id)
}

pub fn insert_fountain_pen(
    conn: &Connection,
    hierarchy: &Hierarchy,
    name: &str,
    length: i64,
    ink_colour: &str,
    nib_width: f64,
    specialization: Option<&str>,
) -> Result<RecordId, SpeciateError> {
    let label = label_for(
        hierarchy,
        &SpecializationPath::from(FOUNTAIN_PEN),
        specialization,
    );
    let id = insert_base(conn, &label, name, length)?;
    conn.execute(
        "INSERT INTO pen (id, ink_colour) VALUES (?1, ?2)",
        params![id, ink_colour],
    )?;
    conn.execute(
        "INSERT INTO fountain_pen (id, nib_width) VALUES (?1, ?2)",
        params![id, nib_width],
    )?;
    Ok(id)
}

pub fn insert_ballpoint_pen(
    conn: &Connection,
    hierarchy: &Hierarchy,
    name: &str,
    length: i64,
    ink_colour: &str,
    replaceable_insert: bool,
    specialization: Option<&str>,
) -> Result<RecordId, SpeciateError> {
    let label = label_for(
        hierarchy,
        &SpecializationPath::from(BALLPOINT_PEN),
        specialization,
    );
    let id = insert_base(conn, &label, name, length)?;
    conn.execute(
        "INSERT INTO pen (id, ink_colour) VALUES (?1, ?2)",
        params![id, ink_colour],
    )?;
    conn.execute(
        "INSERT INTO ballpoint_pen (id, replaceable_insert) VALUES (?1, ?2)",
        params![id, replaceable_insert],
    )?;
    Ok(id)
}

pub fn insert_pencil(
    conn: &Connection,
    hierarchy: &Hierarchy,
    name: &str,
    length: i64,
    lead: &str,
    specialization: Option<&str>,
) -> Result<RecordId, SpeciateError> {
    let label = label_for(hierarchy, &SpecializationPath::from(PENCIL), specialization);
    let id = insert_base(conn, &label, name, length)?;
    conn.execute(
        "INSERT INTO pencil (id, lead) VALUES (?1, ?2)",
        params![id, lead],
    )?;
    Ok(id)
}

/// Seed the fixture rows: one plain pen, two fountain pens, two ballpoints
/// and two pencils.
pub fn seed_store(conn: &Connection, hierarchy: &Hierarchy) -> Result<(), SpeciateError> {
    insert_pen(conn, hierarchy, "General pen", 15, "Blue", Some(PEN))?;
    insert_fountain_pen(conn, hierarchy, "Mont Blanc", 18, "Black", 1.25, None)?;
    insert_fountain_pen(conn, hierarchy, "Parker", 14, "Blue", 0.75, None)?;
    insert_ballpoint_pen(conn, hierarchy, "Bic", 12, "Blue", false, None)?;
    insert_ballpoint_pen(conn, hierarchy, "Papermate", 13, "Green", true, None)?;
    insert_pencil(conn, hierarchy, "Crayola", 8, "B2", None)?;
    insert_pencil(conn, hierarchy, "Technical", 12, "H5", None)?;
    Ok(())
}
