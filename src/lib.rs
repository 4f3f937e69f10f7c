//! speciate: table-per-subtype specialization for SQLite-backed records.
//!
//! A base "general" record type is transparently resolved to the most
//! specific subtype row matching it. Queries against the general type come
//! back correctly specialized: the resolution engine scans the base table in
//! the caller's order, partitions ids by specialization label, issues one
//! bulk fetch per subtype, and reassembles the results without reordering.
//!
//! # Layers
//!
//! - [`core::paths`]: slash-delimited path addressing for hierarchy levels
//! - [`core::registry`] / [`core::declare`]: per-level registries populated
//!   by a one-shot declaration pass
//! - [`core::query`]: the result materializer (`final` vs `direct`
//!   resolution)
//! - [`core::resolve`]: the same resolution for one already-loaded record
//! - [`demo`]: the writing-implements demonstration hierarchy the CLI runs
//!   against
//!
//! # Example
//!
//! ```no_run
//! use speciate::core::accessor::{AccessorConfig, TableBinding};
//! use speciate::core::db;
//! use speciate::core::declare::{GeneralDeclaration, TypeDeclaration};
//! use speciate::core::paths::SpecializationPath;
//! use speciate::core::record::Specialized;
//! use speciate::core::registry::Hierarchy;
//!
//! # fn main() -> Result<(), speciate::core::error::SpeciateError> {
//! let mut implements = Hierarchy::general(GeneralDeclaration::new(
//!     "WritingImplement",
//!     TableBinding::new("writing_implement", &["name", "length"]),
//! ))?;
//! implements.declare(TypeDeclaration::new(
//!     "Pen",
//!     SpecializationPath::root(),
//!     "pen",
//!     AccessorConfig::Table(TableBinding::new("pen", &["ink_colour"])),
//! ))?;
//!
//! let conn = db::open_store("implements.db")?;
//! for record in implements.specializations().fetch(&conn)? {
//!     println!("#{} resolved as {}", record.id(), record.type_name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod demo;

mod cli;

use crate::cli::{Cli, Command};
use crate::core::error::SpeciateError;
use crate::core::paths::SpecializationPath;
use crate::core::query::SpecializedQuery;
use crate::core::record::Specialized;
use crate::core::registry::Hierarchy;
use crate::core::{db, time};

use clap::Parser;
use rusqlite::types::Value;

pub fn run() -> Result<(), SpeciateError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { db: db_path } => cmd_init(&db_path),
        Command::Schema { format } => cmd_schema(&format),
        Command::List {
            db: db_path,
            direct,
            prefix,
            format,
        } => cmd_list(&db_path, direct, prefix.as_deref(), &format),
        Command::Get {
            db: db_path,
            name,
            id,
            direct,
            specialization,
            format,
        } => cmd_get(
            &db_path,
            name.as_deref(),
            id,
            direct,
            specialization.as_deref(),
            &format,
        ),
    }
}

fn cmd_init(db_path: &str) -> Result<(), SpeciateError> {
    let conn = db::open_store(db_path)?;
    let hierarchy = demo::writing_implements()?;
    demo::init_store(&conn)?;

    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM writing_implement", [], |row| {
        row.get(0)
    })?;
    if existing > 0 {
        println!(
            "Store at {} already holds {} records; seed skipped",
            db_path, existing
        );
        return Ok(());
    }

    demo::seed_store(&conn, &hierarchy)?;
    println!("Demo store initialized at {}", db_path);
    Ok(())
}

fn cmd_schema(format: &str) -> Result<(), SpeciateError> {
    let hierarchy = demo::writing_implements()?;

    if format == "json" {
        let mut levels = Vec::new();
        for path in hierarchy.declared_paths() {
            let descriptor = hierarchy.descriptor_at(&path)?;
            levels.push(serde_json::json!({
                "path": path.as_str(),
                "type": descriptor.name,
                "parent": descriptor.parent.as_ref().map(|p| p.as_str().to_string()),
                "leaf": hierarchy.is_leaf(&path),
            }));
        }
        println!(
            "{}",
            envelope("schema", "ok", serde_json::json!({ "levels": levels }))
        );
        return Ok(());
    }

    use colored::Colorize;
    println!("{}", hierarchy.root().name.bold());
    for path in hierarchy.declared_paths() {
        if path.is_root() {
            continue;
        }
        let descriptor = hierarchy.descriptor_at(&path)?;
        let indent = "  ".repeat(path.depth() - 1);
        println!(
            "{}{} {}",
            indent,
            descriptor.name.bold(),
            path.as_str().cyan()
        );
    }
    Ok(())
}

fn cmd_list(
    db_path: &str,
    direct: bool,
    prefix: Option<&str>,
    format: &str,
) -> Result<(), SpeciateError> {
    let conn = db::open_store(db_path)?;
    let hierarchy = demo::writing_implements()?;

    let mut query = hierarchy.specializations().order_by("id");
    if direct {
        query = query.direct();
    }
    if let Some(prefix) = prefix {
        query = query.prefix(&SpecializationPath::from(prefix));
    }

    let records: Vec<_> = query.fetch(&conn)?.collect();
    if format == "json" {
        let rows: Vec<_> = records.iter().map(|r| record_to_json(r.as_ref())).collect();
        println!(
            "{}",
            envelope(
                "list",
                "ok",
                serde_json::json!({ "count": rows.len(), "records": rows })
            )
        );
        return Ok(());
    }

    for record in &records {
        print_record(record.as_ref());
    }
    Ok(())
}

fn cmd_get(
    db_path: &str,
    name: Option<&str>,
    id: Option<i64>,
    direct: bool,
    specialization: Option<&str>,
    format: &str,
) -> Result<(), SpeciateError> {
    let conn = db::open_store(db_path)?;
    let hierarchy = demo::writing_implements()?;

    let query = build_get_query(&hierarchy, name, id, direct, specialization)?;
    let record = query.get(&conn)?;

    if format == "json" {
        println!(
            "{}",
            envelope("get", "ok", record_to_json(record.as_ref()))
        );
        return Ok(());
    }

    print_record(record.as_ref());
    Ok(())
}

fn build_get_query<'h>(
    hierarchy: &'h Hierarchy,
    name: Option<&str>,
    id: Option<i64>,
    direct: bool,
    specialization: Option<&str>,
) -> Result<SpecializedQuery<'h>, SpeciateError> {
    let mut query = hierarchy.specializations();
    match (name, id) {
        (Some(name), _) => query = query.filter_bind("name = ?", name.to_string()),
        (None, Some(id)) => query = query.filter_bind("id = ?", id),
        (None, None) => {
            return Err(SpeciateError::Validation(
                "pass --name or --id to identify the record".to_string(),
            ))
        }
    }
    if direct {
        query = query.direct();
    }
    if let Some(label) = specialization {
        query = query.with_specialization(label);
    }
    Ok(query)
}

fn print_record(record: &dyn Specialized) {
    use colored::Colorize;
    let name = match record.value("name") {
        Some(Value::Text(name)) => name.clone(),
        _ => String::new(),
    };
    println!(
        "#{:<4} {:<12} {:<14} {}",
        record.id(),
        name,
        record.type_name().bold(),
        record.specialization().as_str().cyan()
    );
}

fn record_to_json(record: &dyn Specialized) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    for column in record.columns() {
        if let Some(value) = record.value(column) {
            fields.insert(column.to_string(), sql_value_to_json(value));
        }
    }
    serde_json::json!({
        "id": record.id(),
        "type": record.type_name(),
        "specialization": record.specialization().as_str(),
        "fields": fields,
    })
}

fn sql_value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(n) => serde_json::json!(n),
        Value::Real(r) => serde_json::json!(r),
        Value::Text(s) => serde_json::json!(s),
        Value::Blob(b) => serde_json::json!(format!("<{} bytes>", b.len())),
    }
}

fn envelope(cmd: &str, status: &str, result: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "ts": time::now_epoch_z(),
        "event_id": time::new_event_id(),
        "cmd": cmd,
        "status": status,
        "result": result,
    })
}
