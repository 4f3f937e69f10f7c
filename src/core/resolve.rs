//! Single-instance resolution.
//!
//! The query layer resolves whole result sets; this module does the
//! equivalent for one already-loaded record: look its label up in the
//! registry of the record's own declared type and re-fetch it, fully
//! specialized, by primary key.

use crate::core::error::SpeciateError;
use crate::core::paths::find_next_path_down;
use crate::core::query::Resolution;
use crate::core::record::Specialized;
use crate::core::registry::Hierarchy;
use rusqlite::Connection;

/// Resolve `record` to its specialized counterpart.
///
/// Under `Final` resolution the record's label is looked up as-is; under
/// `Direct` it is first reduced to the level one step below the record's own
/// declared type. An `UnknownSpecialization` error is the expected signal
/// that the record is already the most specialized type; callers walking the
/// hierarchy one level at a time stop on it.
pub fn resolve_as_specialization(
    hierarchy: &Hierarchy,
    conn: &Connection,
    record: &dyn Specialized,
    resolution: Resolution,
) -> Result<Box<dyn Specialized>, SpeciateError> {
    let label = match resolution {
        Resolution::Final => record.specialization().clone(),
        Resolution::Direct => find_next_path_down(record.declared_path(), record.specialization()),
    };

    let registry = hierarchy.registry_at(record.declared_path())?;
    let descriptor = registry.get(&label)?;
    descriptor.accessor().fetch_by_id(conn, record.id())
}

/// Resolve `record`, treating "already the most specialized type" as a
/// non-event: returns `None` in that case so the caller keeps the record it
/// has. Used when following references that may already be fully
/// specialized.
pub fn resolve_or_general(
    hierarchy: &Hierarchy,
    conn: &Connection,
    record: &dyn Specialized,
    resolution: Resolution,
) -> Result<Option<Box<dyn Specialized>>, SpeciateError> {
    match resolve_as_specialization(hierarchy, conn, record, resolution) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(SpeciateError::UnknownSpecialization(_)) => Ok(None),
        Err(err) => Err(err),
    }
}
