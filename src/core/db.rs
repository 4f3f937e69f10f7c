use crate::core::error;
use rusqlite::Connection;

/// Open a store connection with the pragmas every speciate store runs under.
pub fn open_store(db_path: &str) -> Result<Connection, error::SpeciateError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::SpeciateError::Sqlite)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::SpeciateError::Sqlite)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::SpeciateError::Sqlite)?;
    Ok(conn)
}

/// In-memory store, used by tests and throwaway resolution runs.
pub fn open_memory() -> Result<Connection, error::SpeciateError> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::SpeciateError::Sqlite)?;
    Ok(conn)
}
