use rusqlite;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpeciateError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("declaration error: {0}")]
    Declaration(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("record not found: {0}")]
    RecordNotFound(String),
    #[error("unknown specialization: {0}")]
    UnknownSpecialization(String),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("specialization state diverged: {0}")]
    Inconsistency(String),
}
