//! CLI struct definitions for the speciate command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "speciate",
    version = env!("CARGO_PKG_VERSION"),
    about = "Exercise specialization hierarchies against a SQLite store: declare subtypes, list records fully specialized, resolve single rows."
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create and seed the demo writing-implements store.
    Init {
        /// Store file to create.
        #[clap(long, default_value = "speciate.db")]
        db: String,
    },
    /// Print the declared demo hierarchy.
    Schema {
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// List records, resolved to their specialized types.
    List {
        #[clap(long, default_value = "speciate.db")]
        db: String,
        /// Resolve to the immediate child level instead of the leaf type.
        #[clap(long)]
        direct: bool,
        /// Narrow to labels under this path prefix (e.g. '/pen/').
        #[clap(long)]
        prefix: Option<String>,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Resolve a single record.
    Get {
        #[clap(long, default_value = "speciate.db")]
        db: String,
        /// Look the record up by name.
        #[clap(long)]
        name: Option<String>,
        /// Look the record up by id.
        #[clap(long)]
        id: Option<i64>,
        /// Resolve to the immediate child level instead of the leaf type.
        #[clap(long)]
        direct: bool,
        /// Explicit specialization label, bypassing label detection.
        #[clap(long)]
        specialization: Option<String>,
        /// Output format: 'text' or 'json'.
        #[clap(long, default_value = "text")]
        format: String,
    },
}
