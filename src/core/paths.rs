//! Path addressing for specialization hierarchies.
//!
//! A specialization is addressed by a slash-delimited path (`/pen/fountain_pen/`).
//! Depth is the number of separators; an ancestor is a string prefix that ends
//! in the separator. Paths are assigned once at declaration time and never
//! change afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used to divide hierarchy levels in specialization paths.
pub const PATH_SEPARATOR: char = '/';

/// A slash-delimited specialization path. The root of a hierarchy is `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecializationPath(String);

impl SpecializationPath {
    /// The path of a hierarchy's general (root) type.
    pub fn root() -> Self {
        SpecializationPath(PATH_SEPARATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Number of separator occurrences. The root has depth 1.
    pub fn depth(&self) -> usize {
        self.0.matches(PATH_SEPARATOR).count()
    }

    /// The path of a specialization declared directly beneath this level.
    pub fn child(&self, marker: &str) -> SpecializationPath {
        SpecializationPath(format!("{}{}{}", self.0, marker, PATH_SEPARATOR))
    }

    /// True when `self` is a strict ancestor of `other` (prefix, not equal).
    pub fn is_strict_ancestor_of(&self, other: &SpecializationPath) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }
}

impl fmt::Display for SpecializationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecializationPath {
    fn from(s: &str) -> Self {
        SpecializationPath(s.to_string())
    }
}

impl From<String> for SpecializationPath {
    fn from(s: String) -> Self {
        SpecializationPath(s)
    }
}

/// Reduce `full` so that it names the level exactly one step below `current`,
/// re-terminated with the separator.
///
/// `find_next_path_down("/", "/home/barry/dev/")` is `/home/`;
/// `find_next_path_down("/home/", "/home/barry/dev/")` is `/home/barry/`.
///
/// `full` must descend from `current`; this is asserted in debug builds only.
/// When `full` does not reach below `current` at all, the result carries a
/// doubled separator (`/pen//`) and therefore never resolves in a registry,
/// which is exactly the miss that signals "already the most specialized".
pub fn find_next_path_down(
    current: &SpecializationPath,
    full: &SpecializationPath,
) -> SpecializationPath {
    debug_assert!(
        full.as_str().starts_with(current.as_str()),
        "{} does not descend from {}",
        full,
        current
    );

    let next_level = current.depth() + 1;
    let truncated = full
        .as_str()
        .splitn(next_level + 1, PATH_SEPARATOR)
        .take(next_level)
        .collect::<Vec<_>>()
        .join(&PATH_SEPARATOR.to_string());

    SpecializationPath(format!("{}{}", truncated, PATH_SEPARATOR))
}
