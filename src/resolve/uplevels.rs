//! Path rebasing onto the common root.
//!
//! During traversal the engine only tracks the maximum ascension depth (see
//! [`ResolutionState::update_uplevels`](super::state::ResolutionState));
//! rebasing must wait until the worklist is fully drained, because the
//! final depth is a global maximum over the whole closure.

use std::path::Path;

use crate::util;

/// Walk the base directory upward and build the reintroduction prefix.
///
/// Returns the rebased base directory and the prefix, a chain of the
/// directory names that were exited, in descent order with a trailing
/// separator (e.g. `"docs/maps/"`). With zero uplevels the prefix is empty
/// and the directory is unchanged.
pub fn rebase(base_input_dir: &str, uplevels: usize) -> (String, String) {
    let mut dir = base_input_dir.to_string();
    let mut prefix = String::new();

    for _ in 0..uplevels {
        let path = Path::new(&dir);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        prefix = format!("{name}/{prefix}");
        dir = path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or(dir);
    }

    (dir, prefix)
}

/// Rewrite one output path with the prefix applied.
///
/// Absolute paths pass through with normalization only; relative paths get
/// the prefix prepended, separators normalized to forward slashes.
pub fn apply_prefix(prefix: &str, path: &str) -> String {
    if util::is_absolute(path) {
        util::remove_redundant_names(path)
    } else {
        util::remove_redundant_names(&format!("{prefix}{path}"))
    }
}

/// The ascension chain the manifest publishes: `../` repeated per level.
pub fn uplevel_chain(uplevels: usize) -> String {
    "../".repeat(uplevels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_zero_levels() {
        let (dir, prefix) = rebase("/proj/docs/maps", 0);
        assert_eq!(dir, "/proj/docs/maps");
        assert_eq!(prefix, "");
    }

    #[test]
    fn test_rebase_walks_upward() {
        let (dir, prefix) = rebase("/proj/docs/maps", 1);
        assert_eq!(dir, "/proj/docs");
        assert_eq!(prefix, "maps/");

        let (dir, prefix) = rebase("/proj/docs/maps", 2);
        assert_eq!(dir, "/proj");
        assert_eq!(prefix, "docs/maps/");
    }

    #[test]
    fn test_apply_prefix() {
        assert_eq!(apply_prefix("maps/", "t.dita"), "maps/t.dita");
        assert_eq!(apply_prefix("maps/", "../t.dita"), "t.dita");
        assert_eq!(apply_prefix("", "t.dita"), "t.dita");
        assert_eq!(apply_prefix("maps/", "/abs/t.dita"), "/abs/t.dita");
    }

    #[test]
    fn test_uplevel_chain() {
        assert_eq!(uplevel_chain(0), "");
        assert_eq!(uplevel_chain(3), "../../../");
    }
}
