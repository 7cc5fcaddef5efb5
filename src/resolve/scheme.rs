//! Subject-scheme dictionary propagation.
//!
//! A file that declares or references subject schemes passes its whole
//! scheme set to every href target it discovered, so downstream filtering
//! can find the controlled vocabulary governing any file without walking
//! the map again.

use std::collections::{BTreeMap, BTreeSet};

use crate::util;

/// Merge one file's scheme set into the dictionary, for the file itself
/// and for every href target it references. Existing entries are unioned,
/// never replaced.
pub(crate) fn propagate(
    dictionary: &mut BTreeMap<String, BTreeSet<String>>,
    current_file: &str,
    schemes: &BTreeSet<String>,
    href_targets: &BTreeSet<String>,
) {
    if schemes.is_empty() {
        return;
    }

    let current = util::to_unix_seps(current_file);
    dictionary
        .entry(current)
        .or_default()
        .extend(schemes.iter().cloned());

    for target in href_targets {
        let target = util::to_unix_seps(target);
        dictionary
            .entry(target)
            .or_default()
            .extend(schemes.iter().cloned());
    }
}
