//! Copy-to refinement.
//!
//! Runs after the worklist drains and after rebasing, because the on-disk
//! existence check for sources needs the final prefix. Copy-to targets are
//! synthesized output artifacts, so they join the full and topic sets even
//! though no such file exists in the input tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::state::ResolutionState;

/// Validate mappings, add targets, and drop pure sources.
pub(crate) fn refine(state: &mut ResolutionState, base_input_dir: &str, prefix: &str) {
    // Keep only mappings whose source actually exists under the rebased
    // root; a source carrying conref passes its conref membership on to
    // the synthesized target.
    let mut retained: BTreeMap<String, String> = BTreeMap::new();
    for (target, source) in &state.copyto_map {
        let candidate = format!("{base_input_dir}/{prefix}{source}");
        if Path::new(&candidate).exists() {
            retained.insert(target.clone(), source.clone());
            if state.conref_set.contains(source) {
                state.conref_set.insert(target.clone());
            }
        }
    }
    state.copyto_map = retained;

    for target in state.copyto_map.keys() {
        state.dita_set.insert(target.clone());
        state.full_topic_set.insert(target.clone());
    }

    // A source is "pure" when it only ever feeds copy-to output: never
    // referenced as an independent target and not itself a copy-to target.
    let mut total_sources: BTreeSet<String> = state.copyto_map.values().cloned().collect();
    total_sources.extend(state.ignored_copyto_source_set.iter().cloned());

    let pure: BTreeSet<String> = total_sources
        .into_iter()
        .filter(|src| {
            !state.non_conref_copyto_target_set.contains(src)
                && !state.copyto_map.contains_key(src)
        })
        .collect();

    for src in &pure {
        state.dita_set.remove(src);
        state.full_topic_set.remove(src);
    }
    state.copyto_source_set = pure;
}
