//! Conref refinement.
//!
//! A file consumed solely through inclusion never appears in the output on
//! its own, so it leaves the primary manifest. A file that is also
//! referenced as an independent target stays.

use super::state::ResolutionState;

/// Remove pure conref targets from the full and topic sets.
pub(crate) fn refine(state: &mut ResolutionState) {
    let pure: Vec<String> = state
        .conref_target_set
        .iter()
        .filter(|target| !state.non_conref_copyto_target_set.contains(*target))
        .cloned()
        .collect();

    state.conref_target_set = pure.iter().cloned().collect();

    for target in &pure {
        state.dita_set.remove(target);
        state.full_topic_set.remove(target);
    }
}
