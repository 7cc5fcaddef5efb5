//! Working state of one resolution run.
//!
//! Every classification set lives on one aggregate owned by the traversal
//! engine. Sets are populated monotonically while the worklist drains; only
//! the conref and copy-to refiners remove membership afterwards.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::resolve::keydef::{KeyDef, KeyDefRecord};
use crate::resolve::{Diagnostic, Severity};
use crate::util;

/// Mutable aggregate behind the traversal engine.
#[derive(Debug, Default)]
pub(crate) struct ResolutionState {
    /// Files waiting to be scanned, strictly FIFO
    pub wait_list: VecDeque<String>,
    /// Literal strings ever enqueued (exact equality, not canonical)
    pub seen: BTreeSet<String>,

    pub dita_set: BTreeSet<String>,
    pub full_topic_set: BTreeSet<String>,
    pub full_map_set: BTreeSet<String>,
    pub href_topic_set: BTreeSet<String>,
    pub href_map_set: BTreeSet<String>,
    pub conref_set: BTreeSet<String>,
    pub keyref_set: BTreeSet<String>,
    pub coderef_set: BTreeSet<String>,
    pub image_set: BTreeSet<String>,
    pub flag_image_set: BTreeSet<String>,
    pub rel_flag_image_set: BTreeSet<String>,
    pub html_set: BTreeSet<String>,
    pub href_target_set: BTreeSet<String>,
    pub href_with_id_set: BTreeSet<String>,
    pub chunk_topic_set: BTreeSet<String>,
    pub scheme_set: BTreeSet<String>,
    pub conref_target_set: BTreeSet<String>,
    pub non_conref_copyto_target_set: BTreeSet<String>,
    pub ignored_copyto_source_set: BTreeSet<String>,
    pub copyto_source_set: BTreeSet<String>,
    pub subsidiary_set: BTreeSet<String>,
    pub conref_push_set: BTreeSet<String>,
    pub resource_only_set: BTreeSet<String>,
    pub out_of_scope_set: BTreeSet<String>,

    pub copyto_map: BTreeMap<String, String>,
    pub key_defs: BTreeMap<String, KeyDef>,
    pub external_keys: BTreeSet<String>,
    pub scheme_keydefs: Vec<KeyDefRecord>,
    pub scheme_dictionary: BTreeMap<String, BTreeSet<String>>,
    pub relationship_graph: BTreeMap<String, BTreeSet<String>>,
    pub export_anchors: String,

    /// Maximum ascension depth seen so far; monotonic non-decreasing
    pub uplevels: usize,

    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionState {
    /// Enqueue a file unless its literal spelling was already seen.
    pub fn add_to_wait_list(&mut self, file: &str) {
        if self.seen.contains(file) {
            return;
        }
        self.seen.insert(file.to_string());
        self.wait_list.push_back(file.to_string());
    }

    /// Mark a literal spelling as processed without enqueueing it.
    pub fn mark_seen(&mut self, file: &str) {
        self.seen.insert(file.to_string());
    }

    /// Raise the ascension maximum for one discovered reference.
    pub fn update_uplevels(&mut self, reference: &str) {
        let (path, _format) = util::split_format_tag(reference);
        let depth = util::ascension_depth(path);
        if depth > self.uplevels {
            self.uplevels = depth;
        }
    }

    pub fn warn(&mut self, code: &'static str, message: String) {
        log::warn!("[{code}] {message}");
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Warning,
            message,
        });
    }

    pub fn error(&mut self, code: &'static str, message: String) {
        log::error!("[{code}] {message}");
        self.diagnostics.push(Diagnostic {
            code,
            severity: Severity::Error,
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_list_literal_dedup() {
        let mut state = ResolutionState::default();
        state.add_to_wait_list("a.dita");
        state.add_to_wait_list("a.dita");
        // Literal equality: a differently-spelled alias of the same file
        // is treated as distinct.
        state.add_to_wait_list("./a.dita");
        assert_eq!(state.wait_list.len(), 2);
    }

    #[test]
    fn test_uplevels_monotonic() {
        let mut state = ResolutionState::default();
        state.update_uplevels("../a.dita");
        assert_eq!(state.uplevels, 1);
        state.update_uplevels("../../b.dita");
        assert_eq!(state.uplevels, 2);
        state.update_uplevels("c.dita");
        assert_eq!(state.uplevels, 2);
        state.update_uplevels("../d.dita|html");
        assert_eq!(state.uplevels, 2);
    }
}
