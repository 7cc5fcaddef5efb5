//! Per-file reference scanning.
//!
//! A scanner reads one document and reports every outbound reference it
//! carries, together with role flags for the document itself. The closure
//! traversal engine consumes one [`ScanResult`] per file; it never touches
//! XML itself.

mod ditaval;
mod xml;

pub use ditaval::{FilterImages, read_filter_file};
pub use xml::XmlScanner;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::Result;

/// Role flags for a scanned document.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleFlags {
    /// Root element is a topic
    pub is_topic: bool,
    /// Root element is a map
    pub is_map: bool,
    /// Document contains at least one direct href reference
    pub has_href: bool,
    /// Document contains a conref inclusion
    pub has_conref: bool,
    /// Document contains keyed indirection (keyref/conkeyref)
    pub has_keyref: bool,
    /// Document references a code-sample payload
    pub has_coderef: bool,
    /// Document pushes content via conaction
    pub has_conaction: bool,
}

/// Everything a scanner learned from one document.
///
/// All recorded paths are relative to the base input directory (the
/// scanner rebases references against the referring file's directory),
/// with forward-slash separators and redundant segments removed. Entries
/// in [`non_copyto_refs`](Self::non_copyto_refs) may carry a `|format`
/// suffix when the reference declared a non-default format.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Whether the document is a well-formed DITA input at all
    pub valid: bool,
    pub flags: RoleFlags,
    /// Every discovered reference except copy-to targets, in document order
    pub non_copyto_refs: Vec<String>,
    /// Copy-to mappings (target, source) in document order
    pub copyto: Vec<(String, String)>,
    /// Copy-to sources rejected within this document (duplicate target)
    pub ignored_copyto_sources: BTreeSet<String>,
    /// Key declarations: raw (possibly multi-alias) key name, target href
    /// (empty when the declaration has no target)
    pub key_defs: Vec<(String, String)>,
    /// Key aliases whose target resolves outside the project
    pub external_key_names: BTreeSet<String>,
    /// All local href targets
    pub href_targets: BTreeSet<String>,
    /// Topics referenced with an element-id fragment
    pub href_topic_targets: BTreeSet<String>,
    /// Topics referenced under a chunk directive
    pub chunk_topics: BTreeSet<String>,
    /// Files consumed through inclusion
    pub conref_targets: BTreeSet<String>,
    /// Files referenced by plain href (neither conref nor copy-to)
    pub non_conref_copyto_targets: BTreeSet<String>,
    /// Code-sample payloads, consumed by their referrer only
    pub subsidiary_targets: BTreeSet<String>,
    /// References that ascend out of the input directory
    pub out_of_scope: BTreeSet<String>,
    /// Targets flagged processing-role="resource-only"
    pub resource_only: BTreeSet<String>,
    /// Subject-scheme files this document declares or references
    pub schemes: BTreeSet<String>,
    /// Subject hierarchy contributions (parent key to child keys)
    pub relationship: BTreeMap<String, BTreeSet<String>>,
    /// Anchor metadata accumulated for the export document
    pub export_anchors: String,
}

/// Traversal-side context handed to the scanner for each file.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext<'a> {
    /// The literal worklist path of the file being scanned
    pub current_path: &'a str,
    /// Directory of `current_path`, relative to the base input directory
    pub current_dir: Option<&'a str>,
    /// The root map, when the traversal started from one
    pub primary_map: Option<&'a str>,
    /// Transformation type identifier driving optional outputs
    pub transtype: &'a str,
    /// Whether grammar validation was requested
    pub validate: bool,
}

/// A source of per-file reference information.
///
/// The traversal engine is generic over this seam so tests can feed it
/// synthetic parse results; [`XmlScanner`] is the production implementation.
pub trait ReferenceScanner {
    /// Scan one document and report its references.
    fn scan(&mut self, file: &Path, ctx: &ScanContext<'_>) -> Result<ScanResult>;
}
