//! Closure resolution over a document map.
//!
//! [`resolve`] drives a worklist traversal from a root map, classifies every
//! file it can reach, resolves copy-to and conref indirection, rebases paths
//! onto a common root, and returns an immutable [`Manifest`] snapshot plus
//! the diagnostics gathered along the way.

mod conref;
mod copyto;
mod engine;
mod keydef;
mod scheme;
mod state;
pub mod uplevels;

pub use keydef::{KeyDef, KeyDefRecord, RewrittenKey, rewrite_key_entry};

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::scan::{ReferenceScanner, XmlScanner};

/// Configuration for one resolution run.
///
/// Every knob is an explicit field threaded through the traversal; nothing
/// is read from process-wide state.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Root map (or topic) path, absolute or relative to `base_dir`
    pub input: String,
    /// Project base directory used to absolutize relative inputs
    pub base_dir: String,
    /// Temporary output directory the manifest writer targets
    pub temp_dir: String,
    /// Optional filter-definition file
    pub filter_file: Option<String>,
    /// Transformation type identifier (drives optional outputs)
    pub transtype: String,
    /// Whether grammar validation was requested
    pub validate: bool,
    /// Whether the scanner may cache grammar pools between files
    pub grammar_cache: bool,
    /// Whether system identifiers should be emitted on output documents
    pub generate_system_ids: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            input: String::new(),
            base_dir: ".".to_string(),
            temp_dir: "temp".to_string(),
            filter_file: None,
            transtype: "xhtml".to_string(),
            validate: true,
            grammar_cache: true,
            generate_system_ids: true,
        }
    }
}

/// Severity of a recoverable anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable anomaly recorded during resolution.
///
/// Diagnostics never abort the run; they accompany the best-effort
/// manifest on the returned [`Resolution`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Diagnostic {
    /// Stable code, e.g. `DL065W`
    pub code: &'static str,
    pub severity: Severity,
    /// Rendered message including the offending path(s)
    pub message: String,
}

/// The immutable result snapshot of a resolution run.
///
/// Relative paths in the classification sets are still expressed against
/// the original base directory; the manifest writer applies [`prefix`]
/// (Self::prefix) when serializing, so the snapshot stays usable for both
/// prefixed and unprefixed consumers.
#[derive(Debug, Default, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Manifest {
    /// Base input directory after rebasing (walked up `uplevels` times)
    pub input_dir: String,
    /// Root file name, without prefix
    pub input_file: String,
    /// Directory chain from the rebased root down to the original base
    pub prefix: String,
    /// Maximum ascension depth observed across all references
    pub uplevels: usize,
    /// Transformation type the run was configured with
    pub transtype: String,

    /// All document files surviving refinement
    pub full_set: BTreeSet<String>,
    /// Topic files surviving refinement
    pub topic_set: BTreeSet<String>,
    /// Map files
    pub map_set: BTreeSet<String>,
    /// Topic files containing at least one href
    pub href_topic_set: BTreeSet<String>,
    /// Map files containing at least one href
    pub href_map_set: BTreeSet<String>,
    /// Files carrying conref inclusions
    pub conref_set: BTreeSet<String>,
    /// Files carrying keyed indirection
    pub keyref_set: BTreeSet<String>,
    /// Files referencing code-sample payloads
    pub coderef_set: BTreeSet<String>,
    /// Referenced images
    pub image_set: BTreeSet<String>,
    /// Flagging images from the filter file
    pub flag_image_set: BTreeSet<String>,
    /// Relative spellings of flagging images (output without rebasing)
    pub rel_flag_image_set: BTreeSet<String>,
    /// HTML and opaque resource targets
    pub html_set: BTreeSet<String>,
    /// Every href target
    pub href_target_set: BTreeSet<String>,
    /// Topics referenced with an element-id fragment
    pub href_with_id_set: BTreeSet<String>,
    /// Topics referenced under a chunk directive
    pub chunk_topic_set: BTreeSet<String>,
    /// Subject-scheme files
    pub scheme_set: BTreeSet<String>,
    /// Pure inclusion targets (after refinement)
    pub conref_target_set: BTreeSet<String>,
    /// Pure copy-to sources (after refinement)
    pub copyto_source_set: BTreeSet<String>,
    /// Copy-to sources rejected by duplicate-target conflicts
    pub ignored_copyto_source_set: BTreeSet<String>,
    /// Code-sample payloads
    pub subsidiary_set: BTreeSet<String>,
    /// Files pushing content via conaction
    pub conref_push_set: BTreeSet<String>,
    /// Targets flagged resource-only
    pub resource_only_set: BTreeSet<String>,
    /// References that ascend out of the input directory
    pub out_of_scope_set: BTreeSet<String>,

    /// Validated copy-to mappings, target to source
    pub copyto_map: BTreeMap<String, String>,
    /// Resolved key definitions, alias to target binding
    pub key_defs: BTreeMap<String, KeyDef>,
    /// Aliases whose target resolves outside the project
    pub external_keys: BTreeSet<String>,
    /// Key definitions discovered in scheme files, in traversal order
    pub scheme_keydefs: Vec<KeyDefRecord>,
    /// File to scheme-membership dictionary
    pub scheme_dictionary: BTreeMap<String, BTreeSet<String>>,
    /// Subject hierarchy graph
    pub relationship_graph: BTreeMap<String, BTreeSet<String>>,
    /// Accumulated export metadata
    pub export_anchors: String,
}

/// A completed resolution: the manifest plus everything that went wrong
/// along the way without stopping it.
#[derive(Debug, Default, Clone)]
pub struct Resolution {
    pub manifest: Manifest,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// Whether the run completed without any recoverable anomaly.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Resolve the reference closure of a root map.
///
/// # Example
///
/// ```no_run
/// use ditalist::resolve::{ResolveOptions, resolve};
///
/// let options = ResolveOptions {
///     input: "root.ditamap".to_string(),
///     base_dir: "docs".to_string(),
///     ..Default::default()
/// };
/// let resolution = resolve(&options)?;
/// println!("{} files", resolution.manifest.full_set.len());
/// # Ok::<(), ditalist::Error>(())
/// ```
pub fn resolve(options: &ResolveOptions) -> Result<Resolution> {
    resolve_with_scanner(options, XmlScanner::new())
}

/// Resolve using a caller-provided scanner implementation.
pub fn resolve_with_scanner<S: ReferenceScanner>(
    options: &ResolveOptions,
    scanner: S,
) -> Result<Resolution> {
    engine::TraversalEngine::new(options, scanner)?.run()
}
