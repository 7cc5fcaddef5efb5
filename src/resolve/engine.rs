//! Worklist-driven closure traversal.
//!
//! Files are processed strictly in FIFO discovery order. Ordering is
//! load-bearing: copy-to and key-definition conflicts resolve in favor of
//! the first registration, and that "first" is defined by traversal order.

use std::path::Path;

use crate::error::{Error, Result};
use crate::resolve::state::ResolutionState;
use crate::resolve::{Manifest, ResolveOptions, Resolution, conref, copyto, keydef, scheme, uplevels};
use crate::scan::{ReferenceScanner, ScanContext, ScanResult, read_filter_file};
use crate::util::{self, FileCategory};

pub(crate) struct TraversalEngine<'a, S: ReferenceScanner> {
    options: &'a ResolveOptions,
    scanner: S,
    state: ResolutionState,
    /// Absolute directory containing the root file
    base_input_dir: String,
    /// Absolute, normalized root file path
    root_file: String,
    /// Root file name; also its worklist spelling
    input_file: String,
    primary_map: Option<String>,
}

impl<'a, S: ReferenceScanner> TraversalEngine<'a, S> {
    pub fn new(options: &'a ResolveOptions, scanner: S) -> Result<Self> {
        let root_file = absolutize(&options.base_dir, &options.input)?;
        let (base_input_dir, input_file) = match root_file.rfind('/') {
            Some(i) => (root_file[..i].to_string(), root_file[i + 1..].to_string()),
            None => {
                return Err(Error::InvalidInput(format!(
                    "input file {root_file} has no parent directory"
                )));
            }
        };
        let primary_map = (FileCategory::of(&input_file) == FileCategory::Map)
            .then(|| input_file.clone());

        Ok(TraversalEngine {
            options,
            scanner,
            state: ResolutionState::default(),
            base_input_dir,
            root_file,
            input_file,
            primary_map,
        })
    }

    pub fn run(mut self) -> Result<Resolution> {
        if let Some(filter) = &self.options.filter_file {
            match read_filter_file(Path::new(filter)) {
                Ok(images) => {
                    self.state.flag_image_set.extend(images.flag_images);
                    self.state.rel_flag_image_set.extend(images.rel_flag_images);
                }
                Err(err) => {
                    self.state
                        .warn("DL013E", format!("failed to read filter file {filter}: {err}"));
                }
            }
        }

        let first = self.input_file.clone();
        self.state.add_to_wait_list(&first);
        while let Some(current) = self.state.wait_list.pop_front() {
            self.process_file(&current)?;
        }

        // Rebasing has to wait for the full closure: the ascension maximum
        // is unknowable until the last file is scanned.
        let (input_dir, prefix) = uplevels::rebase(&self.base_input_dir, self.state.uplevels);
        conref::refine(&mut self.state);
        copyto::refine(&mut self.state, &input_dir, &prefix);

        Ok(self.into_resolution(input_dir, prefix))
    }

    fn process_file(&mut self, current: &str) -> Result<()> {
        let (file_to_parse, current_rel) = if util::is_absolute(current) {
            (
                current.to_string(),
                util::relative_path_from(&self.root_file, current),
            )
        } else {
            (format!("{}/{}", self.base_input_dir, current), current.to_string())
        };
        log::info!("Processing {file_to_parse}");

        let mut scanned: Option<ScanResult> = None;
        if FileCategory::of(&current_rel).is_valid_target() {
            let current_dir = current_rel.rfind('/').map(|i| current_rel[..i].to_string());
            let ctx = ScanContext {
                current_path: &current_rel,
                current_dir: current_dir.as_deref(),
                primary_map: self.primary_map.as_deref(),
                transtype: &self.options.transtype,
                validate: self.options.validate,
            };
            match self.scanner.scan(Path::new(&file_to_parse), &ctx) {
                Ok(result) => scanned = Some(result),
                Err(err) => {
                    if current_rel == self.input_file {
                        return Err(Error::RootParse {
                            path: current_rel,
                            detail: err.to_string(),
                        });
                    }
                    self.state.error(
                        "DL013E",
                        format!("failed to parse referenced file {current_rel}: {err}"),
                    );
                }
            }
        } else {
            self.state.warn(
                "DL053W",
                format!("{current_rel} is not a valid DITA file name; treated as an opaque resource"),
            );
        }

        match &scanned {
            Some(result) if result.valid => {
                self.process_parse_result(&current_rel, result);
                self.categorize_current(&current_rel, result);
            }
            Some(_) if current_rel != self.input_file => {
                self.state.warn(
                    "DL021W",
                    format!("{current_rel} is not a valid reference target; skipped"),
                );
            }
            _ => {}
        }

        if current_rel == self.input_file && !scanned.as_ref().is_some_and(|r| r.valid) {
            return Err(if self.options.validate {
                Error::RootFiltered(current_rel)
            } else {
                Error::RootInvalid(current_rel)
            });
        }

        // An absolute worklist entry is re-expressed relatively above;
        // remember both spellings so neither can re-enter the queue.
        self.state.mark_seen(&current_rel);
        Ok(())
    }

    fn process_parse_result(&mut self, current: &str, result: &ScanResult) {
        // Subsidiary payloads must be known before categorization so they
        // never reach the worklist, not even from their own referrer.
        self.state
            .subsidiary_set
            .extend(result.subsidiary_targets.iter().cloned());

        for reference in &result.non_copyto_refs {
            self.categorize_result(reference);
            self.state.update_uplevels(reference);
        }

        // First registration per copy-to target wins across the whole run.
        for (target, source) in &result.copyto {
            if let Some(existing) = self.state.copyto_map.get(target) {
                self.state.warn(
                    "DL065W",
                    format!(
                        "duplicate copy-to target {target}: keeping {existing}, ignoring {source}"
                    ),
                );
                self.state.ignored_copyto_source_set.insert(source.clone());
            } else {
                self.state.update_uplevels(target);
                self.state.copyto_map.insert(target.clone(), source.clone());
            }
        }

        self.state.scheme_set.extend(result.schemes.iter().cloned());

        let is_scheme_file = self.state.scheme_set.contains(current);
        for (keys_attr, href) in &result.key_defs {
            keydef::bind_aliases(&mut self.state.key_defs, keys_attr, href, current);
            if is_scheme_file {
                for alias in keys_attr.split_whitespace() {
                    self.state.scheme_keydefs.push(keydef::KeyDefRecord {
                        keys: alias.to_string(),
                        href: href.clone(),
                        source: current.to_string(),
                    });
                }
            }
        }
        self.state
            .external_keys
            .extend(result.external_key_names.iter().cloned());

        self.state
            .href_target_set
            .extend(result.href_targets.iter().cloned());
        self.state
            .href_with_id_set
            .extend(result.href_topic_targets.iter().cloned());
        self.state
            .chunk_topic_set
            .extend(result.chunk_topics.iter().cloned());
        self.state
            .conref_target_set
            .extend(result.conref_targets.iter().cloned());
        self.state
            .non_conref_copyto_target_set
            .extend(result.non_conref_copyto_targets.iter().cloned());
        self.state
            .ignored_copyto_source_set
            .extend(result.ignored_copyto_sources.iter().cloned());
        self.state
            .out_of_scope_set
            .extend(result.out_of_scope.iter().cloned());
        self.state
            .resource_only_set
            .extend(result.resource_only.iter().cloned());

        scheme::propagate(
            &mut self.state.scheme_dictionary,
            current,
            &result.schemes,
            &result.href_targets,
        );
        for (parent, children) in &result.relationship {
            self.state
                .relationship_graph
                .entry(parent.clone())
                .or_default()
                .extend(children.iter().cloned());
        }
        self.state.export_anchors.push_str(&result.export_anchors);
    }

    /// Place one scanned file into its per-file classification sets.
    fn categorize_current(&mut self, current: &str, result: &ScanResult) {
        self.state.dita_set.insert(current.to_string());

        let category = FileCategory::of(current);
        if category == FileCategory::Topic {
            self.state.href_target_set.insert(current.to_string());
        }

        if result.flags.has_conaction {
            self.state.conref_push_set.insert(current.to_string());
        }
        if result.flags.has_conref {
            self.state.conref_set.insert(current.to_string());
        }
        if result.flags.has_keyref {
            self.state.keyref_set.insert(current.to_string());
        }
        if result.flags.has_coderef {
            self.state.coderef_set.insert(current.to_string());
        }

        match category {
            FileCategory::Topic => {
                self.state.full_topic_set.insert(current.to_string());
                if result.flags.has_href {
                    self.state.href_topic_set.insert(current.to_string());
                }
            }
            FileCategory::Map => {
                self.state.full_map_set.insert(current.to_string());
                if result.flags.has_href {
                    self.state.href_map_set.insert(current.to_string());
                }
            }
            _ => {}
        }
    }

    /// Place one discovered reference target: enqueue documents, classify
    /// everything else by extension.
    fn categorize_result(&mut self, reference: &str) {
        let (path, format) = util::split_format_tag(reference);

        // Code-sample payloads are consumed by their referrer and never
        // traversed or classified on their own.
        if self.state.subsidiary_set.contains(path) {
            return;
        }

        let category = FileCategory::of(path);
        let document_format = format.is_none_or(|f| f == "dita" || f == "ditamap");

        match category {
            FileCategory::Image => {
                self.state.image_set.insert(path.to_string());
            }
            FileCategory::Topic | FileCategory::Map if document_format => {
                self.state.add_to_wait_list(path);
            }
            FileCategory::Other if document_format => {
                self.state.warn(
                    "DL053W",
                    format!("{path} is not a DITA file name; treated as an opaque resource"),
                );
                self.state.html_set.insert(path.to_string());
            }
            _ => {
                self.state.html_set.insert(path.to_string());
            }
        }
    }

    fn into_resolution(self, input_dir: String, prefix: String) -> Resolution {
        let state = self.state;
        let manifest = Manifest {
            input_dir,
            input_file: self.input_file,
            prefix,
            uplevels: state.uplevels,
            transtype: self.options.transtype.clone(),

            full_set: state.dita_set,
            topic_set: state.full_topic_set,
            map_set: state.full_map_set,
            href_topic_set: state.href_topic_set,
            href_map_set: state.href_map_set,
            conref_set: state.conref_set,
            keyref_set: state.keyref_set,
            coderef_set: state.coderef_set,
            image_set: state.image_set,
            flag_image_set: state.flag_image_set,
            rel_flag_image_set: state.rel_flag_image_set,
            html_set: state.html_set,
            href_target_set: state.href_target_set,
            href_with_id_set: state.href_with_id_set,
            chunk_topic_set: state.chunk_topic_set,
            scheme_set: state.scheme_set,
            conref_target_set: state.conref_target_set,
            copyto_source_set: state.copyto_source_set,
            ignored_copyto_source_set: state.ignored_copyto_source_set,
            subsidiary_set: state.subsidiary_set,
            conref_push_set: state.conref_push_set,
            resource_only_set: state.resource_only_set,
            out_of_scope_set: state.out_of_scope_set,

            copyto_map: state.copyto_map,
            key_defs: state.key_defs,
            external_keys: state.external_keys,
            scheme_keydefs: state.scheme_keydefs,
            scheme_dictionary: state.scheme_dictionary,
            relationship_graph: state.relationship_graph,
            export_anchors: state.export_anchors,
        };

        Resolution {
            manifest,
            diagnostics: state.diagnostics,
        }
    }
}

fn absolutize(base_dir: &str, input: &str) -> Result<String> {
    let input = util::to_unix_seps(input);
    if util::is_absolute(&input) {
        return Ok(util::remove_redundant_names(&input));
    }

    let base = util::to_unix_seps(base_dir);
    let base = if util::is_absolute(&base) {
        base
    } else {
        let cwd = std::env::current_dir()?;
        util::remove_redundant_names(&format!(
            "{}/{}",
            util::to_unix_seps(&cwd.to_string_lossy()),
            base
        ))
    };
    Ok(util::remove_redundant_names(&format!("{base}/{input}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::resolve_with_scanner;
    use std::collections::HashMap;

    /// Scanner fed from a canned table, keyed by worklist path.
    struct TableScanner {
        files: HashMap<String, ScanResult>,
    }

    impl ReferenceScanner for TableScanner {
        fn scan(&mut self, _file: &Path, ctx: &ScanContext<'_>) -> Result<ScanResult> {
            self.files
                .get(ctx.current_path)
                .cloned()
                .ok_or_else(|| Error::InvalidInput(format!("no such file {}", ctx.current_path)))
        }
    }

    fn doc(refs: &[&str]) -> ScanResult {
        ScanResult {
            valid: true,
            non_copyto_refs: refs.iter().map(|s| s.to_string()).collect(),
            ..ScanResult::default()
        }
    }

    fn options() -> ResolveOptions {
        ResolveOptions {
            input: "/project/docs/root.ditamap".to_string(),
            base_dir: "/project".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        let mut files = HashMap::new();
        files.insert("root.ditamap".to_string(), doc(&["a.dita", "b.dita"]));
        files.insert("a.dita".to_string(), doc(&["b.dita", "a.dita"]));
        files.insert("b.dita".to_string(), doc(&["a.dita", "root.ditamap"]));

        let resolution = resolve_with_scanner(&options(), TableScanner { files }).unwrap();
        assert_eq!(
            resolution.manifest.full_set,
            ["root.ditamap", "a.dita", "b.dita"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        );
    }

    #[test]
    fn test_root_scan_failure_is_fatal() {
        let files = HashMap::new();
        let err = resolve_with_scanner(&options(), TableScanner { files }).unwrap_err();
        assert!(matches!(err, Error::RootParse { .. }));
    }

    #[test]
    fn test_nonroot_scan_failure_is_recoverable() {
        let mut files = HashMap::new();
        files.insert("root.ditamap".to_string(), doc(&["a.dita", "gone.dita"]));
        files.insert("a.dita".to_string(), doc(&[]));

        let resolution = resolve_with_scanner(&options(), TableScanner { files }).unwrap();
        assert!(resolution.manifest.full_set.contains("a.dita"));
        assert!(!resolution.manifest.full_set.contains("gone.dita"));
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(resolution.diagnostics[0].code, "DL013E");
    }

    #[test]
    fn test_invalid_root_is_fatal() {
        let mut files = HashMap::new();
        files.insert(
            "root.ditamap".to_string(),
            ScanResult {
                valid: false,
                ..ScanResult::default()
            },
        );

        let err = resolve_with_scanner(&options(), TableScanner { files }).unwrap_err();
        assert!(matches!(err, Error::RootFiltered(_)));

        let mut opts = options();
        opts.validate = false;
        let mut files = HashMap::new();
        files.insert(
            "root.ditamap".to_string(),
            ScanResult {
                valid: false,
                ..ScanResult::default()
            },
        );
        let err = resolve_with_scanner(&opts, TableScanner { files }).unwrap_err();
        assert!(matches!(err, Error::RootInvalid(_)));
    }

    #[test]
    fn test_duplicate_copyto_across_files() {
        let mut root = doc(&["m2.ditamap", "t2.dita"]);
        root.copyto.push(("t3.dita".to_string(), "t2.dita".to_string()));
        let mut second = doc(&["t4.dita"]);
        second.copyto.push(("t3.dita".to_string(), "t4.dita".to_string()));

        let mut files = HashMap::new();
        files.insert("root.ditamap".to_string(), root);
        files.insert("m2.ditamap".to_string(), second);
        files.insert("t2.dita".to_string(), doc(&[]));
        files.insert("t4.dita".to_string(), doc(&[]));

        let resolution = resolve_with_scanner(&options(), TableScanner { files }).unwrap();
        // Disk validation drops the mapping (no real file), but the
        // conflict itself resolved first-wins and was reported.
        assert!(
            resolution
                .manifest
                .ignored_copyto_source_set
                .contains("t4.dita")
        );
        let dup: Vec<_> = resolution
            .diagnostics
            .iter()
            .filter(|d| d.code == "DL065W")
            .collect();
        assert_eq!(dup.len(), 1);
        assert!(dup[0].message.contains("t2.dita"));
        assert!(dup[0].message.contains("t4.dita"));
    }

    #[test]
    fn test_key_definition_first_wins() {
        let mut root = doc(&["m2.ditamap"]);
        root.key_defs.push(("k".to_string(), "one.dita".to_string()));
        let mut second = doc(&[]);
        second.key_defs.push(("k".to_string(), "two.dita".to_string()));

        let mut files = HashMap::new();
        files.insert("root.ditamap".to_string(), root);
        files.insert("m2.ditamap".to_string(), second);

        let resolution = resolve_with_scanner(&options(), TableScanner { files }).unwrap();
        assert_eq!(resolution.manifest.key_defs["k"].href, "one.dita");
        assert_eq!(resolution.manifest.key_defs["k"].source, "root.ditamap");
        // Silent drop: no diagnostic for duplicate keys
        assert!(resolution.diagnostics.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn node_name(i: usize) -> String {
            if i == 0 {
                "root.ditamap".to_string()
            } else {
                format!("t{i}.dita")
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            /// Any finite reference graph, cycles and self-references
            /// included, drains the worklist and visits each literal
            /// path at most once.
            #[test]
            fn prop_traversal_terminates(
                edges in prop::collection::vec((0usize..12, 0usize..12), 0..48)
            ) {
                let mut adjacency: HashMap<usize, Vec<String>> = HashMap::new();
                for (from, to) in &edges {
                    adjacency.entry(*from).or_default().push(node_name(*to));
                }

                let mut files = HashMap::new();
                for i in 0..12 {
                    let refs: Vec<&str> = adjacency
                        .get(&i)
                        .map(|targets| targets.iter().map(String::as_str).collect())
                        .unwrap_or_default();
                    files.insert(node_name(i), doc(&refs));
                }

                let resolution =
                    resolve_with_scanner(&options(), TableScanner { files }).unwrap();
                prop_assert!(resolution.manifest.full_set.len() <= 12);
                prop_assert!(resolution.manifest.full_set.contains("root.ditamap"));
                prop_assert_eq!(resolution.manifest.uplevels, 0);
            }
        }
    }

    #[test]
    fn test_uplevels_span_whole_closure() {
        let mut files = HashMap::new();
        files.insert("root.ditamap".to_string(), doc(&["../shared/a.dita"]));
        files.insert("../shared/a.dita".to_string(), doc(&["../../common/b.dita"]));
        files.insert("../../common/b.dita".to_string(), doc(&[]));

        let resolution = resolve_with_scanner(&options(), TableScanner { files }).unwrap();
        assert_eq!(resolution.manifest.uplevels, 2);
        assert_eq!(resolution.manifest.prefix, "project/docs/");
        assert_eq!(resolution.manifest.input_dir, "/");
    }
}
