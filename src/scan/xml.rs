//! Attribute scanner for DITA documents.
//!
//! Walks one document's element stream and records every outbound
//! reference: href, conref, keyref, copy-to, key declarations, subject
//! scheme links. Element roles are recognized through DITA class tokens
//! rather than element names, so specialized vocabularies are picked up
//! as well.

use std::path::Path;

use percent_encoding::percent_decode_str;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::scan::{ReferenceScanner, ScanContext, ScanResult};
use crate::util::{self, FileCategory};

/// Quick-xml backed [`ReferenceScanner`].
#[derive(Debug, Default)]
pub struct XmlScanner;

impl XmlScanner {
    pub fn new() -> Self {
        XmlScanner
    }

    /// Scan a document already held in memory.
    ///
    /// Useful for tests and for callers that manage file I/O themselves;
    /// [`ReferenceScanner::scan`] reads from disk and delegates here.
    pub fn scan_str(&self, content: &str, ctx: &ScanContext<'_>) -> Result<ScanResult> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut result = ScanResult::default();
        let mut root_seen = false;
        // One entry per open element; Some(key) for subject definitions.
        let mut subject_stack: Vec<Option<String>> = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let attrs = collect_attrs(&e)?;
                    if !root_seen {
                        root_seen = true;
                        classify_root(&attrs, ctx, &mut result);
                    }
                    let subject = process_element(&attrs, ctx, &mut result, &subject_stack);
                    subject_stack.push(subject);
                }
                Ok(Event::Empty(e)) => {
                    let attrs = collect_attrs(&e)?;
                    if !root_seen {
                        root_seen = true;
                        classify_root(&attrs, ctx, &mut result);
                    }
                    process_element(&attrs, ctx, &mut result, &subject_stack);
                }
                Ok(Event::End(_)) => {
                    subject_stack.pop();
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(Error::Xml(e)),
                _ => {}
            }
        }

        Ok(result)
    }
}

impl ReferenceScanner for XmlScanner {
    fn scan(&mut self, file: &Path, ctx: &ScanContext<'_>) -> Result<ScanResult> {
        let bytes = std::fs::read(file)?;
        let hint = util::extract_xml_encoding(&bytes).map(str::to_owned);
        let content = util::decode_text(&bytes, hint.as_deref());
        self.scan_str(&content, ctx)
    }
}

// ----------------------------------------------------------------------------
// Element handling
// ----------------------------------------------------------------------------

/// Attributes of interest on one element.
#[derive(Debug, Default)]
struct ElemAttrs {
    class: Option<String>,
    href: Option<String>,
    conref: Option<String>,
    keys: Option<String>,
    copy_to: Option<String>,
    format: Option<String>,
    scope: Option<String>,
    processing_role: Option<String>,
    chunk: Option<String>,
    id: Option<String>,
    has_keyref: bool,
    has_conaction: bool,
}

fn collect_attrs(e: &BytesStart) -> Result<ElemAttrs> {
    let mut attrs = ElemAttrs::default();
    for attr in e.attributes().flatten() {
        let value = || String::from_utf8(attr.value.to_vec());
        match attr.key.as_ref() {
            b"class" => attrs.class = Some(value()?),
            b"href" => attrs.href = Some(value()?),
            b"conref" => attrs.conref = Some(value()?),
            b"keys" => attrs.keys = Some(value()?),
            b"copy-to" => attrs.copy_to = Some(value()?),
            b"format" => attrs.format = Some(value()?),
            b"scope" => attrs.scope = Some(value()?),
            b"processing-role" => attrs.processing_role = Some(value()?),
            b"chunk" => attrs.chunk = Some(value()?),
            b"id" => attrs.id = Some(value()?),
            b"keyref" | b"conkeyref" => attrs.has_keyref = true,
            b"conaction" => attrs.has_conaction = true,
            _ => {}
        }
    }
    Ok(attrs)
}

fn classify_root(attrs: &ElemAttrs, ctx: &ScanContext<'_>, result: &mut ScanResult) {
    let class = attrs.class.as_deref();
    result.flags.is_topic = class_matches(class, "topic/topic");
    result.flags.is_map = class_matches(class, "map/map");
    result.valid = result.flags.is_topic || result.flags.is_map;

    if class_matches(class, "subjectScheme/subjectScheme") {
        result
            .schemes
            .insert(util::remove_redundant_names(ctx.current_path));
    }
}

/// Process one element; returns the subject key it opens, if any.
fn process_element(
    attrs: &ElemAttrs,
    ctx: &ScanContext<'_>,
    result: &mut ScanResult,
    subject_stack: &[Option<String>],
) -> Option<String> {
    let class = attrs.class.as_deref();

    if attrs.conref.is_some() {
        result.flags.has_conref = true;
    }
    if attrs.has_keyref {
        result.flags.has_keyref = true;
    }
    if attrs.has_conaction {
        result.flags.has_conaction = true;
    }

    // Inclusion target: traversed, but a candidate for removal later.
    if let Some(conref) = attrs.conref.as_deref() {
        let (file, _fragment) = split_fragment(conref);
        if !file.is_empty() && !is_external(attrs.scope.as_deref(), file) {
            let target = resolve_ref(ctx.current_dir, file, &mut result.out_of_scope);
            result.conref_targets.insert(target.clone());
            push_ref(&mut result.non_copyto_refs, target);
        }
    }

    // Code-sample payload: consumed by the referrer, never traversed.
    if class_matches(class, "pr-d/coderef") {
        result.flags.has_coderef = true;
        if let Some(href) = attrs.href.as_deref()
            && !is_external(attrs.scope.as_deref(), href)
        {
            let (file, _) = split_fragment(href);
            if !file.is_empty() {
                let target = resolve_ref(ctx.current_dir, file, &mut result.out_of_scope);
                result.subsidiary_targets.insert(target.clone());
                push_ref(&mut result.non_copyto_refs, target);
            }
        }
        return None;
    }

    // Image reference: recorded for classification, no role flags.
    if class_matches(class, "topic/image") {
        if let Some(href) = attrs.href.as_deref()
            && !is_external(attrs.scope.as_deref(), href)
        {
            let (file, _) = split_fragment(href);
            if !file.is_empty() {
                let target = resolve_ref(ctx.current_dir, file, &mut result.out_of_scope);
                push_ref(&mut result.non_copyto_refs, target);
            }
        }
        return None;
    }

    // Subject scheme membership propagates through schemeref links.
    if class_matches(class, "subjectScheme/schemeref")
        && let Some(href) = attrs.href.as_deref()
        && !is_external(attrs.scope.as_deref(), href)
    {
        let (file, _) = split_fragment(href);
        if !file.is_empty() {
            let target = resolve_ref(ctx.current_dir, file, &mut result.out_of_scope);
            result.schemes.insert(target.clone());
            push_ref(&mut result.non_copyto_refs, target);
        }
    }

    // Subject hierarchy for the relationship graph.
    let mut opened_subject = None;
    if class_matches(class, "subjectScheme/subjectdef")
        && let Some(keys) = attrs.keys.as_deref()
        && let Some(key) = keys.split_whitespace().next()
    {
        let parent = subject_stack
            .iter()
            .rev()
            .find_map(|s| s.as_deref())
            .unwrap_or("ROOT");
        result
            .relationship
            .entry(parent.to_string())
            .or_default()
            .insert(key.to_string());
        opened_subject = Some(key.to_string());
    }

    // Anchor metadata for the export document.
    if class_matches(class, "map/anchor")
        && let Some(id) = attrs.id.as_deref()
    {
        result.export_anchors.push_str(&format!(
            "<file name=\"{}\"><anchorid name=\"{}\"/></file>",
            ctx.current_path, id
        ));
    }

    let external = attrs
        .href
        .as_deref()
        .is_some_and(|href| is_external(attrs.scope.as_deref(), href));

    // Key declarations bind aliases to whatever the element points at.
    if let Some(keys) = attrs.keys.as_deref()
        && class_matches(class, "map/topicref")
    {
        let target = match attrs.href.as_deref() {
            Some(href) if external => href.to_string(),
            Some(href) => resolve_keeping_fragment(ctx.current_dir, href, &mut result.out_of_scope),
            None => String::new(),
        };
        if external {
            for alias in keys.split_whitespace() {
                result.external_key_names.insert(alias.to_string());
            }
        }
        result.key_defs.push((keys.to_string(), target));
    }

    // Ordinary document reference.
    if let Some(href) = attrs.href.as_deref()
        && !external
        && (class_matches(class, "map/topicref")
            || class_matches(class, "topic/xref")
            || class_matches(class, "topic/link"))
    {
        let (file, fragment) = split_fragment(href);
        if !file.is_empty() {
            result.flags.has_href = true;
            let target = resolve_ref(ctx.current_dir, file, &mut result.out_of_scope);
            result.href_targets.insert(target.clone());

            if fragment.is_some_and(|f| !f.is_empty())
                && FileCategory::of(&target) == FileCategory::Topic
            {
                result.href_topic_targets.insert(target.clone());
            }
            if attrs.chunk.as_deref().is_some_and(|c| c.contains("to-content")) {
                result.chunk_topics.insert(target.clone());
            }
            if attrs
                .processing_role
                .as_deref()
                .is_some_and(|r| r == "resource-only")
            {
                result.resource_only.insert(target.clone());
            }

            // Copy-with-rename: the source is traversed, the synthesized
            // target only enters the copy-to table.
            if let Some(copy_to) = attrs.copy_to.as_deref() {
                let copy_target = resolve_ref(ctx.current_dir, copy_to, &mut result.out_of_scope);
                if result.copyto.iter().any(|(t, _)| t == &copy_target) {
                    log::warn!(
                        "[DL065W] duplicate copy-to target {copy_target}; source {target} ignored"
                    );
                    result.ignored_copyto_sources.insert(target.clone());
                } else {
                    result.copyto.push((copy_target, target.clone()));
                }
            } else if attrs.conref.is_none() {
                result.non_conref_copyto_targets.insert(target.clone());
            }

            let tagged = match attrs.format.as_deref() {
                Some(format) if format != "dita" && format != "ditamap" => {
                    format!("{target}|{format}")
                }
                _ => target,
            };
            push_ref(&mut result.non_copyto_refs, tagged);
        }
    }

    opened_subject
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Check a DITA class attribute for a vocabulary token.
fn class_matches(class: Option<&str>, token: &str) -> bool {
    class.is_some_and(|c| c.split_ascii_whitespace().any(|t| t == token))
}

/// Split an href into file part and optional fragment.
fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((file, fragment)) => (file, Some(fragment)),
        None => (href, None),
    }
}

/// Check whether a reference leaves the project entirely.
fn is_external(scope: Option<&str>, href: &str) -> bool {
    if matches!(scope, Some("external") | Some("peer")) {
        return true;
    }
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with("ftp://")
        || href.starts_with("mailto:")
}

/// Rebase a reference against the referring file's directory.
///
/// Percent-escapes are decoded, separators normalized, and redundant
/// segments removed, so the returned path is in worklist canonical form.
/// Paths that still ascend out of the base directory are recorded as
/// out of scope.
fn resolve_ref(
    current_dir: Option<&str>,
    value: &str,
    out_of_scope: &mut std::collections::BTreeSet<String>,
) -> String {
    let decoded = match percent_decode_str(value).decode_utf8() {
        Ok(s) => s.into_owned(),
        Err(_) => value.to_string(),
    };

    let resolved = if util::is_absolute(&decoded) {
        util::remove_redundant_names(&decoded)
    } else {
        match current_dir {
            Some(dir) if !dir.is_empty() => {
                util::remove_redundant_names(&format!("{dir}/{decoded}"))
            }
            _ => util::remove_redundant_names(&decoded),
        }
    };

    if !util::is_absolute(&resolved) && resolved.starts_with("../") {
        out_of_scope.insert(resolved.clone());
    }
    resolved
}

/// Like [`resolve_ref`] but keeps an element-id fragment attached.
fn resolve_keeping_fragment(
    current_dir: Option<&str>,
    href: &str,
    out_of_scope: &mut std::collections::BTreeSet<String>,
) -> String {
    let (file, fragment) = split_fragment(href);
    if file.is_empty() {
        return href.to_string();
    }
    let resolved = resolve_ref(current_dir, file, out_of_scope);
    match fragment {
        Some(f) => format!("{resolved}#{f}"),
        None => resolved,
    }
}

/// Ordered insert preserving first-occurrence order.
fn push_ref(refs: &mut Vec<String>, target: String) {
    if !refs.contains(&target) {
        refs.push(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> ScanContext<'a> {
        ScanContext {
            current_path: "root.ditamap",
            current_dir: None,
            primary_map: Some("root.ditamap"),
            transtype: "xhtml",
            validate: true,
        }
    }

    #[test]
    fn test_scan_simple_map() {
        let map = r#"<?xml version="1.0"?>
<map class="- map/map ">
  <topicref class="- map/topicref " href="t1.dita"/>
  <topicref class="- map/topicref " href="sub/t2.dita"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert!(result.valid);
        assert!(result.flags.is_map);
        assert!(!result.flags.is_topic);
        assert!(result.flags.has_href);
        assert_eq!(result.non_copyto_refs, vec!["t1.dita", "sub/t2.dita"]);
        assert!(result.href_targets.contains("t1.dita"));
        assert!(result.non_conref_copyto_targets.contains("sub/t2.dita"));
    }

    #[test]
    fn test_scan_rebases_against_current_dir() {
        let topic = r#"<topic class="- topic/topic " id="t">
  <body class="- topic/body ">
    <xref class="- topic/xref " href="other.dita"/>
    <image class="- topic/image " href="../img/pic.png"/>
  </body>
</topic>"#;

        let ctx = ScanContext {
            current_path: "sub/t.dita",
            current_dir: Some("sub"),
            primary_map: Some("root.ditamap"),
            transtype: "xhtml",
            validate: true,
        };
        let result = XmlScanner::new().scan_str(topic, &ctx).unwrap();
        assert!(result.flags.is_topic);
        assert_eq!(result.non_copyto_refs, vec!["sub/other.dita", "img/pic.png"]);
    }

    #[test]
    fn test_scan_conref_and_copyto() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " href="t2.dita" copy-to="t3.dita"/>
  <topicref class="- map/topicref " conref="c.dita#c/p" href="t1.dita"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert!(result.flags.has_conref);
        assert_eq!(result.copyto, vec![("t3.dita".to_string(), "t2.dita".to_string())]);
        assert!(result.conref_targets.contains("c.dita"));
        // The copy-to source is not an independent output target
        assert!(!result.non_conref_copyto_targets.contains("t2.dita"));
        assert!(result.non_conref_copyto_targets.contains("t1.dita"));
    }

    #[test]
    fn test_scan_duplicate_copyto_within_file() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " href="a.dita" copy-to="out.dita"/>
  <topicref class="- map/topicref " href="b.dita" copy-to="out.dita"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert_eq!(result.copyto, vec![("out.dita".to_string(), "a.dita".to_string())]);
        assert!(result.ignored_copyto_sources.contains("b.dita"));
    }

    #[test]
    fn test_scan_key_definitions() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " keys="alpha beta" href="topics/a.dita"/>
  <topicref class="- map/topicref " keys="ext" href="http://example.com/x" scope="external"/>
  <topicref class="- map/topicref " keys="bare"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert_eq!(result.key_defs.len(), 3);
        assert_eq!(result.key_defs[0], ("alpha beta".into(), "topics/a.dita".into()));
        assert_eq!(result.key_defs[1], ("ext".into(), "http://example.com/x".into()));
        assert_eq!(result.key_defs[2], ("bare".into(), String::new()));
        assert!(result.external_key_names.contains("ext"));
        assert!(!result.external_key_names.contains("alpha"));
        // External targets never enter the traversal set
        assert_eq!(result.non_copyto_refs, vec!["topics/a.dita"]);
    }

    #[test]
    fn test_scan_format_tag() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " href="notes.xml" format="html"/>
  <topicref class="- map/topicref " href="nested.ditamap" format="ditamap"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert_eq!(result.non_copyto_refs, vec!["notes.xml|html", "nested.ditamap"]);
    }

    #[test]
    fn test_scan_coderef_is_subsidiary() {
        let topic = r#"<topic class="- topic/topic " id="t">
  <body class="- topic/body ">
    <coderef class="+ topic/xref pr-d/coderef " href="sample.py"/>
  </body>
</topic>"#;

        let result = XmlScanner::new().scan_str(topic, &ctx()).unwrap();
        assert!(result.flags.has_coderef);
        assert!(result.subsidiary_targets.contains("sample.py"));
        assert_eq!(result.non_copyto_refs, vec!["sample.py"]);
    }

    #[test]
    fn test_scan_subject_scheme() {
        let scheme = r#"<subjectScheme class="- map/map subjectScheme/subjectScheme ">
  <subjectdef class="- map/topicref subjectScheme/subjectdef " keys="os">
    <subjectdef class="- map/topicref subjectScheme/subjectdef " keys="linux"/>
    <subjectdef class="- map/topicref subjectScheme/subjectdef " keys="windows"/>
  </subjectdef>
</subjectScheme>"#;

        let ctx = ScanContext {
            current_path: "scheme.ditamap",
            current_dir: None,
            primary_map: None,
            transtype: "xhtml",
            validate: true,
        };
        let result = XmlScanner::new().scan_str(scheme, &ctx).unwrap();
        assert!(result.schemes.contains("scheme.ditamap"));
        assert_eq!(
            result.relationship.get("ROOT"),
            Some(&["os".to_string()].into_iter().collect())
        );
        assert_eq!(
            result.relationship.get("os"),
            Some(&["linux".to_string(), "windows".to_string()].into_iter().collect())
        );
    }

    #[test]
    fn test_scan_invalid_document() {
        let other = r#"<config><entry key="a"/></config>"#;
        let result = XmlScanner::new().scan_str(other, &ctx()).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn test_scan_percent_encoded_href() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " href="my%20topic.dita"/>
</map>"#;

        let result = XmlScanner::new().scan_str(map, &ctx()).unwrap();
        assert_eq!(result.non_copyto_refs, vec!["my topic.dita"]);
    }
}
