//! Scoped key-subtree capture.
//!
//! Given a map and a set of key names that are actually referenced, this
//! pass re-reads the map and captures the serialized XML subtree of every
//! key-defining element whose name matches. The capture is independent of
//! the closure traversal: it runs over a pull-event stream with an explicit
//! frame stack, one frame per active key definition.
//!
//! Nesting rules: a definition's captured text includes everything nested
//! inside it, including nested definitions; a nested definition's own frame
//! captures only from its point of activation. Well-formed input guarantees
//! frames pop in the right order, so each frame needs nothing more than a
//! depth counter.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};
use crate::util;

/// One active capture: the definition's aliases, its buffer, and how many
/// unclosed elements it still contains.
struct CaptureFrame {
    aliases: Vec<String>,
    buffer: String,
    depth: usize,
}

/// Capture serialized subtrees for every key definition in `content`
/// whose key names intersect `keys`.
///
/// The returned table binds each alias of a matched definition, including
/// aliases that were not themselves in the target set, to the serialized
/// element text.
pub fn capture_key_subtrees(
    content: &str,
    keys: &BTreeSet<String>,
) -> Result<BTreeMap<String, String>> {
    let mut reader = Reader::from_str(content);

    let mut table: BTreeMap<String, String> = BTreeMap::new();
    let mut frames: Vec<CaptureFrame> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                open_element(&e, keys, &mut frames)?;
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                open_element(&e, keys, &mut frames)?;
                close_element(&name, &mut frames, &mut table);
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8(e.name().as_ref().to_vec())?;
                close_element(&name, &mut frames, &mut table);
            }
            Ok(Event::Text(e)) => {
                if !frames.is_empty() {
                    let raw = String::from_utf8_lossy(e.as_ref());
                    append_all(&mut frames, &escape_xml(&raw));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if !frames.is_empty() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let text = match resolve_entity(&entity) {
                        Some(resolved) => escape_xml(&resolved),
                        None => format!("&{entity};"),
                    };
                    append_all(&mut frames, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(table)
}

/// Capture key subtrees from a map file on disk.
pub fn capture_key_subtrees_from_file(
    path: &Path,
    keys: &BTreeSet<String>,
) -> Result<BTreeMap<String, String>> {
    let bytes = std::fs::read(path)?;
    let hint = util::extract_xml_encoding(&bytes).map(str::to_owned);
    let content = util::decode_text(&bytes, hint.as_deref());
    capture_key_subtrees(&content, keys)
}

fn open_element(
    e: &BytesStart,
    keys: &BTreeSet<String>,
    frames: &mut Vec<CaptureFrame>,
) -> Result<()> {
    let mut class: Option<String> = None;
    let mut key_names: Option<String> = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"class" => class = Some(String::from_utf8(attr.value.to_vec())?),
            b"keys" => key_names = Some(String::from_utf8(attr.value.to_vec())?),
            _ => {}
        }
    }

    let is_definition = key_names.as_deref().is_some_and(|names| {
        class
            .as_deref()
            .is_some_and(|c| c.split_ascii_whitespace().any(|t| t == "map/topicref"))
            && names.split_whitespace().any(|name| keys.contains(name))
    });

    if is_definition {
        // A new definition starts its own frame; the opening tag is still
        // appended to every already-active frame below.
        frames.push(CaptureFrame {
            aliases: key_names
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            buffer: String::new(),
            depth: 0,
        });
    } else if frames.is_empty() {
        return Ok(());
    }

    if let Some(frame) = frames.last_mut() {
        frame.depth += 1;
    }
    let tag = serialize_open_tag(e)?;
    append_all(frames, &tag);
    Ok(())
}

fn close_element(
    name: &str,
    frames: &mut Vec<CaptureFrame>,
    table: &mut BTreeMap<String, String>,
) {
    if frames.is_empty() {
        return;
    }

    append_all(frames, &format!("</{name}>"));
    let completed = match frames.last_mut() {
        Some(frame) => {
            frame.depth -= 1;
            frame.depth == 0
        }
        None => false,
    };
    if completed {
        let frame = frames.pop().expect("frame present");
        for alias in frame.aliases {
            table.insert(alias, frame.buffer.clone());
        }
    }
}

fn serialize_open_tag(e: &BytesStart) -> Result<String> {
    let mut tag = String::from("<");
    tag.push_str(&String::from_utf8(e.name().as_ref().to_vec())?);
    for attr in e.attributes().flatten() {
        tag.push(' ');
        tag.push_str(&String::from_utf8(attr.key.as_ref().to_vec())?);
        tag.push_str("=\"");
        // Attribute values arrive in their source-escaped form already.
        tag.push_str(&String::from_utf8(attr.value.to_vec())?);
        tag.push('"');
    }
    tag.push('>');
    Ok(tag)
}

fn append_all(frames: &mut [CaptureFrame], content: &str) {
    for frame in frames.iter_mut() {
        frame.buffer.push_str(content);
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    const NESTED: &str = r#"<map class="- map/map "><topicref class="- map/topicref " keys="a b"><topicref class="- map/topicref " keys="c"/></topicref></map>"#;

    #[test]
    fn test_outer_capture_includes_nested_definition() {
        let table = capture_key_subtrees(NESTED, &keys(&["a", "c"])).unwrap();

        let outer = &table["a"];
        assert!(outer.starts_with(r#"<topicref class="- map/topicref " keys="a b">"#));
        assert!(outer.contains(r#"keys="c""#));
        assert!(outer.ends_with("</topicref>"));
        // Both aliases of the outer definition bind, even though only
        // one was targeted.
        assert_eq!(table["b"], table["a"]);

        // The inner frame captured only its own element.
        assert_eq!(
            table["c"],
            r#"<topicref class="- map/topicref " keys="c"></topicref>"#
        );
    }

    #[test]
    fn test_untargeted_nested_definition_produces_no_binding() {
        let table = capture_key_subtrees(NESTED, &keys(&["a"])).unwrap();

        assert!(!table.contains_key("c"));
        // The markup is still present inside the outer capture.
        assert!(table["a"].contains(r#"keys="c""#));
    }

    #[test]
    fn test_idle_elements_are_not_captured() {
        let map = r#"<map class="- map/map ">
  <topicref class="- map/topicref " href="plain.dita"/>
  <topicref class="- map/topicref " keys="k" href="t.dita"/>
</map>"#;

        let table = capture_key_subtrees(map, &keys(&["k"])).unwrap();
        assert_eq!(table.len(), 1);
        assert!(!table["k"].contains("plain.dita"));
    }

    #[test]
    fn test_character_data_is_escaped() {
        let map = r#"<map class="- map/map "><topicref class="- map/topicref " keys="k"><navtitle class="- topic/navtitle ">Q &amp; A</navtitle></topicref></map>"#;

        let table = capture_key_subtrees(map, &keys(&["k"])).unwrap();
        assert!(table["k"].contains("Q &amp; A"));
    }

    #[test]
    fn test_non_topicref_keys_attribute_ignored() {
        // keys on a non-reference element never starts a capture
        let map = r#"<map class="- map/map "><data class="- topic/data " keys="k"/></map>"#;
        let table = capture_key_subtrees(map, &keys(&["k"])).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_sibling_definitions() {
        let map = r#"<map class="- map/map "><topicref class="- map/topicref " keys="x" href="x.dita"/><topicref class="- map/topicref " keys="y" href="y.dita"/></map>"#;

        let table = capture_key_subtrees(map, &keys(&["x", "y"])).unwrap();
        assert!(table["x"].contains("x.dita"));
        assert!(!table["x"].contains("y.dita"));
        assert!(table["y"].contains("y.dita"));
    }
}
