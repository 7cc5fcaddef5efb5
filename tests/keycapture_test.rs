//! Key subtree capture against resolved key sets.

use std::collections::BTreeSet;
use std::fs;

use ditalist::keycapture::{capture_key_subtrees, capture_key_subtrees_from_file};
use ditalist::resolve::{ResolveOptions, resolve};

#[test]
fn test_capture_nested_definitions() {
    let map = r#"<map class="- map/map "><topicref class="- map/topicref " keys="a b"><topicref class="- map/topicref " keys="c"/></topicref></map>"#;

    let targets: BTreeSet<String> = ["a".to_string(), "c".to_string()].into_iter().collect();
    let table = capture_key_subtrees(map, &targets).unwrap();

    // Outer definition captures everything nested inside it, and binds
    // all of its aliases.
    assert!(table["a"].contains(r#"keys="c""#));
    assert_eq!(table["a"], table["b"]);
    // Inner definition captures only itself.
    assert_eq!(
        table["c"],
        r#"<topicref class="- map/topicref " keys="c"></topicref>"#
    );

    // Narrowing the target set removes the inner binding but not the
    // inner markup.
    let targets: BTreeSet<String> = ["a".to_string()].into_iter().collect();
    let table = capture_key_subtrees(map, &targets).unwrap();
    assert!(!table.contains_key("c"));
    assert!(table["a"].contains(r#"keys="c""#));
}

#[test]
fn test_capture_keys_referenced_by_resolution() {
    // Resolve a fixture tree, then capture subtrees for exactly the keys
    // the closure discovered.
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();

    let map_path = base.join("root.ditamap");
    fs::write(
        &map_path,
        r#"<?xml version="1.0"?>
<map class="- map/map ">
  <topicref class="- map/topicref " keys="intro" href="intro.dita">
    <navtitle class="- topic/navtitle ">Introduction &amp; Overview</navtitle>
  </topicref>
  <topicref class="- map/topicref " keys="setup install" href="setup.dita"/>
</map>"#,
    )
    .unwrap();
    fs::write(
        base.join("intro.dita"),
        r#"<topic class="- topic/topic " id="i"><title class="- topic/title ">Intro</title></topic>"#,
    )
    .unwrap();
    fs::write(
        base.join("setup.dita"),
        r#"<topic class="- topic/topic " id="s"><title class="- topic/title ">Setup</title></topic>"#,
    )
    .unwrap();

    let options = ResolveOptions {
        input: "root.ditamap".to_string(),
        base_dir: base.to_string_lossy().into_owned(),
        ..Default::default()
    };
    let resolution = resolve(&options).unwrap();

    let keys: BTreeSet<String> = resolution.manifest.key_defs.keys().cloned().collect();
    assert_eq!(keys.len(), 3);

    let table = capture_key_subtrees_from_file(&map_path, &keys).unwrap();

    assert!(table["intro"].contains("intro.dita"));
    assert!(table["intro"].contains("Introduction &amp; Overview"));
    // Multi-alias declaration binds each alias to the same subtree
    assert_eq!(table["setup"], table["install"]);
    assert!(table["setup"].contains("setup.dita"));
}
