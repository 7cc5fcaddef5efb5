//! Manifest serialization.
//!
//! Writes the resolution result into the temporary output directory: one
//! newline-delimited list file per classification category, the aggregate
//! key/value manifest in plain and XML-properties forms, the two
//! key-definition documents, the subject dictionaries, and the export stub.
//!
//! All rewriting with the rebasing prefix happens here; the in-memory
//! [`Manifest`] keeps its paths relative to the original base directory.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::Result;
use crate::resolve::uplevels::{apply_prefix, uplevel_chain};
use crate::resolve::{Manifest, rewrite_key_entry};
use crate::util;

const XML_HEAD: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Write every output document for a completed resolution.
pub fn write_manifest(manifest: &Manifest, temp_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(temp_dir)?;

    let mut props: BTreeMap<String, String> = BTreeMap::new();
    props.insert("user.input.dir".to_string(), manifest.input_dir.clone());
    props.insert(
        "user.input.file".to_string(),
        format!("{}{}", manifest.prefix, manifest.input_file),
    );
    props.insert(
        "tempdirToinputmapdir.relative.value".to_string(),
        util::regex_escape_relative(&manifest.prefix),
    );
    props.insert("uplevels".to_string(), uplevel_chain(manifest.uplevels));

    props.insert(
        "user.input.file.listfile".to_string(),
        "usr.input.file.list".to_string(),
    );
    std::fs::write(
        temp_dir.join("usr.input.file.list"),
        format!("{}{}", manifest.prefix, manifest.input_file),
    )?;

    let prefix = &manifest.prefix;
    let categories: [(&str, &BTreeSet<String>); 21] = [
        ("outditafileslist", &manifest.out_of_scope_set),
        ("fullditamapandtopiclist", &manifest.full_set),
        ("fullditatopiclist", &manifest.topic_set),
        ("fullditamaplist", &manifest.map_set),
        ("hrefditatopiclist", &manifest.href_topic_set),
        ("hrefditamaplist", &manifest.href_map_set),
        ("conreflist", &manifest.conref_set),
        ("imagelist", &manifest.image_set),
        ("flagimagelist", &manifest.flag_image_set),
        ("htmllist", &manifest.html_set),
        ("hreftargetslist", &manifest.href_target_set),
        ("hreftopicslist", &manifest.href_with_id_set),
        ("chunktopicslist", &manifest.chunk_topic_set),
        ("subjectschemelist", &manifest.scheme_set),
        ("conreftargetslist", &manifest.conref_target_set),
        ("copytosourcelist", &manifest.copyto_source_set),
        ("subsidiarytargetslist", &manifest.subsidiary_set),
        ("conrefpushlist", &manifest.conref_push_set),
        ("keyreflist", &manifest.keyref_set),
        ("codereflist", &manifest.coderef_set),
        ("resourceonlylist", &manifest.resource_only_set),
    ];

    for (key, set) in categories {
        let entries: Vec<String> = set.iter().map(|file| apply_prefix(prefix, file)).collect();
        write_category(&mut props, temp_dir, key, entries)?;
    }

    // Flagging images keep their relative spellings; they are copied to
    // the output directory directly rather than rebased.
    let rel_flags: Vec<String> = manifest
        .rel_flag_image_set
        .iter()
        .map(|file| util::remove_redundant_names(file))
        .collect();
    write_category(&mut props, temp_dir, "relflagimagelist", rel_flags)?;

    // Copy-to mappings serialize as target=source with both sides rebased.
    let copyto_entries: Vec<String> = manifest
        .copyto_map
        .iter()
        .map(|(target, source)| {
            format!(
                "{}={}",
                apply_prefix(prefix, target),
                apply_prefix(prefix, source)
            )
        })
        .collect();
    write_category(&mut props, temp_dir, "copytotarget2sourcemaplist", copyto_entries)?;

    // Key definitions go through prefix relocation; entries that lose the
    // prefix drop out of the list but stay in the keydef document.
    let mut key_entries: Vec<String> = Vec::new();
    let mut keydef_doc = String::from(XML_HEAD);
    keydef_doc.push_str("<stub>");
    for (alias, def) in &manifest.key_defs {
        let rewritten =
            rewrite_key_entry(alias, def, prefix, manifest.external_keys.contains(alias));
        if let Some(entry) = rewritten.list_entry {
            key_entries.push(entry);
        }
        keydef_doc.push_str(&format!(
            "<keydef keys=\"{}\" href=\"{}\" source=\"{}\"/>",
            escape_xml(&rewritten.record.keys),
            escape_xml(&rewritten.record.href),
            escape_xml(&rewritten.record.source)
        ));
    }
    keydef_doc.push_str("</stub>");
    write_category(&mut props, temp_dir, "keylist", key_entries)?;
    std::fs::write(temp_dir.join("keydef.xml"), keydef_doc)?;

    // Scheme-file key definitions are written unrewritten, in the order
    // the traversal found them.
    let mut scheme_doc = String::from(XML_HEAD);
    scheme_doc.push_str("<stub>");
    for record in &manifest.scheme_keydefs {
        scheme_doc.push_str(&format!(
            "<keydef keys=\"{}\" href=\"{}\" source=\"{}\"/>",
            escape_xml(&record.keys),
            escape_xml(&record.href),
            escape_xml(&record.source)
        ));
    }
    scheme_doc.push_str("</stub>");
    std::fs::write(temp_dir.join("schemekeydef.xml"), scheme_doc)?;

    // Aggregate manifest, plain and XML-properties forms.
    let mut plain = String::new();
    for (key, value) in &props {
        plain.push_str(key);
        plain.push('=');
        plain.push_str(value);
        plain.push('\n');
    }
    std::fs::write(temp_dir.join("dita.list"), plain)?;
    write_xml_properties(&temp_dir.join("dita.xml.properties"), &props)?;

    // Subject dictionaries: flat key/value pairs, comma-joined sets.
    let relation: BTreeMap<String, String> = manifest
        .relationship_graph
        .iter()
        .map(|(key, children)| (key.clone(), join_set(children)))
        .collect();
    write_xml_properties(&temp_dir.join("subjectrelation.xml"), &relation)?;

    let dictionary: BTreeMap<String, String> = manifest
        .scheme_dictionary
        .iter()
        .map(|(key, schemes)| (key.clone(), join_set(schemes)))
        .collect();
    write_xml_properties(&temp_dir.join("schemedictionary.xml"), &dictionary)?;

    // Export stub, populated for the eclipse-help variant only.
    let mut export = String::from(XML_HEAD);
    export.push_str("<stub>");
    if manifest.transtype == "eclipsehelp" {
        export.push_str(&manifest.export_anchors);
    }
    export.push_str("</stub>");
    std::fs::write(temp_dir.join("export.xml"), export)?;

    Ok(())
}

/// Write one category list file and its two manifest entries.
fn write_category(
    props: &mut BTreeMap<String, String>,
    temp_dir: &Path,
    key: &str,
    entries: Vec<String>,
) -> Result<()> {
    let stem = key.strip_suffix("list").unwrap_or(key);
    let file_name = format!("{stem}.list");

    std::fs::write(temp_dir.join(&file_name), entries.join("\n"))?;

    props.insert(format!("{stem}file"), file_name);
    props.insert(key.to_string(), entries.join(","));
    Ok(())
}

fn write_xml_properties(path: &Path, props: &BTreeMap<String, String>) -> Result<()> {
    let mut doc = String::from(XML_HEAD);
    doc.push_str("<properties>\n");
    for (key, value) in props {
        doc.push_str(&format!(
            "<entry key=\"{}\">{}</entry>\n",
            escape_xml(key),
            escape_xml(value)
        ));
    }
    doc.push_str("</properties>\n");
    std::fs::write(path, doc)?;
    Ok(())
}

fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(",")
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
