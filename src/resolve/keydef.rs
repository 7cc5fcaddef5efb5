//! Key definition storage and serialization.
//!
//! A key declaration binds one or more whitespace-separated aliases to a
//! target href. The first binding per alias wins for the whole run; later
//! duplicates are dropped silently.
//!
//! Serialization renders each binding as `alias=href(source)` and then
//! applies prefix surgery: with a non-empty rebasing prefix the leading
//! prefix is relocated from the alias position to just before the
//! parenthesized source annotation, and stripped back out entirely for
//! keys that target external resources (those resolve against a different
//! root). The exact character operations are deliberate compatibility
//! behavior and are pinned by the tests below.

use std::collections::BTreeMap;

use crate::util;

/// One key binding: target href plus the map that declared it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct KeyDef {
    /// Target href; empty when the declaration carries no target
    pub href: String,
    /// Map file the binding was declared in
    pub source: String,
}

/// A serialized key-definition element: `<keydef keys href source/>`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct KeyDefRecord {
    pub keys: String,
    pub href: String,
    pub source: String,
}

/// Result of rewriting one binding for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenKey {
    /// Entry for the key list; `None` when the composed form does not
    /// contain the prefix and is therefore omitted from the list
    pub list_entry: Option<String>,
    /// Attribute values for the key-definitions document (always produced)
    pub record: KeyDefRecord,
}

/// Bind every alias of a key declaration, first definition winning.
///
/// Returns the aliases that were newly bound by this call.
pub(crate) fn bind_aliases<'a>(
    store: &mut BTreeMap<String, KeyDef>,
    keys_attr: &'a str,
    href: &str,
    source: &str,
) -> Vec<&'a str> {
    let mut added = Vec::new();
    for alias in keys_attr.split_whitespace() {
        if store.contains_key(alias) {
            log::debug!("duplicate key definition {alias} in {source} dropped");
            continue;
        }
        store.insert(
            alias.to_string(),
            KeyDef {
                href: href.to_string(),
                source: source.to_string(),
            },
        );
        added.push(alias);
    }
    added
}

/// Rewrite one binding with the rebasing prefix applied.
pub fn rewrite_key_entry(
    alias: &str,
    def: &KeyDef,
    prefix: &str,
    is_external: bool,
) -> RewrittenKey {
    let source_part = format!("{}({})", def.href, def.source);

    let mut rep = String::new();
    rep.push_str(&util::remove_redundant_names(&format!("{prefix}{alias}")));
    rep.push('=');
    if let Some(inner) = source_part
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|_| def.href.is_empty())
    {
        // Targetless declaration: the parenthesized literal keeps its
        // shape, the prefix lands outside it.
        rep.push_str(&util::remove_redundant_names(prefix));
        rep.push('(');
        rep.push_str(&util::remove_redundant_names(inner));
        rep.push(')');
    } else {
        rep.push_str(&util::remove_redundant_names(&format!(
            "{prefix}{source_part}"
        )));
    }

    let mut result = rep.clone();
    let list_entry = if prefix.is_empty() {
        Some(rep.clone())
    } else {
        let prefix1 = util::to_unix_seps(prefix);
        if rep.contains(&prefix1) {
            // Relocate the prefix from the alias position to just before
            // the source annotation.
            let mut moved = rep.get(prefix1.len()..).unwrap_or("").to_string();
            if let Some(open) = moved.rfind('(') {
                moved.insert_str(open + 1, &prefix1);
            }
            if is_external
                && let Some(pos) = moved.find(&prefix1)
            {
                moved.replace_range(pos..pos + prefix1.len(), "");
            }
            result = moved.clone();
            Some(moved)
        } else {
            None
        }
    };

    RewrittenKey {
        record: split_record(alias, &result),
        list_entry,
    }
}

/// Decompose a rewritten `alias=href(source)` entry into attribute values.
fn split_record(alias: &str, entry: &str) -> KeyDefRecord {
    let equals = entry.find('=').map(|i| i + 1).unwrap_or(0);
    let open = entry.rfind('(');
    let close = entry.rfind(')');
    match (open, close) {
        (Some(open), Some(close)) if open < close => KeyDefRecord {
            keys: alias.to_string(),
            href: entry[equals..open].to_string(),
            source: entry[open + 1..close].to_string(),
        },
        _ => KeyDefRecord {
            keys: alias.to_string(),
            href: entry[equals..].to_string(),
            source: String::new(),
        },
    }
}
