//! Utility functions: path normalization and file classification.
//!
//! All path handling in this crate is string-based. References inside DITA
//! documents are plain strings that must survive round-trips into list files
//! and the key/value manifest, so paths are normalized textually rather than
//! through `std::path` (which would resolve against the running platform).

use std::borrow::Cow;

use memchr::memmem;

/// Token marking one level of upward ascension in a relative path.
const PARENT_SEGMENT: &str = "../";

/// Convert backslash separators to forward slashes.
pub fn to_unix_seps(path: &str) -> String {
    path.replace('\\', "/")
}

/// Remove redundant `.` and `..` segments from a path string.
///
/// Leading `..` segments that cannot be collapsed are preserved, so a path
/// that genuinely ascends out of its base directory keeps its ascension
/// chain. Backslashes are normalized to forward slashes first.
///
/// # Examples
///
/// ```
/// use ditalist::util::remove_redundant_names;
///
/// assert_eq!(remove_redundant_names("a/./b/../c.dita"), "a/c.dita");
/// assert_eq!(remove_redundant_names("../../x.dita"), "../../x.dita");
/// assert_eq!(remove_redundant_names("maps/../topics/t.dita"), "topics/t.dita");
/// ```
pub fn remove_redundant_names(path: &str) -> String {
    let path = to_unix_seps(path);
    let absolute = path.starts_with('/');

    let mut dirs: Vec<&str> = Vec::new();
    for token in path.split('/') {
        match token {
            "" | "." => {}
            ".." => match dirs.last() {
                Some(&"..") | None => dirs.push(".."),
                _ => {
                    dirs.pop();
                }
            },
            t => dirs.push(t),
        }
    }

    let joined = dirs.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// Check whether a path string denotes an absolute location.
///
/// Recognizes both Unix-rooted paths and Windows drive-letter paths, since
/// references may have been authored on either platform.
pub fn is_absolute(path: &str) -> bool {
    if path.starts_with('/') || path.starts_with('\\') {
        return true;
    }
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic()
}

/// Number of directory ascensions a relative reference requires.
///
/// The path is normalized first; the depth is derived from the position of
/// the last remaining `../` token. Returns 0 for paths that never leave the
/// base directory.
pub fn ascension_depth(path: &str) -> usize {
    let normalized = remove_redundant_names(path);
    match memmem::rfind(normalized.as_bytes(), PARENT_SEGMENT.as_bytes()) {
        Some(index) => index / 3 + 1,
        None => 0,
    }
}

/// Split a reference into its path part and optional `|format` tag.
pub fn split_format_tag(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('|') {
        Some((path, format)) => (path, Some(format)),
        None => (reference, None),
    }
}

/// Compute the path of `target` relative to the directory containing `from`.
///
/// Both arguments are absolute paths. Shared leading directories are
/// discarded and every remaining directory of `from` contributes one `../`
/// segment.
///
/// # Examples
///
/// ```
/// use ditalist::util::relative_path_from;
///
/// assert_eq!(relative_path_from("/a/b/root.ditamap", "/a/b/c/t.dita"), "c/t.dita");
/// assert_eq!(relative_path_from("/a/b/root.ditamap", "/a/x/t.dita"), "../x/t.dita");
/// ```
pub fn relative_path_from(from: &str, target: &str) -> String {
    let from = to_unix_seps(from);
    let target = to_unix_seps(target);

    let from_dirs: Vec<&str> = match from.rfind('/') {
        Some(i) => from[..i].split('/').collect(),
        None => Vec::new(),
    };
    let target_parts: Vec<&str> = target.split('/').collect();

    let mut common = 0;
    while common < from_dirs.len()
        && common < target_parts.len().saturating_sub(1)
        && from_dirs[common] == target_parts[common]
    {
        common += 1;
    }

    let mut result = String::new();
    for _ in common..from_dirs.len() {
        result.push_str(PARENT_SEGMENT);
    }
    result.push_str(&target_parts[common..].join("/"));
    result
}

/// Escape regular expression metacharacters in a relative-prefix value.
///
/// A backslash expands to a separator character class so the produced
/// pattern matches the prefix under either separator convention.
pub fn regex_escape_relative(value: &str) -> String {
    let mut buff = String::with_capacity(value.len() + value.len() / 4);
    for current in value.chars() {
        match current {
            '.' => buff.push_str("\\."),
            '\\' => buff.push_str("[\\\\|/]"),
            '(' => buff.push_str("\\("),
            ')' => buff.push_str("\\)"),
            '[' => buff.push_str("\\["),
            ']' => buff.push_str("\\]"),
            '{' => buff.push_str("\\{"),
            '}' => buff.push_str("\\}"),
            '^' => buff.push_str("\\^"),
            '+' => buff.push_str("\\+"),
            '$' => buff.push_str("\\$"),
            _ => buff.push(current),
        }
    }
    buff
}

// ============================================================================
// File Classification
// ============================================================================

/// Role of a file as determined from its name.
///
/// Classification is purely extension-based; content is never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Leaf content document (`.dita`, `.xml`)
    Topic,
    /// Document map (`.ditamap`)
    Map,
    /// Supported image format
    Image,
    /// HTML document
    Html,
    /// Opaque resource shipped alongside output (PDF, SWF)
    Resource,
    /// Anything else
    Other,
}

impl FileCategory {
    /// Classify a file by its name.
    pub fn of(path: &str) -> FileCategory {
        let lower = path.to_lowercase();

        if lower.ends_with(".ditamap") {
            return FileCategory::Map;
        }
        if lower.ends_with(".dita") || lower.ends_with(".xml") {
            return FileCategory::Topic;
        }
        if lower.ends_with(".jpg")
            || lower.ends_with(".jpeg")
            || lower.ends_with(".png")
            || lower.ends_with(".gif")
            || lower.ends_with(".eps")
            || lower.ends_with(".svg")
            || lower.ends_with(".tiff")
            || lower.ends_with(".tif")
        {
            return FileCategory::Image;
        }
        if lower.ends_with(".html") || lower.ends_with(".htm") {
            return FileCategory::Html;
        }
        if lower.ends_with(".pdf") || lower.ends_with(".swf") {
            return FileCategory::Resource;
        }
        FileCategory::Other
    }

    /// Check if this is a traversable DITA document (topic or map).
    pub fn is_dita_document(self) -> bool {
        matches!(self, FileCategory::Topic | FileCategory::Map)
    }

    /// Check if this name is acceptable as a reference target at all.
    ///
    /// Names that fail this check are logged and treated as opaque
    /// resources rather than parsed.
    pub fn is_valid_target(self) -> bool {
        !matches!(self, FileCategory::Other)
    }
}

// ============================================================================
// Text Decoding
// ============================================================================

/// Decode bytes to a string, handling various encodings.
///
/// Tries UTF-8 first (BOM handled automatically), then the hint encoding
/// from the XML declaration, then falls back to Windows-1252.
pub fn decode_text<'a>(bytes: &'a [u8], hint_encoding: Option<&str>) -> Cow<'a, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = hint_encoding
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract encoding from an XML declaration.
///
/// Parses `<?xml ... encoding="..." ?>` within the first 100 bytes.
pub fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    let check_len = bytes.len().min(100);
    let prefix = &bytes[..check_len];

    let xml_start = prefix.windows(5).position(|w| w == b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    if after_enc.is_empty() {
        return None;
    }

    let quote = after_enc[0];
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_start = 1;
    let value_end = after_enc[value_start..].iter().position(|&b| b == quote)? + value_start;

    std::str::from_utf8(&after_enc[value_start..value_end]).ok()
}

// ============================================================================
// Tests
// ============================================================================
