//! Filter-definition ("ditaval") file reading.
//!
//! Only the flagging declarations matter to reference resolution: images
//! named by `imageref` attributes must be carried into the manifest so the
//! build can copy them alongside regular content.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::util;

/// Flagging images collected from a filter file.
#[derive(Debug, Default, Clone)]
pub struct FilterImages {
    /// All flagging images, relative ones rebased against the filter file
    pub flag_images: std::collections::BTreeSet<String>,
    /// The raw relative spellings, kept for output without rebasing
    pub rel_flag_images: std::collections::BTreeSet<String>,
}

/// Read a filter-definition file and collect its flagging images.
pub fn read_filter_file(path: &Path) -> Result<FilterImages> {
    let bytes = std::fs::read(path)?;
    let hint = util::extract_xml_encoding(&bytes).map(str::to_owned);
    let content = util::decode_text(&bytes, hint.as_deref());

    let base_dir = path
        .parent()
        .map(|p| util::to_unix_seps(&p.to_string_lossy()))
        .unwrap_or_default();

    let mut reader = Reader::from_str(&content);
    reader.config_mut().trim_text(true);

    let mut images = FilterImages::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() != b"imageref" && attr.key.as_ref() != b"img" {
                        continue;
                    }
                    let value = String::from_utf8(attr.value.to_vec())?;
                    if util::is_absolute(&value) {
                        images
                            .flag_images
                            .insert(util::remove_redundant_names(&value));
                    } else {
                        images.rel_flag_images.insert(util::to_unix_seps(&value));
                        let joined = if base_dir.is_empty() {
                            value.clone()
                        } else {
                            format!("{base_dir}/{value}")
                        };
                        images
                            .flag_images
                            .insert(util::remove_redundant_names(&joined));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Xml(e)),
            _ => {}
        }
    }

    Ok(images)
}
