//! # ditalist
//!
//! Reference resolution for DITA-style document map builds.
//!
//! Given a root map, `ditalist` computes the transitive closure of every
//! referenced file, classifies each by role (topic, map, image, resource),
//! resolves copy-to and conref indirection, rebases all paths onto a common
//! root, and produces the file-list manifest plus a table of resolved key
//! definitions that downstream transformation steps consume.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ditalist::resolve::{ResolveOptions, resolve};
//! use ditalist::manifest::write_manifest;
//! use std::path::Path;
//!
//! let options = ResolveOptions {
//!     input: "root.ditamap".to_string(),
//!     base_dir: "docs".to_string(),
//!     ..Default::default()
//! };
//!
//! let resolution = resolve(&options)?;
//! for diagnostic in &resolution.diagnostics {
//!     eprintln!("[{}] {}", diagnostic.code, diagnostic.message);
//! }
//! write_manifest(&resolution.manifest, Path::new("temp"))?;
//! # Ok::<(), ditalist::Error>(())
//! ```
//!
//! ## Key subtree capture
//!
//! An independent pass over a map captures the serialized XML subtree of
//! every key definition whose name is actually referenced:
//!
//! ```
//! use ditalist::keycapture::capture_key_subtrees;
//! use std::collections::BTreeSet;
//!
//! let map = r#"<map class="- map/map ">
//!   <topicref class="- map/topicref " keys="intro" href="intro.dita"/>
//! </map>"#;
//!
//! let keys: BTreeSet<String> = ["intro".to_string()].into_iter().collect();
//! let table = capture_key_subtrees(map, &keys)?;
//! assert!(table["intro"].contains("intro.dita"));
//! # Ok::<(), ditalist::Error>(())
//! ```

pub mod error;
pub mod keycapture;
pub mod manifest;
pub mod resolve;
pub mod scan;
pub mod util;

pub use error::{Error, Result};
pub use resolve::{Manifest, Resolution, ResolveOptions, resolve};
