//! # axml
//!
//! A library for reading Android's compiled binary formats: the binary XML
//! manifest ("AXML") and the compiled resource table ("ARSC").
//!
//! Decoding is strictly read-only. A compiled manifest becomes an element
//! tree with namespaces, attributes and text nodes; a resource table becomes
//! a resolver that converts between readable (`@string/app_name`) and numeric
//! (`0x7f010001`) resource ids and looks up stored values. When both inputs
//! are available, reference-typed manifest attributes can be resolved to
//! their concrete values in one pass.
//!
//! # Examples
//!
//! ```no_run
//! use axml::{is_axml, ResourceTable, XmlDocument};
//!
//! let manifest = std::fs::read("AndroidManifest.xml")?;
//! assert!(is_axml(&manifest));
//!
//! let resources = std::fs::read("resources.arsc")?;
//! let table = ResourceTable::from_bytes(&resources)?;
//!
//! let doc = XmlDocument::from_bytes_with_resources(&manifest, &table)?;
//! println!("{}", doc.to_xml_string(4)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binary_xml;
mod chunk;
pub mod resources;
mod string_pool;
#[cfg(test)]
mod tests;
pub mod types;
mod xml_write;

pub use binary_xml::{is_axml, ResourceMap, XmlDocument, AXML_MAGIC};
pub use resources::{Package, Resolution, ResourceTable};
pub use string_pool::{StringPool, StringPoolFlags};
pub use types::{Attribute, AxmlError, AxmlResult, Element, Node, Value};
