/* Public document model for decoded binary XML and the crate error type. */
/* Attribute names are stored fully qualified, e.g. android:versionName. */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias used throughout the crate.
pub type AxmlResult<T> = Result<T, AxmlError>;

/// Errors surfaced while decoding AXML/ARSC data or resolving resources.
///
/// Structural errors (`TruncatedInput`, `MalformedXml`, `MalformedResourceTable`,
/// `MalformedChunk`) abort the decode that raised them. Lookup errors
/// (`ResourceNotFound`, `InvalidResourceId`) are per-call and leave the decoded
/// table usable.
#[derive(Debug, PartialEq, Eq)]
pub enum AxmlError {
    /// A read ran past the end of the input buffer.
    TruncatedInput {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// Unrecognized chunk type at a structural decision point of an XML document.
    MalformedXml { offset: usize, type_tag: u16 },
    /// Unrecognized chunk type at a structural decision point of a resource table.
    MalformedResourceTable { offset: usize, type_tag: u16 },
    /// A chunk's own fields are inconsistent (bad sizing, bad string data).
    MalformedChunk { offset: usize, detail: String },
    /// A string-pool index was out of range where a string was required.
    StringIndexOutOfRange { index: u32, count: usize },
    /// A valid lookup found no matching resource entry.
    ResourceNotFound(String),
    /// A readable or hex resource id string did not match any accepted shape.
    InvalidResourceId(String),
    /// Text XML generation failure.
    Xml(String),
}

impl fmt::Display for AxmlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxmlError::TruncatedInput {
                offset,
                needed,
                available,
            } => write!(
                f,
                "truncated input at offset {offset:#x}: needed {needed} bytes, {available} available"
            ),
            AxmlError::MalformedXml { offset, type_tag } => write!(
                f,
                "malformed binary XML: unrecognized chunk type {type_tag:#06x} at offset {offset:#x}"
            ),
            AxmlError::MalformedResourceTable { offset, type_tag } => write!(
                f,
                "malformed resource table: unrecognized chunk type {type_tag:#06x} at offset {offset:#x}"
            ),
            AxmlError::MalformedChunk { offset, detail } => {
                write!(f, "malformed chunk at offset {offset:#x}: {detail}")
            }
            AxmlError::StringIndexOutOfRange { index, count } => write!(
                f,
                "string pool index {index} out of range (pool holds {count} strings)"
            ),
            AxmlError::ResourceNotFound(what) => write!(f, "resource not found: {what}"),
            AxmlError::InvalidResourceId(id) => write!(f, "invalid resource id: {id}"),
            AxmlError::Xml(msg) => write!(f, "XML error: {msg}"),
        }
    }
}

impl std::error::Error for AxmlError {}

/// Typed attribute and entry values decoded from a 32-bit payload plus type tag.
///
/// `Strings` only appears when a resource resolver replaced a `Reference` with
/// a multi-variant (drawable/mipmap) result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Int(i64),
    Bool(bool),
    Hex(u32),
    Reference(u32),
    Strings(Vec<String>),
    /// Recognized but not arithmetically decoded (float, dimension, fraction,
    /// color variants). Carries the raw payload and flags for diagnostics.
    Unsupported { data: u32, flags: u32 },
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_reference_id(&self) -> Option<u32> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(text) => write!(f, "{text}"),
            Value::Int(num) => write!(f, "{num}"),
            Value::Bool(flag) => write!(f, "{flag}"),
            Value::Hex(value) => write!(f, "0x{value:x}"),
            Value::Reference(id) => write!(f, "@0x{id:08x}"),
            Value::Strings(values) => write!(f, "{}", values.join(",")),
            Value::Unsupported { data, flags } => write!(f, "[0x{data:x}, flag=0x{flags:x}]"),
        }
    }
}

/// A single decoded attribute. `name` is the qualified name exactly as a
/// textual manifest would spell it (`package`, `android:icon`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Value,
    /// Attribute resource id recovered from the document's resource-id map,
    /// when one was present for this attribute's name slot.
    pub resource_id: Option<u32>,
}

/// A child of an element: either a nested element or character data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// DOM-style element node for the decoded XML tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Namespace declared on this element as `(prefix, uri)`, if a
    /// start-namespace chunk immediately preceded it.
    pub namespace: Option<(String, String)>,
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            namespace: None,
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute by its qualified name.
    pub fn attribute_value(&self, name: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// First child element with the given tag.
    pub fn find_child(&self, tag: &str) -> Option<&Element> {
        self.child_elements().find(|child| child.tag == tag)
    }

    /// All child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(elem) => Some(elem),
            Node::Text(_) => None,
        })
    }

    /// First text node attached to this element, if any.
    pub fn text(&self) -> Option<&str> {
        self.children.iter().find_map(|node| match node {
            Node::Text(text) => Some(text.as_str()),
            Node::Element(_) => None,
        })
    }
}
