//! Binary XML (AXML) document decoder.
//!
//! Compiled manifests are a flat sequence of chunks: a string pool, an
//! optional attribute resource-id map, then namespace/element/cdata nodes.
//! The walk is single-pass; element nesting is rebuilt with an explicit stack
//! of open elements rather than recursion, since chunk order is flat.

use std::collections::HashMap;

use log::warn;
use once_cell::sync::Lazy;

use crate::chunk::{
    BinaryReader, ChunkHeader, NO_ENTRY, RES_STRING_POOL_TYPE, RES_XML_CDATA_TYPE,
    RES_XML_END_ELEMENT_TYPE, RES_XML_END_NAMESPACE_TYPE, RES_XML_LAST_CHUNK_TYPE,
    RES_XML_RESOURCE_MAP_TYPE, RES_XML_START_ELEMENT_TYPE, RES_XML_START_NAMESPACE_TYPE,
    RES_XML_TYPE,
};
use crate::resources::{Resolution, ResourceTable};
use crate::string_pool::StringPool;
use crate::types::{Attribute, AxmlError, AxmlResult, Element, Node, Value};

/// The first four bytes of every compiled manifest: the `RES_XML_TYPE` tag
/// followed by its 8-byte header size.
pub const AXML_MAGIC: [u8; 4] = [0x03, 0x00, 0x08, 0x00];

// Attribute value type tags, from ResourceTypes.h.
pub(crate) const TYPE_NULL: u8 = 0x00;
pub(crate) const TYPE_REFERENCE: u8 = 0x01;
pub(crate) const TYPE_INT_DEC: u8 = 0x10;
pub(crate) const TYPE_INT_HEX: u8 = 0x11;
pub(crate) const TYPE_INT_BOOLEAN: u8 = 0x12;

/// Well-known platform attribute resource ids, keyed to their manifest names.
///
/// Some producers emit attribute name slots that only resolve through the
/// document's resource-id map; this table recovers the `android:` name for
/// the attributes a manifest commonly carries.
static KNOWN_ATTRIBUTES: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (0x0101_0001, "label"),
        (0x0101_0002, "icon"),
        (0x0101_0003, "name"),
        (0x0101_0006, "permission"),
        (0x0101_000f, "debuggable"),
        (0x0101_0010, "exported"),
        (0x0101_001b, "grantUriPermissions"),
        (0x0101_001e, "screenOrientation"),
        (0x0101_0024, "value"),
        (0x0101_0025, "resource"),
        (0x0101_020c, "minSdkVersion"),
        (0x0101_021b, "versionCode"),
        (0x0101_021c, "versionName"),
        (0x0101_0227, "reqTouchScreen"),
        (0x0101_0228, "reqKeyboardType"),
        (0x0101_0229, "reqHardKeyboard"),
        (0x0101_022a, "reqNavigation"),
        (0x0101_0232, "reqFiveWayNav"),
        (0x0101_026c, "anyDensity"),
        (0x0101_0270, "targetSdkVersion"),
        (0x0101_0271, "maxSdkVersion"),
        (0x0101_0272, "testOnly"),
        (0x0101_0281, "glEsVersion"),
        (0x0101_0284, "smallScreens"),
        (0x0101_0285, "normalScreens"),
        (0x0101_0286, "largeScreens"),
        (0x0101_028e, "required"),
        (0x0101_02b7, "installLocation"),
        (0x0101_02bf, "xlargeScreens"),
        (0x0101_02ca, "screenSize"),
        (0x0101_02cb, "screenDensity"),
        (0x0101_0364, "requiresSmallestWidthDp"),
        (0x0101_0365, "compatibleWidthLimitDp"),
        (0x0101_0366, "largestWidthLimitDp"),
        (0x0101_03a6, "publicKey"),
        (0x0101_03e8, "category"),
        (0x0101_03f2, "banner"),
        (0x0101_03f4, "isGame"),
    ])
});

/// Check the AXML magic bytes without decoding anything.
pub fn is_axml(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == AXML_MAGIC
}

/// The document's attribute resource-id map: one resource id per attribute
/// name slot, with a reverse index from id back to slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceMap {
    ids: Vec<u32>,
    slots: HashMap<u32, usize>,
}

impl ResourceMap {
    fn parse(reader: &mut BinaryReader<'_>, header: &ChunkHeader) -> AxmlResult<Self> {
        let count = (header.size as usize).saturating_sub(8) / 4;
        let mut ids = Vec::with_capacity(count);
        let mut slots = HashMap::with_capacity(count);
        for slot in 0..count {
            let id = reader.read_u32()?;
            ids.push(id);
            slots.insert(id, slot);
        }
        Ok(ResourceMap { ids, slots })
    }

    /// Resource id for an attribute name slot, ignoring empty (zero) entries.
    pub fn resource_id(&self, slot: u32) -> Option<u32> {
        self.ids.get(slot as usize).copied().filter(|id| *id != 0)
    }

    /// Name slot holding the given resource id, if any.
    pub fn slot(&self, resource_id: u32) -> Option<usize> {
        self.slots.get(&resource_id).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A decoded binary XML document: the element tree plus its string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: Element,
    strings: Vec<String>,
    resource_map: Option<ResourceMap>,
}

impl XmlDocument {
    /// Decode a compiled manifest. Resource references stay unresolved
    /// (`Value::Reference`, displayed as `@0x7f......`).
    pub fn from_bytes(data: &[u8]) -> AxmlResult<Self> {
        decode(data, None)
    }

    /// Decode a compiled manifest, resolving reference-typed attribute values
    /// through an already-decoded resource table. References the table cannot
    /// resolve keep their reference marker.
    pub fn from_bytes_with_resources(data: &[u8], table: &ResourceTable) -> AxmlResult<Self> {
        decode(data, Some(table))
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    /// All strings from the document's pool, in declaration order.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn resource_map(&self) -> Option<&ResourceMap> {
        self.resource_map.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn test_document(root: Element) -> Self {
        XmlDocument {
            root,
            strings: Vec::new(),
            resource_map: None,
        }
    }
}

fn decode(data: &[u8], resolver: Option<&ResourceTable>) -> AxmlResult<XmlDocument> {
    let mut reader = BinaryReader::new(data);
    let document = ChunkHeader::read(&mut reader)?;
    if document.type_tag != RES_XML_TYPE {
        return Err(AxmlError::MalformedXml {
            offset: document.start,
            type_tag: document.type_tag,
        });
    }
    reader.seek(document.header_end())?;

    let mut pool: Option<StringPool> = None;
    let mut resource_map: Option<ResourceMap> = None;
    // (prefix, uri) captured from the latest start-namespace chunk, applied
    // to the next start-element only.
    let mut pending_namespace: Option<(String, String)> = None;
    // Open-element stack with a root sentinel; end-element pops exactly one.
    let mut stack: Vec<Element> = vec![Element::new("")];

    while reader.position() < document.end() {
        let chunk = ChunkHeader::read(&mut reader)?;
        match chunk.type_tag {
            RES_STRING_POOL_TYPE => {
                pool = Some(StringPool::parse(&mut reader, &chunk)?);
            }
            RES_XML_RESOURCE_MAP_TYPE => {
                resource_map = Some(ResourceMap::parse(&mut reader, &chunk)?);
            }
            RES_XML_START_NAMESPACE_TYPE => {
                let pool = require_pool(&pool, chunk.start)?;
                reader.read_u32()?; // line number
                reader.read_u32()?; // comment
                let prefix_idx = reader.read_u32()?;
                let uri_idx = reader.read_u32()?;
                let prefix = pool.get(prefix_idx).unwrap_or_default().to_string();
                let uri = pool.get(uri_idx).unwrap_or_default().to_string();
                pending_namespace = Some((prefix, uri));
            }
            RES_XML_END_NAMESPACE_TYPE | RES_XML_LAST_CHUNK_TYPE => {
                // Offset bookkeeping only.
            }
            RES_XML_START_ELEMENT_TYPE => {
                let pool = require_pool(&pool, chunk.start)?;
                reader.read_u32()?; // line number
                reader.read_u32()?; // comment
                let _ns_idx = reader.read_u32()?;
                let name_idx = reader.read_u32()?;
                reader.read_u16()?; // attribute region start
                reader.read_u16()?; // attribute record size
                let attr_count = reader.read_u16()? as usize;
                reader.read_u16()?; // id attribute index
                reader.read_u16()?; // class attribute index
                reader.read_u16()?; // style attribute index

                let mut element = Element::new(pool.require(name_idx)?);
                if let Some(namespace) = pending_namespace.take() {
                    element.namespace = Some(namespace);
                }

                for _ in 0..attr_count {
                    let ns_id = reader.read_u32()?;
                    let name_id = reader.read_u32()?;
                    let raw_value_id = reader.read_u32()?;
                    let flags = reader.read_u32()?;
                    let value_data = reader.read_u32()?;
                    if flags & 0xFFFF != 8 {
                        warn!(
                            "attribute at {:#x} declares value size {}, expected 8",
                            chunk.start,
                            flags & 0xFFFF
                        );
                    }

                    let name =
                        qualified_attribute_name(pool, resource_map.as_ref(), ns_id, name_id)?;
                    let mut value = decode_value(pool, raw_value_id, flags, value_data)?;
                    if let (Some(table), Value::Reference(id)) = (resolver, &value) {
                        match table.find_id(*id) {
                            Ok(Resolution::Value(text)) => value = Value::String(text),
                            Ok(Resolution::Values(set)) if !set.is_empty() => {
                                value = Value::Strings(set)
                            }
                            _ => {} // keep the unresolved marker
                        }
                    }
                    let resource_id = resource_map
                        .as_ref()
                        .and_then(|map| map.resource_id(name_id));
                    element.attributes.push(Attribute {
                        name,
                        value,
                        resource_id,
                    });
                }
                stack.push(element);
            }
            RES_XML_END_ELEMENT_TYPE => {
                let element = match stack.pop() {
                    Some(element) if !stack.is_empty() => element,
                    _ => {
                        return Err(AxmlError::MalformedChunk {
                            offset: chunk.start,
                            detail: "end element without matching start".to_string(),
                        })
                    }
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Element(element));
                }
            }
            RES_XML_CDATA_TYPE => {
                let pool = require_pool(&pool, chunk.start)?;
                reader.read_u32()?; // line number
                reader.read_u32()?; // comment
                let text_idx = reader.read_u32()?;
                match pool.get(text_idx) {
                    Some(text) => {
                        if let Some(top) = stack.last_mut() {
                            top.children.push(Node::Text(text.to_string()));
                        }
                    }
                    None => warn!(
                        "cdata chunk at {:#x} references missing string {}",
                        chunk.start, text_idx
                    ),
                }
            }
            other => {
                // Skipping an unknown chunk would desynchronize every
                // subsequent offset; abort instead.
                return Err(AxmlError::MalformedXml {
                    offset: chunk.start,
                    type_tag: other,
                });
            }
        }
        reader.seek(chunk.end())?;
    }

    let sentinel = match stack.pop() {
        Some(sentinel) if stack.is_empty() => sentinel,
        _ => {
            return Err(AxmlError::MalformedChunk {
                offset: document.end(),
                detail: "unclosed elements at end of document".to_string(),
            })
        }
    };
    let root = sentinel
        .children
        .into_iter()
        .find_map(|node| match node {
            Node::Element(elem) => Some(elem),
            Node::Text(_) => None,
        })
        .ok_or_else(|| AxmlError::MalformedChunk {
            offset: document.end(),
            detail: "document has no root element".to_string(),
        })?;

    let strings = pool.map(StringPool::into_strings).unwrap_or_default();
    Ok(XmlDocument {
        root,
        strings,
        resource_map,
    })
}

fn require_pool<'a>(pool: &'a Option<StringPool>, offset: usize) -> AxmlResult<&'a StringPool> {
    pool.as_ref().ok_or_else(|| AxmlError::MalformedChunk {
        offset,
        detail: "node chunk encountered before string pool".to_string(),
    })
}

/// Qualified name for an attribute: well-known platform attributes recovered
/// through the resource-id map come out as `android:<name>`; otherwise the
/// prefix derives from the namespace URI; otherwise the bare pool name.
fn qualified_attribute_name(
    pool: &StringPool,
    map: Option<&ResourceMap>,
    ns_id: u32,
    name_id: u32,
) -> AxmlResult<String> {
    if let Some(resource_id) = map.and_then(|map| map.resource_id(name_id)) {
        if let Some(known) = KNOWN_ATTRIBUTES.get(&resource_id) {
            return Ok(format!("android:{known}"));
        }
    }
    let local = pool.require(name_id)?;
    if ns_id != NO_ENTRY {
        if let Some(uri) = pool.get(ns_id) {
            if let Some(prefix) = prefix_from_uri(uri) {
                return Ok(format!("{prefix}:{local}"));
            }
        }
    }
    Ok(local.to_string())
}

/// Namespace prefix conventionally encoded as the last path segment of the
/// namespace URI (`.../apk/res/android` -> `android`).
fn prefix_from_uri(uri: &str) -> Option<&str> {
    let segment = uri.rsplit('/').next().unwrap_or(uri);
    if segment.is_empty() {
        None
    } else {
        Some(segment)
    }
}

/// Interpret a typed attribute value.
///
/// A non-sentinel `raw_value_id` is a direct string-pool reference. Otherwise
/// the top byte of `flags` selects the interpretation; recognized numeric
/// types outside the handled set become a diagnostic placeholder rather than
/// being arithmetically decoded.
pub(crate) fn decode_value(
    pool: &StringPool,
    raw_value_id: u32,
    flags: u32,
    data: u32,
) -> AxmlResult<Value> {
    if raw_value_id != NO_ENTRY {
        return Ok(Value::String(pool.require(raw_value_id)?.to_string()));
    }
    let type_tag = (flags >> 24) as u8;
    Ok(match type_tag {
        TYPE_NULL => Value::Null,
        TYPE_REFERENCE => Value::Reference(data),
        TYPE_INT_DEC => Value::Int(i64::from(data as i32)),
        TYPE_INT_HEX => Value::Hex(data),
        TYPE_INT_BOOLEAN => Value::Bool(data == 1 || data == NO_ENTRY),
        _ => Value::Unsupported { data, flags },
    })
}
