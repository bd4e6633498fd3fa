//! Text-XML output for decoded documents.
//!
//! No textual original ever existed for a compiled manifest, so the output is
//! a faithful rendering of the decoded tree, not a byte-identical
//! reconstruction of anything.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::binary_xml::XmlDocument;
use crate::types::{AxmlError, AxmlResult, Element, Node};

impl XmlDocument {
    /// Render the document as textual XML, indented with `indent` spaces per
    /// nesting level (0 for a single unindented line).
    pub fn to_xml_string(&self, indent: usize) -> AxmlResult<String> {
        let mut writer = if indent == 0 {
            Writer::new(Vec::new())
        } else {
            Writer::new_with_indent(Vec::new(), b' ', indent)
        };
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_err)?;
        write_element(&mut writer, self.root())?;
        String::from_utf8(writer.into_inner()).map_err(|err| AxmlError::Xml(err.to_string()))
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> AxmlResult<()> {
    let mut start = BytesStart::new(element.tag.as_str());
    if let Some((prefix, uri)) = &element.namespace {
        let decl = if prefix.is_empty() {
            "xmlns".to_string()
        } else {
            format!("xmlns:{prefix}")
        };
        start.push_attribute((decl.as_str(), uri.as_str()));
    }
    let rendered: Vec<(String, String)> = element
        .attributes
        .iter()
        .map(|attr| (attr.name.clone(), attr.value.to_string()))
        .collect();
    for (name, value) in &rendered {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for child in &element.children {
        match child {
            Node::Element(elem) => write_element(writer, elem)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(xml_err)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.tag.as_str())))
        .map_err(xml_err)
}

fn xml_err(err: impl std::fmt::Display) -> AxmlError {
    AxmlError::Xml(err.to_string())
}
