//! Minimal owned element tree over quick-xml events.
//!
//! Only what the DOCX transforms need: element lookup by local name, ordered
//! child insertion and attribute edits. Attribute values and text are kept in
//! their escaped form so untouched content is written back as it was read.

use std::borrow::Cow;
use std::io::Cursor;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};

use crate::error::TransformError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Escaped character data.
    Text(String),
    /// Comments, CDATA, processing instructions and entity references,
    /// carried through unchanged.
    Other(Event<'static>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    /// `(qualified name, escaped value)` in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children
            .push(XmlNode::Text(quick_xml::escape::escape(text).into_owned()));
        self
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Raw (escaped) attribute value, matched by qualified name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, escaping `value`.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = quick_xml::escape::escape(value).into_owned();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = escaped,
            None => self.attributes.push((name.to_string(), escaped)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| k != name);
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|e| e.is(local))
    }

    /// Inserts `child` before the first sibling that `order` places after it.
    /// Siblings whose names are not in `order` never move the insertion point.
    pub fn insert_ordered(&mut self, child: XmlElement, order: &[&str]) -> usize {
        let rank = |local: &str| order.iter().position(|o| *o == local);
        let index = match rank(child.local_name()) {
            Some(own) => self
                .children
                .iter()
                .position(|node| match node {
                    XmlNode::Element(e) => rank(e.local_name()).is_some_and(|r| r > own),
                    _ => false,
                })
                .unwrap_or(self.children.len()),
            None => self.children.len(),
        };
        self.children.insert(index, XmlNode::Element(child));
        index
    }

    /// Returns the child named `qname`, creating it at its ordered position.
    pub fn ensure_child(&mut self, qname: &str, order: &[&str]) -> &mut XmlElement {
        let local = local_part(qname).to_string();
        let index = match self.children.iter().position(|node| match node {
            XmlNode::Element(e) => e.is(&local),
            _ => false,
        }) {
            Some(index) => index,
            None => self.insert_ordered(XmlElement::new(qname), order),
        };
        match &mut self.children[index] {
            XmlNode::Element(e) => e,
            _ => unreachable!("index points at an element"),
        }
    }

    pub fn remove_children(&mut self, mut predicate: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|node| match node {
            XmlNode::Element(e) => !predicate(e),
            _ => true,
        });
    }

    /// Visits every descendant element (depth first, pre-order), not `self`.
    pub fn for_each_descendant_mut(&mut self, f: &mut dyn FnMut(&mut XmlElement)) {
        for child in self.elements_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }

    /// Collects descendant elements with the given local name.
    pub fn descendants(&self, local: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_descendants(local, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, local: &str, found: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.is(local) {
                found.push(child);
            }
            child.collect_descendants(local, found);
        }
    }

    /// Unescaped concatenation of the direct text children.
    /// `None` when the element holds anything other than plain text.
    pub fn plain_text(&self) -> Option<String> {
        let mut out = String::new();
        for node in &self.children {
            match node {
                XmlNode::Text(raw) => {
                    let text = quick_xml::escape::unescape(raw).ok()?;
                    out.push_str(&text);
                }
                _ => return None,
            }
        }
        Some(out)
    }
}

/// A parsed XML part: declaration and other prolog events, then the root.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub prolog: Vec<Event<'static>>,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn parse(part: &str, xml: &str) -> Result<Self, TransformError> {
        let err = |reason: String| TransformError::Xml {
            part: part.to_string(),
            reason,
        };

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut prolog = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| err(format!("at byte {}: {}", reader.buffer_position(), e)))?;

            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&start).map_err(&err)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start).map_err(&err)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| err("unbalanced end tag".to_string()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(text) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = String::from_utf8_lossy(&text).into_owned();
                        parent.children.push(XmlNode::Text(raw));
                    }
                }
                Event::Eof => break,
                other => match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Other(other.into_owned())),
                    None if root.is_none() => prolog.push(other.into_owned()),
                    None => {}
                },
            }
        }

        if !stack.is_empty() {
            return Err(err("unexpected end of document".to_string()));
        }
        let root = root.ok_or_else(|| err("document has no root element".to_string()))?;
        Ok(Self { prolog, root })
    }

    pub fn to_bytes(&self, part: &str) -> Result<Vec<u8>, TransformError> {
        let err = |reason: String| TransformError::Xml {
            part: part.to_string(),
            reason,
        };

        let mut writer = Writer::new(Cursor::new(Vec::new()));
        for event in &self.prolog {
            writer
                .write_event(event.clone())
                .map_err(|e| err(e.to_string()))?;
        }
        write_element(&mut writer, &self.root).map_err(err)?;
        Ok(writer.into_inner().into_inner())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| format!("bad attribute on <{}>: {}", name, e))?;
        attributes.push((
            String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            String::from_utf8_lossy(&attr.value).into_owned(),
        ));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn write_element(writer: &mut Writer<Cursor<Vec<u8>>>, element: &XmlElement) -> Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Borrowed(value.as_bytes()),
        });
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| e.to_string());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| e.to_string())?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(raw) => writer
                .write_event(Event::Text(BytesText::from_escaped(raw.as_str())))
                .map_err(|e| e.to_string())?,
            XmlNode::Other(event) => writer
                .write_event(event.clone())
                .map_err(|e| e.to_string())?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t xml:space="preserve">Fish &amp; chips</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#;

    #[test]
    fn test_parse_and_serialize_preserves_structure() {
        let doc = XmlDocument::parse("document.xml", SAMPLE).unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert!(matches!(doc.prolog.first(), Some(Event::Decl(_))));

        let bytes = doc.to_bytes("document.xml").unwrap();
        let reparsed = XmlDocument::parse("document.xml", std::str::from_utf8(&bytes).unwrap())
            .unwrap();
        assert_eq!(reparsed.root, doc.root);
    }

    #[test]
    fn test_text_is_unescaped_on_read() {
        let doc = XmlDocument::parse("document.xml", SAMPLE).unwrap();
        let t = doc.root.descendants("t");
        assert_eq!(t.len(), 1);
        let text: String = t[0]
            .children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(raw) => Some(quick_xml::escape::unescape(raw).unwrap().into_owned()),
                XmlNode::Other(_) => Some("&".to_string()),
                _ => None,
            })
            .collect();
        assert!(text.contains("Fish"));
        assert!(text.contains("chips"));
    }

    #[test]
    fn test_attribute_edits() {
        let mut doc = XmlDocument::parse("document.xml", SAMPLE).unwrap();
        let body = doc.root.child_mut("body").unwrap();
        let pg_sz = body.child_mut("sectPr").unwrap().child_mut("pgSz").unwrap();
        assert_eq!(pg_sz.attr("w:w"), Some("12240"));

        pg_sz.set_attr("w:w", "11906");
        pg_sz.set_attr("w:orient", "landscape");
        assert_eq!(pg_sz.attr("w:w"), Some("11906"));
        assert_eq!(pg_sz.attr("w:orient"), Some("landscape"));

        pg_sz.remove_attr("w:orient");
        assert_eq!(pg_sz.attr("w:orient"), None);
    }

    #[test]
    fn test_set_attr_escapes_value() {
        let mut el = XmlElement::new("w:rFonts");
        el.set_attr("w:ascii", "A&B");
        assert_eq!(el.attr("w:ascii"), Some("A&amp;B"));
    }

    #[test]
    fn test_insert_ordered_respects_sequence() {
        let order = ["footerReference", "pgSz", "pgMar", "cols"];
        let mut sect = XmlElement::new("w:sectPr")
            .with_child(XmlElement::new("w:pgSz"))
            .with_child(XmlElement::new("w:cols"));

        sect.ensure_child("w:pgMar", &order);
        sect.insert_ordered(XmlElement::new("w:footerReference"), &order);

        let names: Vec<&str> = sect.elements().map(|e| e.local_name()).collect();
        assert_eq!(names, ["footerReference", "pgSz", "pgMar", "cols"]);

        // Existing child is returned, not duplicated.
        sect.ensure_child("w:pgMar", &order);
        assert_eq!(sect.elements().filter(|e| e.is("pgMar")).count(), 1);
    }

    #[test]
    fn test_plain_text() {
        let t = XmlElement::new("w:t").with_text("a < b");
        assert_eq!(t.plain_text().as_deref(), Some("a < b"));
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!(XmlDocument::parse("x.xml", "<a><b></a>").is_err());
        assert!(XmlDocument::parse("x.xml", "").is_err());
    }
}
