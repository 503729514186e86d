//! Minimal owned XML element tree.
//!
//! EDMX documents are read once with `quick_xml`'s event reader into this
//! tree; the schema compiler then walks it. Callers holding an already-parsed
//! document can build the same tree directly.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::schema::errors::SchemaError;

/// Element with its local name, attributes, children and concatenated text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local name without namespace prefix.
    pub name: String,
    /// Attributes by local name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
    /// Text content directly inside the element.
    pub text: String,
}

impl XmlElement {
    /// Empty element named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    pub fn attr_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Appends a child element.
    pub fn child_element(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Attribute value by local name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attribute value that must be present.
    pub fn required_attr(&self, key: &'static str) -> Result<&str, SchemaError> {
        self.attr(key).ok_or_else(|| SchemaError::MissingAttribute {
            element: self.name.clone(),
            attribute: key,
        })
    }

    /// Boolean attribute; anything but `true` (case-insensitive) is false.
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.attr(key).map(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Parses a document and returns its root element.
    pub fn parse(text: &str) -> Result<XmlElement, SchemaError> {
        let mut reader = Reader::from_str(text);
        reader.trim_text(true);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| SchemaError::shape("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&text.unescape()?);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if let Some(open) = stack.last() {
            return Err(SchemaError::shape(format!(
                "document ends inside <{}>",
                open.name
            )));
        }
        root.ok_or_else(|| SchemaError::shape("document has no root element"))
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, SchemaError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.local_name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), SchemaError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(SchemaError::shape("document has more than one root element")),
    }
}
