use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlError {
    #[error("malformed xml: {0}")]
    Malformed(String),
    #[error("document has no root element")]
    MissingRoot,
    #[error("unexpected closing tag </{0}>")]
    UnbalancedClose(String),
    #[error("element <{0}> is never closed")]
    Unclosed(String),
    #[error("invalid utf-8 in {0}")]
    Utf8(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

/// An owned XML element with ordered attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text_content(text);
        self
    }

    pub fn with_cdata(mut self, text: impl Into<String>) -> Self {
        self.children = vec![Node::CData(text.into())];
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Concatenated text of every descendant text and CDATA node.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// Replaces all children with a single text node.
    pub fn set_text_content(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.children.clear();
        if !text.is_empty() {
            self.children.push(Node::Text(text));
        }
    }

    /// Descendants named `tag`, in document order. The element itself is
    /// not included.
    pub fn elements_by_tag_name(&self, tag: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect_by_tag(self, tag, &mut found);
        found
    }

    pub fn element_by_tag_name(&self, tag: &str) -> Option<&Element> {
        find_first(self, &|element| element.name == tag)
    }

    pub fn element_by_tag_name_mut(&mut self, tag: &str) -> Option<&mut Element> {
        find_first_mut(self, &|element| element.name == tag)
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        find_first(self, &|element| element.attr("id") == Some(id))
    }

    pub fn element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.attr("id") == Some(id) {
            return Some(self);
        }
        find_first_mut(self, &|element| element.attr("id") == Some(id))
    }

    /// Detaches the first direct child named `tag`.
    pub fn remove_child_by_tag(&mut self, tag: &str) -> Option<Element> {
        let index = self
            .children
            .iter()
            .position(|node| matches!(node, Node::Element(element) if element.name == tag))?;
        match self.children.remove(index) {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            let _ = write!(out, " {key}=\"{}\"", encode_double_quoted_attribute(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(element) => element.write_to(out),
                Node::Text(text) => out.push_str(&encode_text(text)),
                Node::CData(text) => {
                    out.push_str("<![CDATA[");
                    out.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
                    out.push_str("]]>");
                }
            }
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Element(inner) => collect_text(inner, out),
            Node::Text(text) | Node::CData(text) => out.push_str(text),
        }
    }
}

fn collect_by_tag<'a>(element: &'a Element, tag: &str, found: &mut Vec<&'a Element>) {
    for child in element.child_elements() {
        if child.name == tag {
            found.push(child);
        }
        collect_by_tag(child, tag, found);
    }
}

fn find_first<'a>(element: &'a Element, matches: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    for child in element.child_elements() {
        if matches(child) {
            return Some(child);
        }
        if let Some(found) = find_first(child, matches) {
            return Some(found);
        }
    }
    None
}

fn find_first_mut<'a>(
    element: &'a mut Element,
    matches: &dyn Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    for node in element.children.iter_mut() {
        let Node::Element(child) = node else {
            continue;
        };
        if matches(child) {
            return Some(child);
        }
        if let Some(found) = find_first_mut(child, matches) {
            return Some(found);
        }
    }
    None
}

/// A parsed XML document. Only the root element is retained; prolog,
/// comments and processing instructions are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parses `source`. Whitespace-only text between elements is dropped;
    /// any other text keeps its leading and trailing whitespace.
    pub fn parse(source: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(source);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|err| XmlError::Malformed(err.to_string()))?;
            match event {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(end) => {
                    let name = std::str::from_utf8(end.name().as_ref())
                        .map_err(|_| XmlError::Utf8("closing tag"))?
                        .to_string();
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::UnbalancedClose(name.clone()))?;
                    if element.name != name {
                        return Err(XmlError::UnbalancedClose(name));
                    }
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|err| XmlError::Malformed(err.to_string()))?;
                    if value.trim().is_empty() {
                        continue;
                    }
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(value.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let value = String::from_utf8(data.into_inner().into_owned())
                        .map_err(|_| XmlError::Utf8("CDATA section"))?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::CData(value));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }
        root.map(Document::new).ok_or(XmlError::MissingRoot)
    }

    pub fn root_element(&self) -> &Element {
        &self.root
    }

    pub fn root_element_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.root.element_by_id(id)
    }

    pub fn element_by_id_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.root.element_by_id_mut(id)
    }

    pub fn serialize_to_string(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        self.root.write_to(&mut out);
        out
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| XmlError::Utf8("element name"))?
        .to_string();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| XmlError::Malformed(err.to_string()))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|_| XmlError::Utf8("attribute name"))?
            .to_string();
        let value = attribute
            .unescape_value()
            .map_err(|err| XmlError::Malformed(err.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::Malformed(format!(
            "second root element <{}>",
            element.name
        ))),
    }
}
