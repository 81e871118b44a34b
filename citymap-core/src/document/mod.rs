mod palette;
mod postprocess;

pub use palette::Palette;
pub use postprocess::{
    LabelStyle, LayerSignatures, PostProcessOptions, adjust_viewport, flatten_indirection,
    inject_label, postprocess, relayer,
};

use crate::error::DocumentError;

use std::fmt::{Display, Formatter};

use quick_xml::{Reader, escape::escape, events::BytesStart, events::Event};

/// A node of a parsed vector document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Display) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Replaces the value in place, keeping attribute order.
    pub fn set_attr(&mut self, name: &str, value: impl Display) {
        let value = value.to_string();

        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, current)) => *current = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;

        Some(self.attributes.remove(index).1)
    }

    /// A presentation property, with `style` declarations taking precedence
    /// over the attribute of the same name.
    pub fn paint(&self, property: &str) -> Option<&str> {
        self.style_property(property).or_else(|| self.attr(property))
    }

    fn style_property(&self, property: &str) -> Option<&str> {
        self.attr("style")?
            .split(';')
            .filter_map(|declaration| declaration.split_once(':'))
            .find(|(key, _)| key.trim() == property)
            .map(|(_, value)| value.trim())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn has_child_elements(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Depth-first search below this element.
    pub fn contains_descendant(&self, name: &str) -> bool {
        self.child_elements()
            .any(|child| child.name == name || child.contains_descendant(name))
    }

    pub fn text_content(&self) -> String {
        let mut text = String::new();

        for node in self.children.iter() {
            match node {
                Node::Text(content) | Node::CData(content) => text.push_str(content),
                Node::Element(element) => text.push_str(&element.text_content()),
                Node::Comment(_) => {}
            }
        }

        text
    }

    fn from_start(start: &BytesStart) -> Result<Self, DocumentError> {
        let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));

        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let value = attribute
                .unescape_value()
                .map_err(quick_xml::Error::from)?;

            element.attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(element)
    }

    fn write_to(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);

        for (key, value) in self.attributes.iter() {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for child in self.children.iter() {
            match child {
                Node::Element(element) => element.write_to(out),
                Node::Text(text) => out.push_str(&escape(text.as_str())),
                Node::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                }
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

/// An owned vector document, mutated in place by the post-processing steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    root: Element,
}

impl SvgDocument {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut open: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(start) => open.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    Self::attach(&mut open, &mut root, element);
                }
                Event::End(end) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();

                    match open.pop() {
                        Some(element) if element.name == name => {
                            Self::attach(&mut open, &mut root, element)
                        }
                        _ => return Err(DocumentError::Unbalanced(name)),
                    }
                }
                Event::Text(text) => {
                    if let Some(parent) = open.last_mut() {
                        let content = text.unescape().map_err(quick_xml::Error::from)?;
                        parent.children.push(Node::Text(content.into_owned()));
                    }
                }
                Event::CData(data) => {
                    if let Some(parent) = open.last_mut() {
                        let content = String::from_utf8_lossy(&data.into_inner()).into_owned();
                        parent.children.push(Node::CData(content));
                    }
                }
                Event::Comment(comment) => {
                    if let Some(parent) = open.last_mut() {
                        let content = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                        parent.children.push(Node::Comment(content));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(unclosed) = open.pop() {
            return Err(DocumentError::Unbalanced(unclosed.name));
        }

        match root {
            Some(root) if root.name == "svg" => Ok(SvgDocument { root }),
            _ => Err(DocumentError::MissingRoot),
        }
    }

    // Only the first top-level element becomes the root.
    fn attach(open: &mut [Element], root: &mut Option<Element>, element: Element) {
        match open.last_mut() {
            Some(parent) => parent.children.push(Node::Element(element)),
            None => {
                if root.is_none() {
                    *root = Some(element);
                }
            }
        }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }
}

impl Display for SvgDocument {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        self.root.write_to(&mut out);

        f.write_str(&out)
    }
}
