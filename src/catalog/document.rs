//! Tree-structured catalog documents.
//!
//! The resolver only needs element names, attributes, and text content, so the XML
//! is read once into a plain owned tree of [`DocNode`]s. Whitespace-only text is
//! dropped; text split around comments or CDATA is concatenated.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::core::{Error, Result, Vec3};

/// One element of a catalog document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<DocNode>,
}

impl DocNode {
    /// Create an element with no attributes, text or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a document and return its root element.
    pub fn parse_str(xml: &str) -> Result<DocNode> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<DocNode> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    let node = Self::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, node);
                }
                Event::End(_) => {
                    if let Some(node) = stack.pop() {
                        Self::attach(&mut stack, &mut root, node);
                    }
                }
                Event::Text(t) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(t.unescape()?.trim());
                    }
                }
                Event::CData(c) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(String::from_utf8_lossy(&c.into_inner()).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml(format!("unclosed element <{}>", stack[stack.len() - 1].name)));
        }
        root.ok_or_else(|| Error::Xml("document has no root element".into()))
    }

    /// Read and parse a document from disk.
    pub fn parse_file(path: &Path) -> Result<DocNode> {
        let xml = std::fs::read_to_string(path)?;
        Self::parse_str(&xml)
    }

    fn from_start(e: &BytesStart<'_>) -> Result<DocNode> {
        let mut node = DocNode::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    fn attach(stack: &mut [DocNode], root: &mut Option<DocNode>, node: DocNode) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                // Only the first top-level element counts
                if root.is_none() {
                    *root = Some(node);
                }
            }
        }
    }

    /// Builder helper: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder helper: set text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder helper: append a child.
    pub fn with_child(mut self, child: DocNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Text content, `None` when empty.
    pub fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }

    /// First child with the given element name.
    pub fn child(&self, name: &str) -> Option<&DocNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given element name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DocNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// All children whose element name starts with `prefix` (`submesh*`, `cell*`).
    pub fn children_prefixed<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a DocNode> + 'a {
        self.children.iter().filter(move |c| c.name.starts_with(prefix))
    }

    /// Follow a `/`-separated path of child names, taking the first match at each step.
    pub fn path(&self, path: &str) -> Option<&DocNode> {
        path.split('/').try_fold(self, |node, step| node.child(step))
    }

    /// The `name` attribute, required on every catalog entity.
    pub fn require_name(&self) -> Result<&str> {
        self.attr("name")
            .ok_or_else(|| Error::catalog(&self.name, "missing required attribute 'name'"))
    }

    /// Required child element.
    pub fn require_child(&self, name: &str) -> Result<&DocNode> {
        self.child(name).ok_or_else(|| {
            Error::catalog(
                &self.name,
                format!("'{}' is missing required child <{}>", self.attr("name").unwrap_or("?"), name),
            )
        })
    }

    /// Required text content.
    pub fn require_text(&self) -> Result<&str> {
        self.text()
            .ok_or_else(|| Error::catalog(&self.name, "missing required text content"))
    }

    /// Required float attribute.
    pub fn f32_attr(&self, key: &str) -> Result<f32> {
        let raw = self
            .attr(key)
            .ok_or_else(|| Error::catalog(&self.name, format!("missing attribute '{}'", key)))?;
        raw.trim()
            .parse::<f32>()
            .map_err(|_| Error::catalog(&self.name, format!("attribute '{}' is not a number: '{}'", key, raw)))
    }

    /// `x`, `y`, `z` attributes as a vector.
    pub fn vec3_attrs(&self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32_attr("x")?, self.f32_attr("y")?, self.f32_attr("z")?))
    }

    /// `red`, `green`, `blue` attributes as a color.
    pub fn color_attrs(&self) -> Result<Vec3> {
        Ok(Vec3::new(
            self.f32_attr("red")?,
            self.f32_attr("green")?,
            self.f32_attr("blue")?,
        ))
    }

    /// Text content parsed as a float.
    pub fn f32_text(&self) -> Result<f32> {
        let raw = self.require_text()?;
        raw.trim()
            .parse::<f32>()
            .map_err(|_| Error::catalog(&self.name, format!("content is not a number: '{}'", raw)))
    }
}
