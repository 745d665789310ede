//! Markup tree for lecture scripts.
//!
//! A script is parsed into a plain owned tree of [`MarkupNode`]s:
//! - Elements with a qualified name, attributes in source order and children
//! - Text leaves holding unescaped character data
//!
//! The same tree type is used for the content collected into SSML sections,
//! which is serialized back with [`to_markup_string`].
//!
//! # Example
//!
//! ```
//! use lsml::markup::{parse, to_markup_string, Element, MarkupNode};
//!
//! let root = parse("<speak>Hello <emphasis level=\"strong\">world</emphasis></speak>").unwrap();
//! assert_eq!(root.name, "speak");
//! assert!(MarkupNode::Element(root.clone()).contains_text());
//!
//! let rebuilt = Element::new("speak")
//!     .with_text("Hello ")
//!     .with_child(Element::new("emphasis").with_attr("level", "strong").with_text("world"));
//! assert_eq!(to_markup_string(&rebuilt.into()), to_markup_string(&root.into()));
//! ```

mod parse;
mod serialize;

pub use parse::parse;
pub use serialize::{count_markup_characters, tidy_section_content, to_markup_string};

/// A node in a markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

impl MarkupNode {
    /// Create a text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        MarkupNode::Text(value.into())
    }

    /// The element, if this node is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            MarkupNode::Element(el) => Some(el),
            MarkupNode::Text(_) => None,
        }
    }

    /// Whether this node is, or contains, at least one text leaf.
    pub fn contains_text(&self) -> bool {
        match self {
            MarkupNode::Text(_) => true,
            MarkupNode::Element(el) => el.children.iter().any(MarkupNode::contains_text),
        }
    }
}

impl From<Element> for MarkupNode {
    fn from(el: Element) -> Self {
        MarkupNode::Element(el)
    }
}

/// An element with attributes and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Qualified name as written, e.g. `voice` or `amazon:effect`.
    pub name: String,
    /// Attributes in source order. Names are unique within an element.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute, replacing an existing one of the same name.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(MarkupNode::Element(child));
        self
    }

    /// Builder: append a text leaf.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(MarkupNode::Text(text.into()));
        self
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Look up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up an attribute, treating an empty value as absent.
    pub fn non_empty_attr(&self, name: &str) -> Option<&str> {
        self.attr(name).filter(|v| !v.is_empty())
    }

    /// Iterate over child elements, skipping text.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(MarkupNode::as_element)
    }

    /// A copy of this element with its name and attributes but no children.
    pub fn shallow_clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }
}
