//! In-progress section content.

use crate::markup::{Element, MarkupNode, tidy_section_content, to_markup_string};

/// Markup collected since the last section boundary.
///
/// Holds the chain of currently open elements, outermost first. Each entry
/// carries the children completed so far; an element is attached to its
/// parent when it closes. The outermost element (the `<speak>` wrapper) is
/// never closed.
#[derive(Debug, Clone)]
pub(super) struct ContentBuffer {
    open: Vec<Element>,
}

impl ContentBuffer {
    pub fn new(root: &Element) -> Self {
        Self {
            open: vec![root.shallow_clone()],
        }
    }

    /// Append text to the innermost open element.
    pub fn push_text(&mut self, text: &str) {
        if let Some(parent) = self.open.last_mut() {
            parent.children.push(MarkupNode::text(text));
        }
    }

    /// Open a copy of `element` (without its children) below the innermost
    /// open element.
    pub fn open_element(&mut self, element: &Element) {
        self.open.push(element.shallow_clone());
    }

    /// Close the innermost open element.
    pub fn close_element(&mut self) {
        if self.open.len() < 2 {
            return;
        }
        if let Some(done) = self.open.pop()
            && let Some(parent) = self.open.last_mut()
        {
            parent.children.push(MarkupNode::Element(done));
        }
    }

    /// Number of open elements, including the wrapper.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Whether any text has been collected since the last reset.
    pub fn has_text(&self) -> bool {
        self.open
            .iter()
            .any(|el| el.children.iter().any(MarkupNode::contains_text))
    }

    /// Drop everything collected, keeping the open elements so that
    /// following content nests the same way.
    pub fn reset(&mut self) {
        for el in &mut self.open {
            el.children.clear();
        }
    }

    /// The collected content as one tree, with open elements closed.
    pub fn snapshot(&self) -> Element {
        let mut open = self.open.iter().rev();
        let mut tree = open.next().cloned().unwrap_or_default();
        for parent in open {
            let mut parent = parent.clone();
            parent.children.push(MarkupNode::Element(tree));
            tree = parent;
        }
        tree
    }

    /// Serialize the collected content for a speech section.
    pub fn render(&self) -> String {
        tidy_section_content(&to_markup_string(&self.snapshot().into()))
    }
}
