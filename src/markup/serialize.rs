//! Markup tree to text.

use std::sync::LazyLock;

use quick_xml::escape::{escape, partial_escape};
use regex::Regex;

use super::{Element, MarkupNode};

/// Any tag, including the angle brackets.
static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());

/// Whitespace in front of an inline SSML tag, which should read as one space.
static SPACE_BEFORE_INLINE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\s+(<(?:mark|s|token|w|emphasis|break|prosody|say-as|sub|lang|phoneme|amazon:domain|amazon:effect|amazon:emotion)[\s/>])",
    )
    .unwrap()
});

/// Indentation following a line break.
static INDENT_AFTER_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\r\n]+)[ \t]+").unwrap());

/// Serialize a markup tree without adding any whitespace.
///
/// Text is escaped (`&`, `<`, `>`), attribute values are fully escaped and
/// elements without children are written self-closed, so parsing the output
/// reproduces the tree.
///
/// # Examples
///
/// ```
/// use lsml::markup::{to_markup_string, Element};
///
/// let el = Element::new("speak")
///     .with_text("Q&A ")
///     .with_child(Element::new("break").with_attr("time", "1s"));
/// assert_eq!(
///     to_markup_string(&el.into()),
///     r#"<speak>Q&amp;A <break time="1s"/></speak>"#
/// );
/// ```
pub fn to_markup_string(node: &MarkupNode) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &MarkupNode, out: &mut String) {
    match node {
        MarkupNode::Text(text) => out.push_str(&partial_escape(text.as_str())),
        MarkupNode::Element(el) => write_element(el, out),
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }

    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &el.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

/// Count the characters taken up by tags in a markup string.
///
/// # Examples
///
/// ```
/// use lsml::markup::count_markup_characters;
///
/// assert_eq!(count_markup_characters("<a>test</a>"), 7);
/// assert_eq!(count_markup_characters(r#"<a c="d">test<b></b>test</a>"#), 20);
/// ```
pub fn count_markup_characters(markup: &str) -> usize {
    MARKUP_TAG
        .find_iter(markup)
        .map(|m| m.as_str().chars().count())
        .sum()
}

/// Tidy serialized section content for speech synthesis.
///
/// Whitespace in front of inline SSML tags collapses to a single space, and
/// indentation after line breaks is removed.
pub fn tidy_section_content(markup: &str) -> String {
    let collapsed = SPACE_BEFORE_INLINE_TAG.replace_all(markup, " $1");
    INDENT_AFTER_NEWLINE.replace_all(&collapsed, "$1").into_owned()
}
