//! Script text to markup tree.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Element, MarkupNode};
use crate::error::{Error, Result};

/// Parse a script into its root element.
///
/// Comments, CDATA sections, processing instructions, declarations and
/// doctypes are skipped. Whitespace-only text between elements is dropped;
/// all other text is kept verbatim, with entity references resolved.
pub fn parse(xml: &str) -> Result<Element> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                flush_text(&mut stack, &mut text);
                stack.push(element_from(&e)?);
            }
            Event::Empty(e) => {
                flush_text(&mut stack, &mut text);
                let element = element_from(&e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                flush_text(&mut stack, &mut text);
                // Mismatched end tags are rejected by the reader itself
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::InvalidScript("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(e) => {
                if !stack.is_empty() {
                    text.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::GeneralRef(e) => {
                if !stack.is_empty() {
                    let entity = String::from_utf8_lossy(e.as_ref());
                    let resolved = resolve_entity(&entity).ok_or_else(|| {
                        Error::InvalidScript(format!("unknown entity reference &{entity};"))
                    })?;
                    text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::InvalidScript(format!("unclosed element <{}>", open.name)));
    }

    root.ok_or_else(|| Error::InvalidScript("document has no root element".into()))
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = quick_xml::escape::unescape(&raw).map_err(|e| {
            Error::InvalidScript(format!(
                "invalid value for attribute {key} on <{}>: {e}",
                element.name
            ))
        })?;
        element.set_attr(key, value.into_owned());
    }

    Ok(element)
}

/// Append pending text to the innermost open element.
fn flush_text(stack: &mut [Element], text: &mut String) {
    if text.trim().is_empty() {
        text.clear();
        return;
    }
    if let Some(parent) = stack.last_mut() {
        parent.children.push(MarkupNode::Text(std::mem::take(text)));
    }
}

/// Attach a completed element to its parent, or make it the root.
fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(MarkupNode::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(Error::InvalidScript(format!(
                "multiple root elements: <{}> follows the document root",
                element.name
            )));
        }
    }
    Ok(())
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    let code = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };

    char::from_u32(code).map(|c| c.to_string())
}
