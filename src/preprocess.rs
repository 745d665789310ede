//! Script rewrites applied between reading the declarations and compiling.
//!
//! ## Pipeline Order
//!
//! 1. **Lookups** - `<lookup ref>` scopes are unwrapped and their words are
//!    spoken through the referenced lexicons as `<sub>` or `<phoneme>`
//! 2. **Tag conversion** - `<token>` becomes `<w>`
//! 3. **Slide breaks** - A `<break>` follows every `<slide>`
//! 4. **Paragraph breaks** - A `<break>` at line breaks inside text
//!
//! Passes 1 to 3 share one walk over the tree. Break passes are disabled
//! when their duration is 0.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Config;
use crate::markup::{Element, MarkupNode};
use crate::meta::{Lexeme, LexemeKind, Lexicon, META_TAGS, Meta, Settings};
use crate::model::TagWarning;

/// A run of whitespace holding at least one line break. The first line
/// break is captured.
static LINE_BREAK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\r\n]*(\r\n|\n|\r)\s*").unwrap());

/// Pauses inserted into the script, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Breaks {
    pub after_slide: u32,
    pub after_paragraph: u32,
}

impl Breaks {
    /// `breakAfterSlide` and `breakAfterParagraph` from the document
    /// settings, else the configured defaults.
    pub fn resolve(settings: &Settings, config: &Config, warnings: &mut Vec<TagWarning>) -> Self {
        Self {
            after_slide: break_setting(
                settings,
                "breakAfterSlide",
                config.default_break_after_slide,
                warnings,
            ),
            after_paragraph: break_setting(
                settings,
                "breakAfterParagraph",
                config.default_break_after_paragraph,
                warnings,
            ),
        }
    }
}

fn break_setting(
    settings: &Settings,
    key: &str,
    default: u32,
    warnings: &mut Vec<TagWarning>,
) -> u32 {
    let Some(value) = settings.get(key) else {
        return default;
    };
    match settings.int(key).and_then(|ms| u32::try_from(ms).ok()) {
        Some(ms) => ms,
        None => {
            warnings.push(TagWarning::emit(
                "settings",
                format!("ignored {key}=\"{value}\" as it is not a non-negative integer"),
            ));
            default
        }
    }
}

/// Rewrite a `<lecture>` tree for compilation.
///
/// Returns the rewritten tree with the warnings raised on the way. Problems
/// never fail the document: a `<lookup>` naming no known lexicon is dropped
/// and its content kept as written.
pub fn preprocess(mut lecture: Element, meta: &Meta, config: &Config) -> (Element, Vec<TagWarning>) {
    let mut warnings = Vec::new();
    let breaks = Breaks::resolve(&meta.settings, config, &mut warnings);

    let mut rewriter = Rewriter {
        lexicons: &meta.lexicons,
        after_slide: breaks.after_slide,
        warnings,
    };
    let children = std::mem::take(&mut lecture.children);
    lecture.children = rewriter.rewrite(children, &[], false);

    if breaks.after_paragraph > 0 {
        add_paragraph_breaks(&mut lecture, breaks.after_paragraph);
    }
    (lecture, rewriter.warnings)
}

fn break_element(ms: u32) -> Element {
    Element::new("break").with_attr("time", format!("{ms}ms"))
}

/// Whether text inside this element is already a pronunciation.
fn is_spoken_form(name: &str) -> bool {
    matches!(name, "sub" | "phoneme")
}

// ============================================================================
// Passes 1-3: lookups, tag conversion, slide breaks
// ============================================================================

struct Rewriter<'m> {
    lexicons: &'m [Lexicon],
    after_slide: u32,
    warnings: Vec<TagWarning>,
}

impl<'m> Rewriter<'m> {
    /// Rewrite sibling nodes. `active` holds the lexicons of the enclosing
    /// lookups, innermost first.
    fn rewrite(
        &mut self,
        nodes: Vec<MarkupNode>,
        active: &[&'m Lexicon],
        spoken: bool,
    ) -> Vec<MarkupNode> {
        let mut out = Vec::with_capacity(nodes.len());
        let mut nodes = nodes.into_iter().peekable();

        while let Some(node) = nodes.next() {
            let mut el = match node {
                MarkupNode::Text(text) if !spoken && !active.is_empty() => {
                    out.extend(apply_lexicons(text, active));
                    continue;
                }
                MarkupNode::Text(text) => {
                    out.push(MarkupNode::Text(text));
                    continue;
                }
                MarkupNode::Element(el) => el,
            };

            if META_TAGS.contains(&el.name.as_str()) {
                out.push(el.into());
                continue;
            }
            if el.name == "lookup" {
                out.extend(self.lookup(el, active, spoken));
                continue;
            }
            if el.name == "token" {
                el.name = "w".to_string();
            }

            let children = std::mem::take(&mut el.children);
            el.children = self.rewrite(children, active, spoken || is_spoken_form(&el.name));

            let slide = el.name == "slide";
            out.push(el.into());
            if slide && self.after_slide > 0 && !is_break(nodes.peek()) {
                out.push(break_element(self.after_slide).into());
            }
        }
        out
    }

    /// The content of a `<lookup>`, rewritten with its lexicon in scope.
    fn lookup(&mut self, el: Element, active: &[&'m Lexicon], spoken: bool) -> Vec<MarkupNode> {
        let lexicon = match el.non_empty_attr("ref") {
            None => {
                self.warnings.push(TagWarning::emit(
                    "lookup",
                    "removed a <lookup ref=\"\"> tag with no lexicon reference",
                ));
                None
            }
            Some(id) => {
                let lexicon = self.lexicons.iter().find(|l| l.id == id);
                if lexicon.is_none() {
                    self.warnings.push(TagWarning::emit(
                        "lookup",
                        format!("removed <lookup ref=\"{id}\"> because no lexicon \"{id}\" exists"),
                    ));
                }
                lexicon
            }
        };

        let scope: Vec<&'m Lexicon> = lexicon.into_iter().chain(active.iter().copied()).collect();
        self.rewrite(el.children, &scope, spoken)
    }
}

fn is_break(node: Option<&MarkupNode>) -> bool {
    node.and_then(MarkupNode::as_element)
        .is_some_and(|el| el.name == "break")
}

/// Replace the graphemes of the active lexicons in `text`. The first
/// lexicon defining a grapheme wins.
fn apply_lexicons(text: String, active: &[&Lexicon]) -> Vec<MarkupNode> {
    let mut pieces = vec![MarkupNode::Text(text)];
    let mut seen = HashSet::new();

    for lexicon in active {
        for lexeme in &lexicon.lexemes {
            if lexeme.grapheme.is_empty() || !seen.insert(lexeme.grapheme.as_str()) {
                continue;
            }
            pieces = pieces
                .into_iter()
                .flat_map(|piece| match piece {
                    MarkupNode::Text(text) => {
                        replace_grapheme(text, lexeme, lexicon.alphabet.as_deref())
                    }
                    element => vec![element],
                })
                .collect();
        }
    }
    pieces
}

/// Split `text` around whole-word occurrences of a lexeme's grapheme.
fn replace_grapheme(text: String, lexeme: &Lexeme, alphabet: Option<&str>) -> Vec<MarkupNode> {
    let grapheme = lexeme.grapheme.as_str();
    let mut pieces = Vec::new();
    let mut rest = 0;

    for (start, _) in text.match_indices(grapheme) {
        let end = start + grapheme.len();
        if !is_word_edge(text[..start].chars().next_back()) || !is_word_edge(text[end..].chars().next())
        {
            continue;
        }
        if start > rest {
            pieces.push(MarkupNode::text(&text[rest..start]));
        }
        pieces.push(spoken_form(lexeme, alphabet).into());
        rest = end;
    }

    if pieces.is_empty() {
        return vec![MarkupNode::Text(text)];
    }
    if rest < text.len() {
        pieces.push(MarkupNode::text(&text[rest..]));
    }
    pieces
}

/// Text edges, whitespace and punctuation delimit a grapheme.
fn is_word_edge(c: Option<char>) -> bool {
    c.is_none_or(|c| c.is_whitespace() || c.is_ascii_punctuation() || matches!(c, '§' | '°'))
}

fn spoken_form(lexeme: &Lexeme, alphabet: Option<&str>) -> Element {
    let el = match lexeme.kind {
        LexemeKind::Alias => Element::new("sub").with_attr("alias", &lexeme.replacement),
        LexemeKind::Phoneme => {
            let mut el = Element::new("phoneme");
            if let Some(alphabet) = alphabet {
                el.set_attr("alphabet", alphabet);
            }
            el.with_attr("ph", &lexeme.replacement)
        }
    };
    el.with_text(&lexeme.grapheme)
}

// ============================================================================
// Pass 4: paragraph breaks
// ============================================================================

fn add_paragraph_breaks(el: &mut Element, ms: u32) {
    if is_spoken_form(&el.name) || META_TAGS.contains(&el.name.as_str()) {
        return;
    }
    for child in std::mem::take(&mut el.children) {
        match child {
            MarkupNode::Text(text) => el.children.extend(split_at_line_breaks(text, ms)),
            MarkupNode::Element(mut child) => {
                add_paragraph_breaks(&mut child, ms);
                el.children.push(child.into());
            }
        }
    }
}

/// Insert a break after the first line break of every whitespace run that
/// sits between two words of `text`.
fn split_at_line_breaks(text: String, ms: u32) -> Vec<MarkupNode> {
    let cuts: Vec<usize> = LINE_BREAK_RUN
        .captures_iter(&text)
        .filter_map(|caps| {
            let run = caps.get(0)?;
            let line_break = caps.get(1)?;
            (run.start() > 0 && run.end() < text.len()).then_some(line_break.end())
        })
        .collect();
    if cuts.is_empty() {
        return vec![MarkupNode::Text(text)];
    }

    let mut pieces = Vec::with_capacity(cuts.len() * 2 + 1);
    let mut start = 0;
    for cut in cuts {
        pieces.push(MarkupNode::text(&text[start..cut]));
        pieces.push(break_element(ms).into());
        start = cut;
    }
    pieces.push(MarkupNode::text(&text[start..]));
    pieces
}
