//! Pronunciation lexicons declared with `<lexicon>`.

use crate::markup::{Element, MarkupNode};
use crate::model::TagWarning;

/// A named set of pronunciation rules.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Lexicon {
    pub id: String,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub alphabet: Option<String>,
    pub lexemes: Vec<Lexeme>,
}

/// How a grapheme is spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Lexeme {
    pub grapheme: String,
    pub kind: LexemeKind,
    pub replacement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "lowercase"))]
pub enum LexemeKind {
    /// Replacement is a pronunciation in the lexicon's alphabet.
    Phoneme,
    /// Replacement is text spoken instead.
    Alias,
}

impl Lexicon {
    /// Add a lexeme, replacing an earlier one for the same grapheme.
    pub fn insert(&mut self, lexeme: Lexeme) {
        match self
            .lexemes
            .iter_mut()
            .find(|l| l.grapheme == lexeme.grapheme)
        {
            Some(existing) => *existing = lexeme,
            None => self.lexemes.push(lexeme),
        }
    }

    pub fn lookup(&self, grapheme: &str) -> Option<&Lexeme> {
        self.lexemes.iter().find(|l| l.grapheme == grapheme)
    }
}

/// Read a `<lexicon>` element.
///
/// Returns `None` (with warnings) when the lexicon has no id or no valid
/// lexemes.
pub(super) fn parse_lexicon(tag: &Element, warnings: &mut Vec<TagWarning>) -> Option<Lexicon> {
    let Some(id) = tag.non_empty_attr("xml:id") else {
        warnings.push(TagWarning::emit(
            "lexicon",
            "ignored a <lexicon xml:id=\"\"> tag with no defined id",
        ));
        return None;
    };

    let mut lexicon = Lexicon {
        id: id.to_string(),
        alphabet: tag.non_empty_attr("alphabet").map(str::to_string),
        lexemes: Vec::new(),
    };

    for element in tag.child_elements().filter(|e| e.name == "lexeme") {
        match parse_lexeme(element, warnings) {
            Some(lexeme) => lexicon.insert(lexeme),
            None => warnings.push(TagWarning::emit(
                "lexeme",
                format!("ignored a <lexeme> in lexicon \"{id}\" because its content is not valid"),
            )),
        }
    }

    if lexicon.lexemes.is_empty() {
        warnings.push(TagWarning::emit(
            "lexicon",
            format!("ignored <lexicon xml:id=\"{id}\"> with no valid lexemes"),
        ));
        return None;
    }

    log::info!(
        "Initialised lexicon \"{id}\" with {} lexemes",
        lexicon.lexemes.len()
    );
    Some(lexicon)
}

fn parse_lexeme(element: &Element, warnings: &mut Vec<TagWarning>) -> Option<Lexeme> {
    if element.children.len() != 2 || element.child_elements().count() != 2 {
        warnings.push(TagWarning::emit(
            "lexeme",
            "a <lexeme> must contain exactly two child tags",
        ));
        return None;
    }

    let mut grapheme = None;
    let mut replacement = None;

    for part in element.child_elements() {
        let kind = match part.name.as_str() {
            "grapheme" => None,
            "phoneme" => Some(LexemeKind::Phoneme),
            "alias" => Some(LexemeKind::Alias),
            other => {
                warnings.push(TagWarning::emit(
                    other,
                    "ignored tag inside <lexeme> as it is not a valid lexicon element",
                ));
                continue;
            }
        };

        let [MarkupNode::Text(text)] = part.children.as_slice() else {
            warnings.push(TagWarning::emit(
                part.name.as_str(),
                "ignored tag inside <lexeme> because it must contain only text",
            ));
            continue;
        };

        match kind {
            None => grapheme = Some(text.clone()),
            Some(kind) => replacement = Some((kind, text.clone())),
        }
    }

    let (kind, replacement) = replacement?;
    Some(Lexeme {
        grapheme: grapheme?,
        kind,
        replacement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse;

    fn lexicon(xml: &str) -> (Option<Lexicon>, Vec<TagWarning>) {
        let mut warnings = Vec::new();
        let lexicon = parse_lexicon(&parse(xml).unwrap(), &mut warnings);
        (lexicon, warnings)
    }

    #[test]
    fn test_parse_lexicon() {
        let (lexicon, warnings) = lexicon(
            r#"<lexicon xml:id="names" alphabet="ipa">
                <lexeme><grapheme>Nguyen</grapheme><phoneme>wɪn</phoneme></lexeme>
                <lexeme><grapheme>W3C</grapheme><alias>World Wide Web Consortium</alias></lexeme>
            </lexicon>"#,
        );
        assert!(warnings.is_empty());

        let lexicon = lexicon.unwrap();
        assert_eq!(lexicon.id, "names");
        assert_eq!(lexicon.alphabet.as_deref(), Some("ipa"));
        assert_eq!(lexicon.lexemes.len(), 2);
        let w3c = lexicon.lookup("W3C").unwrap();
        assert_eq!(w3c.kind, LexemeKind::Alias);
        assert_eq!(w3c.replacement, "World Wide Web Consortium");
    }

    #[test]
    fn test_duplicate_grapheme_overwrites() {
        let (lexicon, _) = lexicon(
            r#"<lexicon xml:id="x">
                <lexeme><grapheme>SQL</grapheme><alias>sequel</alias></lexeme>
                <lexeme><grapheme>SQL</grapheme><alias>S Q L</alias></lexeme>
            </lexicon>"#,
        );
        let lexicon = lexicon.unwrap();
        assert_eq!(lexicon.lexemes.len(), 1);
        assert_eq!(lexicon.lexemes[0].replacement, "S Q L");
    }

    #[test]
    fn test_invalid_lexemes_are_skipped() {
        let (lexicon, warnings) = lexicon(
            r#"<lexicon xml:id="x">
                <lexeme><grapheme>only one</grapheme></lexeme>
                <lexeme><grapheme>a</grapheme><grapheme>b</grapheme></lexeme>
                <lexeme><grapheme>c</grapheme><alias><b>bold</b></alias></lexeme>
                <lexeme><grapheme>ok</grapheme><alias>okay</alias></lexeme>
            </lexicon>"#,
        );
        let lexicon = lexicon.unwrap();
        assert_eq!(lexicon.lexemes.len(), 1);
        assert_eq!(lexicon.lexemes[0].grapheme, "ok");
        assert!(warnings.len() >= 3);
    }

    #[test]
    fn test_lexicon_without_id_or_lexemes_is_ignored() {
        let (missing_id, _) =
            lexicon(r#"<lexicon><lexeme><grapheme>a</grapheme><alias>b</alias></lexeme></lexicon>"#);
        assert!(missing_id.is_none());

        let (empty, warnings) = lexicon(r#"<lexicon xml:id="x"/>"#);
        assert!(empty.is_none());
        assert_eq!(warnings.len(), 1);
    }
}
