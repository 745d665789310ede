//! Document-level declarations.
//!
//! The direct children `<info>`, `<settings>`, `<deck>` and `<lexicon>` of
//! the `<lecture>` root configure a document. [`extract_meta`] reads them
//! into a [`Meta`] value, which stays read-only while the content is
//! compiled.

mod lexicon;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{MetaError, MetaIssue};
use crate::markup::Element;
use crate::model::{Fit, TagWarning};
use crate::pdf::PageCounter;
use crate::util::{is_file, normalize_path};

pub use lexicon::{Lexeme, LexemeKind, Lexicon};

/// Title used when `<info>` does not provide one.
pub const DEFAULT_TITLE: &str = "No Title";

/// Element names handled here and skipped by the compiler.
pub const META_TAGS: [&str; 4] = ["info", "settings", "deck", "lexicon"];

/// Document configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Meta {
    /// `<info>` attributes. Always has a `title`.
    pub info: BTreeMap<String, String>,
    pub settings: Settings,
    pub decks: BTreeMap<String, Deck>,
    /// Id of the deck shown first.
    pub active_deck: String,
    pub lexicons: Vec<Lexicon>,
    pub marks: Marks,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub warnings: Vec<TagWarning>,
}

impl Meta {
    pub fn title(&self) -> &str {
        self.info.get("title").map_or(DEFAULT_TITLE, String::as_str)
    }

    pub fn deck(&self, id: &str) -> Option<&Deck> {
        self.decks.get(id)
    }

    pub fn lexicon(&self, id: &str) -> Option<&Lexicon> {
        self.lexicons.iter().find(|l| l.id == id)
    }
}

/// `<settings>` attributes. Values stay strings; typed accessors parse them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(transparent))]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// A setting written as a (possibly negative) decimal integer.
    pub fn int(&self, key: &str) -> Option<i64> {
        let value = self.get(key)?;
        let digits = value.strip_prefix('-').unwrap_or(value);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        value.parse().ok()
    }

    /// A setting written as `true` or `false`.
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// The document's default voice, `voice` or its alias `defaultVoice`.
    pub fn voice(&self) -> Option<&str> {
        self.get("voice")
            .or_else(|| self.get("defaultVoice"))
            .filter(|v| !v.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A slide deck declared with `<deck>`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Deck {
    pub id: String,
    /// `src` as written in the script.
    pub source: String,
    /// Absolute path of the PDF file.
    pub file_path: PathBuf,
    /// Always at least 1.
    pub page_count: u32,
    pub fit: Fit,
}

/// Bookmarks bounding the rendered part of a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Marks {
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub startmark: Option<String>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub endmark: Option<String>,
}

/// Read the declarations of a `<lecture>` document.
///
/// Invalid declarations are skipped with a warning. Cardinality problems
/// (several `<info>` or `<settings>` tags, no usable deck, not exactly one
/// active deck) are collected and returned together, without a partial
/// result.
pub async fn extract_meta(
    root: &Element,
    script_dir: &Path,
    pages: &dyn PageCounter,
) -> Result<Meta, MetaError> {
    if root.name != "lecture" {
        return Err(MetaError {
            issues: vec![MetaIssue::UnexpectedRoot(root.name.clone())],
        });
    }

    let mut info = BTreeMap::new();
    info.insert("title".to_string(), DEFAULT_TITLE.to_string());

    let mut meta = Meta {
        info,
        settings: Settings::default(),
        decks: BTreeMap::new(),
        active_deck: String::new(),
        lexicons: Vec::new(),
        marks: Marks {
            startmark: root.non_empty_attr("startmark").map(str::to_string),
            endmark: root.non_empty_attr("endmark").map(str::to_string),
        },
        warnings: Vec::new(),
    };

    let mut info_tags = 0;
    let mut settings_tags = 0;
    let mut active_decks = 0;

    for tag in root.child_elements() {
        match tag.name.as_str() {
            "info" => {
                info_tags += 1;
                copy_attributes(tag, &mut meta.warnings, |k, v| {
                    meta.info.insert(k.to_string(), v.to_string());
                });
            }
            "settings" => {
                settings_tags += 1;
                copy_attributes(tag, &mut meta.warnings, |k, v| meta.settings.insert(k, v));
            }
            "deck" => {
                if let Some(deck) = read_deck(tag, script_dir, pages, &mut meta).await {
                    if tag.attr("active") == Some("true") {
                        active_decks += 1;
                        meta.active_deck = deck.id.clone();
                    }
                    log::info!(
                        "Initialised slide deck \"{}\" ({} pages) with the id \"{}\"",
                        deck.source,
                        deck.page_count,
                        deck.id
                    );
                    meta.decks.insert(deck.id.clone(), deck);
                }
            }
            "lexicon" => {
                if let Some(lexicon) = lexicon::parse_lexicon(tag, &mut meta.warnings) {
                    if meta.lexicon(&lexicon.id).is_some() {
                        meta.warnings.push(TagWarning::emit(
                            "lexicon",
                            format!(
                                "ignored <lexicon xml:id=\"{}\"> because a lexicon with the same id already exists",
                                lexicon.id
                            ),
                        ));
                    } else {
                        meta.lexicons.push(lexicon);
                    }
                }
            }
            _ => {}
        }
    }

    let mut issues = Vec::new();
    if info_tags > 1 {
        issues.push(MetaIssue::MultipleInfo);
    }
    if settings_tags > 1 {
        issues.push(MetaIssue::MultipleSettings);
    }
    if meta.decks.is_empty() {
        issues.push(MetaIssue::NoDecks);
    } else if active_decks == 0 {
        issues.push(MetaIssue::NoActiveDeck);
    } else if active_decks > 1 {
        issues.push(MetaIssue::MultipleActiveDecks);
    }

    if !issues.is_empty() {
        for issue in &issues {
            log::error!("{issue}");
        }
        return Err(MetaError { issues });
    }

    Ok(meta)
}

fn copy_attributes(
    tag: &Element,
    warnings: &mut Vec<TagWarning>,
    mut insert: impl FnMut(&str, &str),
) {
    if tag.attributes.is_empty() {
        warnings.push(TagWarning::emit(
            tag.name.as_str(),
            "ignored tag with no attributes",
        ));
        return;
    }
    for (key, value) in &tag.attributes {
        insert(key, value);
    }
}

/// Validate a `<deck>` tag. Returns `None` (with a warning) if it is unusable.
async fn read_deck(
    tag: &Element,
    script_dir: &Path,
    pages: &dyn PageCounter,
    meta: &mut Meta,
) -> Option<Deck> {
    let warnings = &mut meta.warnings;

    let Some(id) = tag.non_empty_attr("id") else {
        warnings.push(TagWarning::emit(
            "deck",
            "ignored a <deck id=\"\"> tag with no defined id",
        ));
        return None;
    };

    if meta.decks.contains_key(id) {
        warnings.push(TagWarning::emit(
            "deck",
            format!("ignored <deck id=\"{id}\"> because a deck with the same id already exists"),
        ));
        return None;
    }

    let Some(source) = tag.non_empty_attr("src") else {
        warnings.push(TagWarning::emit(
            "deck",
            format!("ignored <deck id=\"{id}\" src=\"\"> with no defined source file"),
        ));
        return None;
    };

    let file_path = normalize_path(source, script_dir);
    let is_pdf = file_path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        warnings.push(TagWarning::emit(
            "deck",
            format!("ignored <deck id=\"{id}\" src=\"{source}\"> with a non-PDF file as source"),
        ));
        return None;
    }
    if !is_file(&file_path, Some("pdf")) {
        warnings.push(TagWarning::emit(
            "deck",
            format!(
                "ignored <deck id=\"{id}\" src=\"{source}\"> as the file does not exist at \"{}\"",
                file_path.display()
            ),
        ));
        return None;
    }

    let page_count = match pages.count_pages(&file_path).await {
        Ok(0) => {
            warnings.push(TagWarning::emit(
                "deck",
                format!("ignored <deck id=\"{id}\" src=\"{source}\"> with no pages"),
            ));
            return None;
        }
        Ok(n) => n,
        Err(e) => {
            warnings.push(TagWarning::emit(
                "deck",
                format!("ignored <deck id=\"{id}\" src=\"{source}\">, could not count its pages: {e}"),
            ));
            return None;
        }
    };

    Some(Deck {
        id: id.to_string(),
        source: source.to_string(),
        file_path,
        page_count,
        fit: tag.attr("fit").and_then(Fit::parse).unwrap_or_default(),
    })
}
