//! Per-backend character budgets of speech sections.

use std::fmt;

use crate::markup::count_markup_characters;
use crate::model::{Section, TagWarning};
use crate::registry::{CharacterBudget, VoiceRegistry};

/// Which ceiling a section went over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "snake_case"))]
pub enum OverageKind {
    /// Full serialized length.
    Combined,
    /// Characters inside tags.
    Markup,
    /// Characters outside tags.
    Text,
}

/// A section that is too long for its voice's backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct BudgetViolation {
    pub section_id: usize,
    pub kind: OverageKind,
    pub length: usize,
    pub limit: usize,
    /// `length - limit`
    pub amount: usize,
}

impl BudgetViolation {
    fn new(section_id: usize, kind: OverageKind, length: usize, limit: usize) -> Self {
        Self {
            section_id,
            kind,
            length,
            limit,
            amount: length - limit,
        }
    }
}

impl fmt::Display for BudgetViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            OverageKind::Combined => "characters",
            OverageKind::Markup => "markup characters",
            OverageKind::Text => "text characters",
        };
        write!(
            f,
            "section {} has {} {what}, {} over the limit of {}",
            self.section_id, self.length, self.amount, self.limit
        )
    }
}

/// Check one section's content against a budget.
pub fn check_content(section_id: usize, content: &str, budget: CharacterBudget) -> Vec<BudgetViolation> {
    let total = content.chars().count();
    match budget {
        CharacterBudget::Combined { limit } => {
            if total > limit {
                vec![BudgetViolation::new(section_id, OverageKind::Combined, total, limit)]
            } else {
                Vec::new()
            }
        }
        CharacterBudget::Split { markup, text } => {
            let markup_len = count_markup_characters(content);
            let text_len = total - markup_len;
            let mut violations = Vec::new();
            if markup_len > markup {
                violations.push(BudgetViolation::new(
                    section_id,
                    OverageKind::Markup,
                    markup_len,
                    markup,
                ));
            }
            if text_len > text {
                violations.push(BudgetViolation::new(section_id, OverageKind::Text, text_len, text));
            }
            violations
        }
    }
}

/// Check every speech section against its voice's backend.
///
/// Voices the registry cannot classify are reported as warnings and left
/// unchecked.
pub(super) async fn validate(
    sections: &[Section],
    registry: &dyn VoiceRegistry,
    warnings: &mut Vec<TagWarning>,
) -> Vec<BudgetViolation> {
    log::info!("Checking if all sections conform to the character limits of their voices");

    let mut violations = Vec::new();
    for section in sections {
        let (Some(voice), Some(content)) = (section.voice(), section.content()) else {
            continue;
        };

        let backend = match registry.voice_backend(voice).await {
            Ok(Some(backend)) => backend,
            Ok(None) => {
                warnings.push(TagWarning::emit(
                    "voice",
                    format!(
                        "section {} uses unknown voice \"{voice}\", its length was not checked",
                        section.id
                    ),
                ));
                continue;
            }
            Err(e) => {
                warnings.push(TagWarning::emit(
                    "voice",
                    format!("section {}: length not checked: {e}", section.id),
                ));
                continue;
            }
        };

        let Some(budget) = backend.budget() else {
            continue;
        };
        let found = check_content(section.id, content, budget);
        for violation in &found {
            log::error!("{violation} for {backend}");
        }
        violations.extend(found);
    }

    if violations.is_empty() {
        log::info!("All sections are within the character limits of their voices");
    } else {
        log::info!(
            "Shorten the listed sections or split them with <mark name=\"...\"/> tags"
        );
    }
    violations
}
