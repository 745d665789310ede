//! Error types for lsml operations.

use std::fmt;

use thiserror::Error;

use crate::compiler::BudgetViolation;

/// Errors that can occur while reading, extracting or compiling a script.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[cfg(feature = "cli")]
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A document-level configuration problem found by the meta extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaIssue {
    /// The document root is not `<lecture>`.
    UnexpectedRoot(String),
    MultipleInfo,
    MultipleSettings,
    NoDecks,
    NoActiveDeck,
    MultipleActiveDecks,
}

impl fmt::Display for MetaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaIssue::UnexpectedRoot(name) => {
                write!(f, "expected <lecture> as the root element, but got <{name}>")
            }
            MetaIssue::MultipleInfo => f.write_str("at most one <info/> tag is allowed inside <lecture>"),
            MetaIssue::MultipleSettings => {
                f.write_str("at most one <settings/> tag is allowed inside <lecture>")
            }
            MetaIssue::NoDecks => f.write_str("at least one valid <deck/> tag is required inside <lecture>"),
            MetaIssue::NoActiveDeck => f.write_str("one <deck active=\"true\"/> tag must be set as active"),
            MetaIssue::MultipleActiveDecks => f.write_str("multiple <deck/> tags can't be set as active"),
        }
    }
}

/// Aggregated meta extraction failure. No partial meta is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid document configuration: {}", join_lines(.issues))]
pub struct MetaError {
    pub issues: Vec<MetaIssue>,
}

/// Terminal compile failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("there was no valid content to be put into sections, so 0 sections were generated")]
    NoSections,

    #[error("sections exceed their voice's character budget: {}", join_lines(.0))]
    BudgetExceeded(Vec<BudgetViolation>),
}

fn join_lines<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
