//! Script content to production plan compiler.
//!
//! This module lowers the content of a `<lecture>` into an ordered list of
//! sections. Plain text and SSML elements are collected into speech
//! sections; the split tags (`voice`, `slide`, `video`, `image`, `audio`,
//! `mark`) end the section in progress and change the state the following
//! sections are built from.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use lsml::compiler::{compile, speak_root};
//! use lsml::{Config, PdfPageCounter, StaticVoiceRegistry, extract_meta, markup};
//!
//! # async fn run() -> lsml::Result<()> {
//! let script = std::fs::read_to_string("talk/script.xml")?;
//! let lecture = markup::parse(&script)?;
//! let meta = extract_meta(&lecture, Path::new("talk"), &PdfPageCounter).await?;
//!
//! let config = Config::default();
//! let registry = StaticVoiceRegistry::from_config(&config);
//! let plan = compile(&meta, &speak_root(&lecture), Path::new("talk"), &config, &registry).await?;
//!
//! for section in &plan.sections {
//!     println!("{} {}", section.id, section.type_name());
//! }
//! # Ok(())
//! # }
//! ```

mod budget;
mod content;
mod context;
mod media;
mod slide;

#[cfg(test)]
mod tests;

pub use budget::{BudgetViolation, OverageKind, check_content};
pub use context::SPLIT_TAGS;

use std::path::Path;

use crate::config::Config;
use crate::error::CompileError;
use crate::markup::Element;
use crate::meta::Meta;
use crate::model::CompilationResult;
use crate::registry::VoiceRegistry;
use context::Compiler;

/// Wrap the content of a `<lecture>` in a `<speak>` element.
///
/// Speech sections are cut from this wrapper, so each of them is a complete
/// SSML document.
pub fn speak_root(lecture: &Element) -> Element {
    Element {
        name: "speak".to_string(),
        attributes: Vec::new(),
        children: lecture.children.clone(),
    }
}

/// Compile the content under `content_root` into a production plan.
///
/// `content_root` is the `<speak>` wrapper built by [`speak_root`]; its
/// children are traversed in document order and it encloses the content of
/// every speech section. Relative media paths resolve against `script_dir`.
///
/// Malformed tags are skipped and reported in
/// [`CompilationResult::warnings`]. The call fails when no section was
/// produced or when any speech section is too long for its voice's backend;
/// all violations are reported together.
pub async fn compile(
    meta: &Meta,
    content_root: &Element,
    script_dir: &Path,
    config: &Config,
    registry: &dyn VoiceRegistry,
) -> Result<CompilationResult, CompileError> {
    log::info!("Defining sections...");

    let mut compiler = Compiler::new(meta, content_root, script_dir, config, registry);
    compiler.run(content_root).await;
    let mut result = compiler.finish();

    if result.sections.is_empty() {
        log::error!("{}", CompileError::NoSections);
        return Err(CompileError::NoSections);
    }

    let violations = budget::validate(&result.sections, registry, &mut result.warnings).await;
    if !violations.is_empty() {
        return Err(CompileError::BudgetExceeded(violations));
    }

    log::info!(
        "Defined {} sections with {} video, {} audio and {} image resources",
        result.sections.len(),
        result.video_resources.len(),
        result.audio_resources.len(),
        result.image_resources.len()
    );
    Ok(result)
}
