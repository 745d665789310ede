//! # lsml
//!
//! A compiler for lecture scripting markup: XML scripts mixing SSML speech
//! with slide changes, embedded clips and images, compiled into an ordered
//! production plan for speech synthesis and video assembly.
//!
//! ## Features
//!
//! - Parse scripts and read their declarations (info, settings, slide
//!   decks, pronunciation lexicons)
//! - Apply pronunciation lexicons and insert pauses after slides and
//!   paragraphs
//! - Split content into speech sections at voice, slide, media and mark tags
//! - Deduplicate video, audio and image resources and their trim variants
//! - Track bookmarks and chapters, honouring start and end marks
//! - Check every speech section against its voice backend's character limits
//!
//! ## Quick Start
//!
//! ```no_run
//! use lsml::{Config, StaticVoiceRegistry, compile_file};
//!
//! # async fn run() -> lsml::Result<()> {
//! let config = Config::default();
//! let registry = StaticVoiceRegistry::from_config(&config);
//!
//! let (meta, plan) = compile_file("talk/script.xml", &config, &registry).await?;
//! println!("{}: {} sections", meta.title(), plan.sections.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Scripts
//!
//! ```xml
//! <lecture startmark="intro">
//!   <deck id="slides" src="slides.pdf" active="true"/>
//!   <mark name="intro" chapter="Introduction"/>
//!   Welcome to the course.
//!   <slide page="next"/>
//!   <voice name="amazon-en-gb-amy">A second voice for this paragraph.</voice>
//!   <video src="demo.mp4" clipBegin="00:00:02" clipEnd="10s" keepFrame="true"/>
//! </lecture>
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod markup;
pub mod meta;
pub mod model;
pub mod pdf;
pub mod preprocess;
pub mod registry;
pub mod timestamp;
pub mod util;

use std::path::Path;

pub use compiler::{BudgetViolation, OverageKind, compile, speak_root};
pub use config::Config;
pub use error::{CompileError, Error, MetaError, MetaIssue, Result};
pub use meta::{Deck, Lexeme, LexemeKind, Lexicon, Marks, Meta, Settings, extract_meta};
pub use model::{
    Chapter, ClipBound, CompilationResult, Fit, FrameRef, ImageResource, Playback, Resource,
    Section, SectionKind, TagWarning, Variant,
};
pub use pdf::{PageCounter, PdfPageCounter};
pub use preprocess::{Breaks, preprocess};
pub use registry::{CachedVoiceRegistry, StaticVoiceRegistry, VoiceBackend, VoiceRegistry};

/// Read the declarations of a script file.
///
/// Relative deck paths resolve against the script's directory.
pub async fn read_meta(path: impl AsRef<Path>) -> Result<(Meta, markup::Element)> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let lecture = markup::parse(&util::decode_text(&bytes))?;
    let meta = extract_meta(&lecture, script_dir(path), &PdfPageCounter).await?;
    Ok((meta, lecture))
}

/// Read, extract, preprocess and compile a script file.
///
/// Preprocessing warnings come first in the plan's warnings.
pub async fn compile_file(
    path: impl AsRef<Path>,
    config: &Config,
    registry: &dyn VoiceRegistry,
) -> Result<(Meta, CompilationResult)> {
    let path = path.as_ref();
    let (meta, lecture) = read_meta(path).await?;
    let (lecture, mut warnings) = preprocess(lecture, &meta, config);
    let mut plan = compile(&meta, &speak_root(&lecture), script_dir(path), config, registry).await?;
    warnings.append(&mut plan.warnings);
    plan.warnings = warnings;
    Ok((meta, plan))
}

fn script_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}
