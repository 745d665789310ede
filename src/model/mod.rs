//! Production plan data model.
//!
//! This module contains:
//! - Frames shown behind speech (slide pages, images, held video frames)
//! - Sections, the ordered units of production work
//! - Media resources and their trimmed variants
//! - The compilation result tying them together

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::timestamp::Timestamp;

// ============================================================================
// Frames
// ============================================================================

/// How a frame is scaled into the output resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "lowercase"))]
pub enum Fit {
    #[default]
    Contain,
    Cover,
    Fill,
}

impl Fit {
    /// Parse a `fit` attribute value.
    pub fn parse(value: &str) -> Option<Fit> {
        match value {
            "contain" => Some(Fit::Contain),
            "cover" => Some(Fit::Cover),
            "fill" => Some(Fit::Fill),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Fit::Contain => "contain",
            Fit::Cover => "cover",
            Fit::Fill => "fill",
        }
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The visual backdrop active during a section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "type", rename_all = "snake_case"))]
pub enum FrameRef {
    /// A page of a declared slide deck. Pages are 1-based.
    Slide { deck_id: String, page: u32, fit: Fit },
    /// An entry of the image pool.
    Image { resource_id: usize, fit: Fit },
    /// The last frame of a video variant.
    Video {
        resource_id: usize,
        variant_key: String,
    },
}

impl FrameRef {
    pub fn kind(&self) -> &'static str {
        match self {
            FrameRef::Slide { .. } => "slide",
            FrameRef::Image { .. } => "image",
            FrameRef::Video { .. } => "video",
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// One ordered unit of production work.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Section {
    pub id: usize,
    #[cfg_attr(feature = "cli", serde(flatten))]
    pub kind: SectionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(tag = "type", rename_all = "snake_case"))]
pub enum SectionKind {
    /// Speech rendered by `voice` over `frame`.
    Ssml {
        frame: FrameRef,
        voice: String,
        /// Serialized `<speak>` document.
        content: String,
    },
    /// Play a video variant.
    Video {
        resource_id: usize,
        variant_key: String,
        #[cfg_attr(feature = "cli", serde(flatten))]
        playback: Playback,
    },
    /// Play an audio variant over `frame`.
    Audio {
        resource_id: usize,
        variant_key: String,
        #[cfg_attr(feature = "cli", serde(flatten))]
        playback: Playback,
        frame: FrameRef,
    },
}

/// Optional playback adjustments of an embedded clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "camelCase"))]
pub struct Playback {
    /// Playback speed in percent, 50 to 200.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub speed: Option<u32>,
    /// Relative volume in decibels.
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub sound_level: Option<i32>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub repeat_count: Option<u32>,
}

impl Section {
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            SectionKind::Ssml { .. } => "ssml",
            SectionKind::Video { .. } => "video",
            SectionKind::Audio { .. } => "audio",
        }
    }

    /// The frame shown while this section plays, if it has its own.
    pub fn frame(&self) -> Option<&FrameRef> {
        match &self.kind {
            SectionKind::Ssml { frame, .. } | SectionKind::Audio { frame, .. } => Some(frame),
            SectionKind::Video { .. } => None,
        }
    }

    /// SSML content, for speech sections.
    pub fn content(&self) -> Option<&str> {
        match &self.kind {
            SectionKind::Ssml { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn voice(&self) -> Option<&str> {
        match &self.kind {
            SectionKind::Ssml { voice, .. } => Some(voice),
            _ => None,
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// One end of a clip's trim window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipBound {
    /// The beginning of the file.
    Start,
    /// The end of the file.
    End,
    At(Timestamp),
}

impl fmt::Display for ClipBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipBound::Start => f.write_str("START"),
            ClipBound::End => f.write_str("END"),
            ClipBound::At(t) => fmt::Display::fmt(t, f),
        }
    }
}

#[cfg(feature = "cli")]
impl serde::Serialize for ClipBound {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A trimmed (and for videos, fitted) rendering of a media resource.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "camelCase"))]
pub struct Variant {
    pub clip_begin: ClipBound,
    pub clip_end: ClipBound,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Option::is_none"))]
    pub fit: Option<Fit>,
}

impl Variant {
    /// Deterministic pool key, e.g. `00:00:02.000-END-contain`.
    pub fn key(&self) -> String {
        match self.fit {
            Some(fit) => format!("{}-{}-{fit}", self.clip_begin, self.clip_end),
            None => format!("{}-{}", self.clip_begin, self.clip_end),
        }
    }
}

/// A deduplicated video or audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Resource {
    /// Position in its pool.
    pub id: usize,
    /// Absolute, normalized path.
    pub path: PathBuf,
    pub variants: BTreeMap<String, Variant>,
}

/// A deduplicated image file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct ImageResource {
    pub id: usize,
    pub path: PathBuf,
}

// ============================================================================
// Result
// ============================================================================

/// A titled bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Chapter {
    pub title: String,
    pub mark_name: String,
    pub section_id: usize,
}

/// A tag that was dropped or partially applied.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct TagWarning {
    /// Name of the offending element.
    pub tag: String,
    pub message: String,
}

impl TagWarning {
    /// Create a warning and log it.
    pub(crate) fn emit(tag: impl Into<String>, message: impl Into<String>) -> Self {
        let warning = Self {
            tag: tag.into(),
            message: message.into(),
        };
        log::warn!("{warning}");
        warning
    }
}

impl fmt::Display for TagWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>: {}", self.tag, self.message)
    }
}

/// Output of one compile call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct CompilationResult {
    pub sections: Vec<Section>,
    pub video_resources: Vec<Resource>,
    pub audio_resources: Vec<Resource>,
    pub image_resources: Vec<ImageResource>,
    /// Bookmark name to the id of the section starting at it.
    pub marks: BTreeMap<String, usize>,
    pub chapters: Vec<Chapter>,
    #[cfg_attr(feature = "cli", serde(skip_serializing_if = "Vec::is_empty"))]
    pub warnings: Vec<TagWarning>,
}

impl CompilationResult {
    pub fn section(&self, id: usize) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Contents of all speech sections, in order.
    pub fn ssml_contents(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().filter_map(Section::content)
    }
}
