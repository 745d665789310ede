//! Compiler configuration.

use std::collections::BTreeMap;

use crate::registry::VoiceBackend;

/// Voice used when a document does not name one.
pub const DEFAULT_VOICE: &str = "amazon-en-us-joanna";

/// Settings supplied by the surrounding pipeline rather than the document.
///
/// Document settings win over these: `<settings voice="..."/>` replaces
/// [`Config::default_voice`] and `<settings defaultKeepFrame="..."/>`
/// replaces [`Config::default_keep_frame`]. The break durations give way to
/// `breakAfterSlide` and `breakAfterParagraph`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Deserialize))]
#[cfg_attr(feature = "cli", serde(default, rename_all = "camelCase"))]
pub struct Config {
    pub default_voice: String,
    /// Whether a video's last frame stays visible after it finishes playing.
    pub default_keep_frame: bool,
    /// Pause after every slide change, in milliseconds. 0 disables it.
    pub default_break_after_slide: u32,
    /// Pause at line breaks inside text, in milliseconds. 0 disables it.
    pub default_break_after_paragraph: u32,
    /// Known voices and the backend rendering each of them.
    pub voices: BTreeMap<String, VoiceBackend>,
}

impl Default for Config {
    fn default() -> Self {
        let mut voices = BTreeMap::new();
        voices.insert(DEFAULT_VOICE.to_string(), VoiceBackend::AmazonPolly);
        Self {
            default_voice: DEFAULT_VOICE.to_string(),
            default_keep_frame: false,
            default_break_after_slide: 0,
            default_break_after_paragraph: 0,
            voices,
        }
    }
}

#[cfg(feature = "cli")]
impl Config {
    /// Parse a configuration from JSON. Missing keys take their defaults.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&crate::util::decode_text(&bytes))
    }
}
