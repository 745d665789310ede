//! Voice registry capability.
//!
//! The compiler never talks to a speech service itself. It asks a
//! [`VoiceRegistry`] whether a voice exists and which backend renders it,
//! and derives the per-section character budget from that backend.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

/// Google Cloud accepts one request of at most this many characters.
pub const GOOGLE_CHAR_LIMIT: usize = 5000;
/// Amazon Polly bills at most this many text characters per request.
pub const AMAZON_TEXT_CHAR_LIMIT: usize = 3000;
/// Amazon Polly additionally allows this many unbilled markup characters.
pub const AMAZON_MARKUP_CHAR_LIMIT: usize = 3000;

/// The speech synthesis service a voice belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "cli", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "kebab-case"))]
pub enum VoiceBackend {
    GoogleCloud,
    AmazonPolly,
    /// A backend without known request limits.
    Other,
}

impl VoiceBackend {
    /// The character budget one section may use with this backend.
    pub fn budget(self) -> Option<CharacterBudget> {
        match self {
            VoiceBackend::GoogleCloud => Some(CharacterBudget::Combined {
                limit: GOOGLE_CHAR_LIMIT,
            }),
            VoiceBackend::AmazonPolly => Some(CharacterBudget::Split {
                markup: AMAZON_MARKUP_CHAR_LIMIT,
                text: AMAZON_TEXT_CHAR_LIMIT,
            }),
            VoiceBackend::Other => None,
        }
    }
}

impl fmt::Display for VoiceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VoiceBackend::GoogleCloud => "google-cloud",
            VoiceBackend::AmazonPolly => "amazon-polly",
            VoiceBackend::Other => "other",
        })
    }
}

/// Content length ceilings of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterBudget {
    /// One ceiling on the full serialized length.
    Combined { limit: usize },
    /// Independent ceilings on tag characters and on spoken text characters.
    Split { markup: usize, text: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("voice registry unavailable: {0}")]
    Unavailable(String),

    #[error("voice registry internal error: {0}")]
    Internal(String),
}

/// Async lookup of voices and their backends.
#[async_trait]
pub trait VoiceRegistry: Send + Sync {
    /// The backend rendering `name`, or `None` if no such voice exists.
    async fn voice_backend(&self, name: &str) -> Result<Option<VoiceBackend>, RegistryError>;

    /// Whether a voice called `name` exists.
    async fn voice_exists(&self, name: &str) -> Result<bool, RegistryError> {
        Ok(self.voice_backend(name).await?.is_some())
    }
}

/// A fixed table of voices. Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct StaticVoiceRegistry {
    voices: BTreeMap<String, VoiceBackend>,
}

impl StaticVoiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a voice.
    pub fn with_voice(mut self, name: &str, backend: VoiceBackend) -> Self {
        self.insert(name, backend);
        self
    }

    pub fn insert(&mut self, name: &str, backend: VoiceBackend) {
        self.voices.insert(name.to_lowercase(), backend);
    }

    /// Registry holding the voices declared in a configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (name, backend) in &config.voices {
            registry.insert(name, *backend);
        }
        registry
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[async_trait]
impl VoiceRegistry for StaticVoiceRegistry {
    async fn voice_backend(&self, name: &str) -> Result<Option<VoiceBackend>, RegistryError> {
        Ok(self.voices.get(&name.to_lowercase()).copied())
    }
}

/// Memoizes lookups of an inner registry.
///
/// Only successful answers are cached, including "no such voice". Errors are
/// passed through and retried on the next lookup.
pub struct CachedVoiceRegistry<R> {
    inner: R,
    cache: RwLock<HashMap<String, Option<VoiceBackend>>>,
}

impl<R: VoiceRegistry> CachedVoiceRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Number of names answered so far.
    pub fn cached_len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl<R: VoiceRegistry> VoiceRegistry for CachedVoiceRegistry<R> {
    async fn voice_backend(&self, name: &str) -> Result<Option<VoiceBackend>, RegistryError> {
        let key = name.to_lowercase();
        {
            let cache = self
                .cache
                .read()
                .map_err(|e| RegistryError::Internal(e.to_string()))?;
            if let Some(hit) = cache.get(&key) {
                return Ok(*hit);
            }
        }

        let backend = self.inner.voice_backend(name).await?;

        let mut cache = self
            .cache
            .write()
            .map_err(|e| RegistryError::Internal(e.to_string()))?;
        cache.insert(key, backend);
        Ok(backend)
    }
}
