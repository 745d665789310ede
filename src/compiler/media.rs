//! Embedded media: resource pools, trim windows and playback attributes.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::markup::Element;
use crate::model::{ClipBound, ImageResource, Playback, Resource, TagWarning, Variant};
use crate::timestamp;

static SPEED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([5-9][0-9]|1[0-9][0-9]|200)%$").unwrap());
static SOUND_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-][0-9]{1,2})dB$").unwrap());

/// Position of `path` in a video or audio pool, adding it on first sight.
pub(super) fn intern_resource(pool: &mut Vec<Resource>, path: &Path) -> usize {
    if let Some(existing) = pool.iter().find(|r| r.path == path) {
        return existing.id;
    }
    let id = pool.len();
    pool.push(Resource {
        id,
        path: path.to_path_buf(),
        variants: Default::default(),
    });
    id
}

/// Position of `path` in the image pool, adding it on first sight.
pub(super) fn intern_image(pool: &mut Vec<ImageResource>, path: PathBuf) -> usize {
    if let Some(existing) = pool.iter().find(|r| r.path == path) {
        return existing.id;
    }
    let id = pool.len();
    pool.push(ImageResource { id, path });
    id
}

/// Register `variant` on a pooled resource and return its key.
pub(super) fn add_variant(resource: &mut Resource, variant: Variant) -> String {
    let key = variant.key();
    resource.variants.entry(key.clone()).or_insert(variant);
    key
}

/// Read the trim window from `clipBegin` and `clipEnd`.
///
/// A bound is used only if it is a valid timestamp after the start of the
/// file; an invalid bound is reported and ignored. Returns `Err` with a
/// message when the window is empty.
pub(super) fn clip_window(
    tag: &Element,
    warnings: &mut Vec<TagWarning>,
) -> Result<(ClipBound, ClipBound), String> {
    let begin = clip_bound(tag, "clipBegin", warnings);
    let end = clip_bound(tag, "clipEnd", warnings);

    if let (Some(b), Some(e)) = (begin, end)
        && b.milliseconds_total >= e.milliseconds_total
    {
        return Err(format!(
            "clipBegin {} is equal to or later than clipEnd {}",
            b.canonical(),
            e.canonical()
        ));
    }

    let begin = begin.map_or(ClipBound::Start, ClipBound::At);
    let end = end.map_or(ClipBound::End, ClipBound::At);
    Ok((begin, end))
}

fn clip_bound(
    tag: &Element,
    attribute: &str,
    warnings: &mut Vec<TagWarning>,
) -> Option<timestamp::Timestamp> {
    let value = tag.non_empty_attr(attribute)?;
    match timestamp::parse(value) {
        Some(t) if t.milliseconds_total > 0 => Some(t),
        Some(_) => None,
        None => {
            warnings.push(TagWarning::emit(
                tag.name.as_str(),
                format!("ignored {attribute}=\"{value}\" as it is not a valid timestamp"),
            ));
            None
        }
    }
}

/// Read `speed`, `soundLevel` and `repeatCount`. Out-of-range values are
/// reported and left unset.
pub(super) fn playback(tag: &Element, warnings: &mut Vec<TagWarning>) -> Playback {
    let mut playback = Playback::default();

    if let Some(value) = tag.attr("speed") {
        playback.speed = SPEED
            .captures(value)
            .and_then(|c| c[1].parse().ok());
        if playback.speed.is_none() {
            warnings.push(invalid(tag, "speed", value, "a percentage from 50% to 200%"));
        }
    }

    if let Some(value) = tag.attr("soundLevel") {
        playback.sound_level = SOUND_LEVEL
            .captures(value)
            .and_then(|c| c[1].parse().ok());
        if playback.sound_level.is_none() {
            warnings.push(invalid(tag, "soundLevel", value, "a signed level such as +6dB"));
        }
    }

    if let Some(value) = tag.attr("repeatCount") {
        playback.repeat_count = value
            .bytes()
            .all(|b| b.is_ascii_digit())
            .then(|| value.parse::<u32>().ok())
            .flatten()
            .filter(|n| *n > 0);
        if playback.repeat_count.is_none() {
            warnings.push(invalid(tag, "repeatCount", value, "a positive integer"));
        }
    }

    playback
}

fn invalid(tag: &Element, attribute: &str, value: &str, expected: &str) -> TagWarning {
    TagWarning::emit(
        tag.name.as_str(),
        format!("ignored {attribute}=\"{value}\", expected {expected}"),
    )
}
