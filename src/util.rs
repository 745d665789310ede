//! Text decoding and path helpers shared by the extractor and the compiler.

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};

/// Decode script bytes to a string, handling various encodings.
///
/// This function:
/// 1. First tries UTF-8 (handles BOM automatically via encoding_rs)
/// 2. If malformed, tries the encoding named in `<?xml encoding="..."?>`
/// 3. Falls back to Windows-1252 (common for scripts written on old editors)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    if let Some(name) = extract_xml_encoding(bytes)
        && let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes())
    {
        let (result, _, _) = encoding.decode(bytes);
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

/// Extract the encoding label from an XML declaration, if any.
fn extract_xml_encoding(bytes: &[u8]) -> Option<&str> {
    // Only check the first 100 bytes for the XML declaration
    let prefix = &bytes[..bytes.len().min(100)];

    let xml_start = memchr::memmem::find(prefix, b"<?xml")?;
    let after_xml = &prefix[xml_start..];

    let enc_pos = after_xml
        .windows(9)
        .position(|w| w.eq_ignore_ascii_case(b"encoding="))?;
    let after_enc = &after_xml[enc_pos + 9..];

    let quote = *after_enc.first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }

    let value_end = after_enc[1..].iter().position(|&b| b == quote)? + 1;
    std::str::from_utf8(&after_enc[1..value_end]).ok()
}

/// Resolve `path` against `base_dir` and normalize `.` and `..` lexically.
///
/// Absolute paths are only normalized. No filesystem access happens here.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use lsml::util::normalize_path;
///
/// assert_eq!(
///     normalize_path("media/../clips/intro.mp4", Path::new("/talks/week1")),
///     PathBuf::from("/talks/week1/clips/intro.mp4")
/// );
/// assert_eq!(
///     normalize_path("/srv/a.png", Path::new("/talks")),
///     PathBuf::from("/srv/a.png")
/// );
/// ```
pub fn normalize_path(path: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root or a prefix
                if matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Check whether `path` points to an existing regular file, optionally
/// requiring a file extension (without the dot, compared case-insensitively).
pub fn is_file(path: &Path, expected_ext: Option<&str>) -> bool {
    if let Some(ext) = expected_ext {
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ext));
        if !matches {
            return false;
        }
    }
    path.is_file()
}
