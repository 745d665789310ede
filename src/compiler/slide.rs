//! Slide page arithmetic.

/// A parsed `page` attribute of `<slide>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PageRequest {
    Next,
    Previous,
    Current,
    First,
    Last,
    /// `"3"`
    Absolute(u64),
    /// `"+2"`, `"-1"`
    Relative(i64),
}

impl PageRequest {
    pub fn parse(value: &str) -> Option<Self> {
        let request = match value {
            "next" => PageRequest::Next,
            "previous" => PageRequest::Previous,
            "current" => PageRequest::Current,
            "first" => PageRequest::First,
            "last" => PageRequest::Last,
            _ => {
                let (sign, digits) = match value.as_bytes().first() {
                    Some(b'+') => (Some(1), &value[1..]),
                    Some(b'-') => (Some(-1), &value[1..]),
                    _ => (None, value),
                };
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                // Out-of-range numbers still clamp to the deck
                let magnitude = digits.parse::<u64>().unwrap_or(u64::MAX);
                match sign {
                    None => PageRequest::Absolute(magnitude),
                    Some(sign) => {
                        let offset = i64::try_from(magnitude).unwrap_or(i64::MAX);
                        PageRequest::Relative(sign * offset)
                    }
                }
            }
        };
        Some(request)
    }

    /// The page this request lands on, starting from `current` in a deck of
    /// `page_count` pages. Always within `1..=page_count`.
    pub fn resolve(self, current: u32, page_count: u32) -> u32 {
        let max = i64::from(page_count.max(1));
        let current = i64::from(current);
        let page = match self {
            PageRequest::Next => current.saturating_add(1),
            PageRequest::Previous => current.saturating_sub(1),
            PageRequest::Current => current,
            PageRequest::First => 1,
            PageRequest::Last => max,
            PageRequest::Absolute(n) => i64::try_from(n).unwrap_or(i64::MAX),
            PageRequest::Relative(offset) => current.saturating_add(offset),
        };
        // Clamped into 1..=max, so the conversion cannot fail
        u32::try_from(page.clamp(1, max)).unwrap_or(1)
    }
}
