//! Linux-safe filename sanitization.

/// Linux NAME_MAX in bytes.
pub(super) const NAME_MAX: usize = 255;

/// Makes a candidate filename safe to create inside the flat output root.
///
/// Separators, NUL, control characters and whitespace become `_` (runs
/// collapse to one); leading and trailing dots, underscores and spaces are
/// trimmed so no name can be hidden or land in `.tmp`; the result is capped at
/// `NAME_MAX` bytes on a char boundary.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let unsafe_char = c == '/' || c == '\\' || c == '\0' || c.is_control() || c.is_whitespace();
        let c = if unsafe_char { '_' } else { c };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == '.' || c == '_');
    truncate_on_char_boundary(trimmed, NAME_MAX).to_string()
}

pub(super) fn truncate_on_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut take = max;
    while take > 0 && !s.is_char_boundary(take) {
        take -= 1;
    }
    &s[..take]
}
