use crate::{GenealogyError, Result};

/// Normalize a free-text member identifier.
///
/// Bracketed annotations are removed, surrounding whitespace is trimmed and
/// only the leading whitespace-delimited token is kept, so pasted values such
/// as `"9876543210 [sub franchise]"` reduce to `"9876543210"`. Returns an
/// empty string when nothing usable remains.
pub fn sanitize(raw: &str) -> String {
    let mut stripped = String::with_capacity(raw.len());
    let mut depth = 0usize;

    for ch in raw.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => stripped.push(ch),
            _ => {}
        }
    }

    stripped
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// [`sanitize`], rejecting input that leaves no identifier behind.
pub fn require_identifier(raw: &str) -> Result<String> {
    let identifier = sanitize(raw);
    if identifier.is_empty() {
        return Err(GenealogyError::MissingRoot(
            "Please enter a member identifier".to_string(),
        ));
    }
    Ok(identifier)
}
