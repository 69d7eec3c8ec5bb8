//! Pure input sanitizers.
//!
//! Every function is total: empty input yields an empty string. `sanitize_html`
//! escapes blindly, so running it twice re-escapes already-escaped entities
//! (`&amp;` becomes `&amp;amp;`); callers must apply it exactly once.
pub fn sanitize_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim, lowercase, and structurally validate an email address. Returns the
/// normalized address, or `""` when the input does not look like one.
pub fn sanitize_email(input: &str) -> String {
    let normalized = input.trim().to_lowercase();
    if is_valid_email(&normalized) {
        normalized
    } else {
        String::new()
    }
}

fn is_valid_email(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.len() >= 3
}

/// Keep letters, spaces, hyphens, apostrophes and periods; drop the rest.
pub fn sanitize_name(input: &str) -> String {
    let filtered: String = input
        .chars()
        .filter(|c| c.is_alphabetic() || matches!(c, ' ' | '-' | '\'' | '.'))
        .collect();
    cap_length(filtered.trim(), 100)
}

/// Keep digits, a leading `+`, and common separators; drop the rest.
pub fn sanitize_phone(input: &str) -> String {
    let filtered: String = input
        .chars()
        .enumerate()
        .filter(|(i, c)| c.is_ascii_digit() || (*c == '+' && *i == 0) || matches!(c, ' ' | '-' | '(' | ')'))
        .map(|(_, c)| c)
        .collect();
    cap_length(filtered.trim(), 20)
}

/// Truncate to at most `max` characters on a char boundary.
pub fn cap_length(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}
