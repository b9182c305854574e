//! Minimal RFC 4180 row handling for the contact store.
//!
//! Fields are cleaned to single-line text before they reach the store,
//! so rows never span lines and a line-oriented parser is sufficient.

/// Encodes one row, quoting fields that contain a comma, quote or
/// line break and doubling embedded quotes.
pub(crate) fn encode_row(fields: &[&str]) -> String {
    let mut row = String::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            row.push(',');
        }
        if field.contains(['"', ',', '\n', '\r']) {
            row.push('"');
            for ch in field.chars() {
                if ch == '"' {
                    row.push('"');
                }
                row.push(ch);
            }
            row.push('"');
        } else {
            row.push_str(field);
        }
    }
    row
}

/// Splits one line into fields, honoring quoting and doubled quotes.
/// Returns `None` when a quoted field is left unterminated.
pub(crate) fn split_row(line: &str) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(ch);
            }
        } else {
            match ch {
                '"' if current.is_empty() => in_quotes = true,
                ',' => fields.push(std::mem::take(&mut current)),
                _ => current.push(ch),
            }
        }
    }

    if in_quotes {
        return None;
    }
    fields.push(current);
    Some(fields)
}
