use crate::store::Record;

/// `photoUrl` → `photo_url`. Only top-level keys are converted.
pub fn to_snake_case_keys(record: &Record) -> Record {
    record
        .iter()
        .map(|(key, value)| (snake_case(key), value.clone()))
        .collect()
}

/// `photo_url` → `photoUrl`. Only top-level keys are converted.
pub fn to_camel_case_keys(record: &Record) -> Record {
    record
        .iter()
        .map(|(key, value)| (camel_case(key), value.clone()))
        .collect()
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Only `_` followed by a lowercase letter is folded, matching how the
/// dashboard names its columns (`address_line_2` keeps its last underscore).
fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('_', Some(next)) if next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}
