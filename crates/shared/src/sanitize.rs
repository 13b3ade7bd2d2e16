//! Input sanitizers for request parameters, labels and file names.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SCRIPT_STYLE: Regex =
        Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"[\r\n\t ]+").unwrap();
    static ref OCTETS: Regex = Regex::new(r"%[a-fA-F0-9]{2}").unwrap();
    static ref FILE_NAME_SPECIALS: Regex =
        Regex::new(r#"[?\[\]/\\=<>:;,'"&$#*()|~`!{}%+’«»”“]"#).unwrap();
    static ref DASHES: Regex = Regex::new(r"[\s-]+").unwrap();
}

/// Removes every HTML tag, dropping `<script>`/`<style>` blocks entirely.
pub fn strip_all_tags(input: &str) -> String {
    let without_blocks = SCRIPT_STYLE.replace_all(input, "");
    TAG.replace_all(&without_blocks, "").trim().to_string()
}

/// Sanitizes a single-line text value.
///
/// Strips tags, removes percent-encoded octets, collapses whitespace
/// (including line breaks and tabs) into single spaces and trims.
pub fn sanitize_text_field(input: &str) -> String {
    let stripped = strip_all_tags(input);
    let no_octets = OCTETS.replace_all(&stripped, "");
    WHITESPACE.replace_all(&no_octets, " ").trim().to_string()
}

/// Sanitizes an identifier: lowercase ASCII alphanumerics, `_` and `-`.
pub fn sanitize_key(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| {
            let c = c.to_ascii_lowercase();
            (c.is_ascii_alphanumeric() || c == '_' || c == '-').then_some(c)
        })
        .collect()
}

/// Sanitizes a string for use as a file name.
///
/// Removes characters that are unsafe on common file systems, replaces runs
/// of whitespace and dashes with a single dash and trims leading/trailing
/// dots, dashes and underscores.
pub fn sanitize_file_name(input: &str) -> String {
    let cleaned = FILE_NAME_SPECIALS.replace_all(input, "");
    let cleaned: String = cleaned.chars().filter(|c| !c.is_control()).collect();
    let dashed = DASHES.replace_all(&cleaned, "-");
    dashed
        .trim_matches(|c| c == '.' || c == '-' || c == '_')
        .to_string()
}

/// Decodes HTML entities (named, decimal and hexadecimal) into text.
pub fn decode_html_entities(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

/// Parses the leading integer of a string, yielding 0 when there is none.
///
/// Mirrors the lenient casting applied to ids coming from forms: `"12abc"`
/// is 12, `" -3"` is -3 and `"abc"` is 0. Out of range values saturate.
pub fn intval(input: &str) -> i64 {
    let trimmed = input.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: i64 = 0;
    for c in digits.chars().take_while(|c| c.is_ascii_digit()) {
        let digit = i64::from(c as u8 - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
    }

    if negative {
        -value
    } else {
        value
    }
}

/// Title-cases each whitespace separated word.
pub fn ucwords(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if at_word_start && !c.is_whitespace() {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.push(c);
            if c.is_whitespace() {
                at_word_start = true;
            }
        }
    }
    out
}
