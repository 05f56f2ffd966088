use std::borrow::Cow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::seq::SliceRandom;
use regex::Regex;

fn trim_set(set: Option<&str>) -> impl Fn(char) -> bool + '_ {
    move |c: char| match set {
        Some(set) if !set.is_empty() => set.contains(c),
        _ => c.is_whitespace(),
    }
}

/// Strips any character of `set` (whitespace when `None`) from both ends.
pub fn trim<'a>(value: &'a str, set: Option<&str>) -> &'a str {
    value.trim_matches(trim_set(set))
}

pub fn trim_left<'a>(value: &'a str, set: Option<&str>) -> &'a str {
    value.trim_start_matches(trim_set(set))
}

pub fn trim_right<'a>(value: &'a str, set: Option<&str>) -> &'a str {
    value.trim_end_matches(trim_set(set))
}

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Decodes `%XX` escapes. Invalid UTF-8 is replaced.
pub fn unescape(value: &str) -> Cow<'_, str> {
    percent_decode_str(value).decode_utf8_lossy()
}

pub fn xml_encode(value: &str) -> String {
    html_escape::encode_text(&unescape(value)).into_owned()
}

/// Spells out `&`, `<` and `>` so screen readers do not trip on them.
pub fn accessibility_safe_string(value: &str) -> String {
    unescape(value)
        .replace("&amp;", "and")
        .replace("&lt;", "less than")
        .replace("&gt;", "greater than")
        .replace('&', "and")
        .replace('<', "less than")
        .replace('>', "greater than")
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,4}$").expect("valid email pattern")
});

pub fn valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Leading decimal digits of a version component; `None` when there are
/// none, in which case the component is not compared.
fn version_part(part: &str) -> Option<u64> {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Compares dotted versions component by component; missing components
/// count as `0`, so `5.0` satisfies `5.0.0`.
pub fn software_version_is_at_least(device: &str, requested: &str) -> bool {
    let device: Vec<&str> = device.split('.').collect();
    let requested: Vec<&str> = requested.split('.').collect();
    let len = device.len().max(requested.len());

    for index in 0..len {
        let have = version_part(device.get(index).copied().unwrap_or("0"));
        let want = version_part(requested.get(index).copied().unwrap_or("0"));
        if let (Some(have), Some(want)) = (have, want) {
            match have.cmp(&want) {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => {}
            }
        }
    }
    true
}

pub fn shuffle<T>(items: &mut [T]) {
    items.shuffle(&mut rand::thread_rng());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_like_uri_components() {
        assert_eq!(encode_component("a b&c/d"), "a%20b%26c%2Fd");
        assert_eq!(encode_component("keep-_.!~*'()"), "keep-_.!~*'()");
        assert_eq!(encode_component("ç"), "%C3%A7");
    }

    #[test]
    fn trims_custom_character_sets() {
        assert_eq!(trim("  padded \t", None), "padded");
        assert_eq!(trim("--x--", Some("-")), "x");
        assert_eq!(trim_left("/a/b/", Some("/")), "a/b/");
        assert_eq!(trim_right("/a/b/", Some("/")), "/a/b");
        assert_eq!(trim("xyhixy", Some("xy")), "hi");
    }

    #[test]
    fn xml_encode_unescapes_first() {
        assert_eq!(xml_encode("Tom%20&%20Jerry <3>"), "Tom &amp; Jerry &lt;3&gt;");
    }

    #[test]
    fn accessibility_strings_spell_out_symbols() {
        assert_eq!(accessibility_safe_string("Tom & Jerry"), "Tom and Jerry");
        assert_eq!(accessibility_safe_string("a &lt; b"), "a less than b");
        assert_eq!(accessibility_safe_string("x>y"), "xgreater thany");
        assert_eq!(accessibility_safe_string("R%26D"), "RandD");
    }

    #[test]
    fn validates_email_addresses() {
        assert!(valid_email("viewer@example.tv"));
        assert!(valid_email("First.Last+tv@Mail.Example.COM"));
        assert!(!valid_email("no-at-sign.example.com"));
        assert!(!valid_email("viewer@example.toolong"));
    }

    #[test]
    fn compares_versions_with_padding() {
        assert!(software_version_is_at_least("5.0", "5.0.0"));
        assert!(software_version_is_at_least("5.0.1", "5.0"));
        assert!(software_version_is_at_least("6.1", "5.9.9"));
        assert!(!software_version_is_at_least("5.0", "5.0.1"));
        assert!(!software_version_is_at_least("4.4.4", "5"));
        assert!(software_version_is_at_least("5.2b", "5.2"));
    }

    #[test]
    fn shuffle_keeps_every_item() {
        let mut items: Vec<u32> = (0..20).collect();
        shuffle(&mut items);
        items.sort_unstable();
        assert_eq!(items, (0..20).collect::<Vec<_>>());
    }
}
