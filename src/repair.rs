//! Tolerant base64 cleaning and JSON control-character sanitation.
//!
//! Card payloads pass through many editors and upload tools before they reach
//! us. The usual damage is a leftover `chara:` label, quotes or line breaks
//! inside the base64, wrong padding, and raw control bytes inside JSON strings.

use std::sync::OnceLock;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{DecodeError, Engine};
use regex::Regex;

/// Browser `atob` rules: padding is optional and stray low bits are ignored.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

fn regex_label() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)chara["\s]*[:=]?\s*["\s]*"#).unwrap())
}

fn regex_base64_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").unwrap())
}

/// True for the characters that survive export and base64 cleaning.
pub fn is_base64_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '+' | '/' | '=')
}

/// Extracts the base64 body from a raw metadata field.
///
/// Drops every `chara` label (any case, optional `:`/`=`, quotes and spaces
/// around it), every character outside `A-Za-z0-9+/=`, and the trailing
/// padding, then pads back to a multiple of four. Returns `None` when the
/// input is empty or nothing usable is left.
///
/// ```
/// use card_core::repair::clean_base64;
/// assert_eq!(clean_base64("chara: \"eyJhIjox\nfQ\"").as_deref(), Some("eyJhIjoxfQ=="));
/// assert_eq!(clean_base64(""), None);
/// ```
pub fn clean_base64(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    let unlabeled = regex_label().replace_all(input, "");
    let mut cleaned: String = unlabeled.chars().filter(|ch| is_base64_char(*ch)).collect();
    // Filtering can splice a new label together; strip until none is left.
    while regex_label().is_match(&cleaned) {
        cleaned = regex_label().replace_all(&cleaned, "").into_owned();
    }
    let body_len = cleaned.trim_end_matches('=').len();
    cleaned.truncate(body_len);
    if cleaned.is_empty() {
        return None;
    }
    let rem = cleaned.len() % 4;
    if rem != 0 {
        cleaned.extend(std::iter::repeat_n('=', 4 - rem));
    }
    Some(cleaned)
}

/// Alphabet plus at most two trailing `=`, and a length that is not 1 mod 4.
pub fn has_base64_shape(text: &str) -> bool {
    !text.is_empty() && regex_base64_shape().is_match(text) && text.len() % 4 != 1
}

/// Shape check plus an actual decode.
pub fn is_valid_base64(text: &str) -> bool {
    has_base64_shape(text) && decode_base64_variant(text).is_ok()
}

/// Decodes with browser `atob` semantics.
///
/// When the length is a multiple of four, up to two trailing `=` are dropped;
/// any `=` left after that is an error. Non-zero trailing bits are accepted.
pub fn decode_base64_variant(text: &str) -> Result<Vec<u8>, DecodeError> {
    let trimmed: String = text
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    let mut body = trimmed.as_str();
    if body.len() % 4 == 0 {
        for _ in 0..2 {
            body = body.strip_suffix('=').unwrap_or(body);
        }
    }
    // A lone trailing symbol (len % 4 == 1) is rejected by the engine itself.
    FORGIVING.decode(body.as_bytes())
}

fn is_stray_control(ch: char) -> bool {
    ch <= '\u{1f}' && !matches!(ch, '\t' | '\n' | '\r')
}

/// Replaces each control character except tab, LF and CR with one space.
///
/// Replacement is one-for-one so offsets reported by a later JSON error still
/// point at the original position.
pub fn sanitize_json_control_chars(text: &str) -> String {
    text.chars()
        .map(|ch| if is_stray_control(ch) { ' ' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;

    fn sample_bytes(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 24) as u8
            })
            .collect()
    }

    #[test]
    fn clean_strips_label_quotes_and_whitespace() {
        assert_eq!(
            clean_base64("chara\0eyJuYW1lIjoiQSJ9").as_deref(),
            Some("eyJuYW1lIjoiQSJ9")
        );
        assert_eq!(
            clean_base64("CHARA = \"eyJh\r\n IjoxfQ==\"").as_deref(),
            Some("eyJhIjoxfQ==")
        );
        assert_eq!(clean_base64("Chara:eyJhIjoxfQ").as_deref(), Some("eyJhIjoxfQ=="));
    }

    #[test]
    fn clean_repads_to_multiple_of_four() {
        assert_eq!(clean_base64("YQ").as_deref(), Some("YQ=="));
        assert_eq!(clean_base64("YWI").as_deref(), Some("YWI="));
        assert_eq!(clean_base64("YWJj====").as_deref(), Some("YWJj"));
        assert_eq!(clean_base64("YWJjZ").as_deref(), Some("YWJjZ==="));
    }

    #[test]
    fn clean_rejects_empty_results() {
        assert_eq!(clean_base64(""), None);
        assert_eq!(clean_base64("chara"), None);
        assert_eq!(clean_base64("\"  ==\""), None);
    }

    #[test]
    fn clean_is_idempotent() {
        let inputs = [
            "chara\0eyJuYW1lIjoiQSJ9",
            "  \"chara\": \"YWJjZGVm\" ",
            "cha-ra eyJh",
            "ch\"ara:ZZZ",
            "YWJjZ",
            "===YQ",
            "ÿÿ plain text ÿÿ",
            "\u{0}\u{1}chara=chara=abc",
        ];
        for input in inputs {
            if let Some(once) = clean_base64(input) {
                assert_eq!(
                    clean_base64(&once).as_deref(),
                    Some(once.as_str()),
                    "not idempotent for {input:?}"
                );
            }
        }
    }

    #[test]
    fn shape_check_follows_length_rule() {
        assert!(has_base64_shape("YWJj"));
        assert!(has_base64_shape("YQ"));
        assert!(has_base64_shape("YWI"));
        assert!(!has_base64_shape("YWJjZ"));
        assert!(!has_base64_shape("YQ==="));
        assert!(!has_base64_shape("Y=Q="));
        assert!(!has_base64_shape(""));
        assert!(!has_base64_shape("YW-J"));
    }

    #[test]
    fn validity_requires_a_real_decode() {
        assert!(is_valid_base64("YWJj"));
        assert!(is_valid_base64("YQ=="));
        // Right shape, but the padding leaves a one-symbol tail.
        assert!(!is_valid_base64("YWJj=="));
    }

    #[test]
    fn forgiving_decode_matches_atob() {
        assert_eq!(decode_base64_variant("YQ==").unwrap(), b"a");
        assert_eq!(decode_base64_variant("YQ").unwrap(), b"a");
        assert_eq!(decode_base64_variant("YR==").unwrap(), b"a");
        assert_eq!(decode_base64_variant("YWI=").unwrap(), b"ab");
        assert!(decode_base64_variant("YWJjZ").is_err());
        assert!(decode_base64_variant("YQ=").is_err());
    }

    #[test]
    fn cleaned_encoding_round_trips() {
        for (idx, len) in [0usize, 3, 6, 30, 300, 3000].into_iter().enumerate() {
            let bytes = sample_bytes(len, idx as u32 + 7);
            let encoded = STANDARD.encode(&bytes);
            let Some(cleaned) = clean_base64(&encoded) else {
                assert!(bytes.is_empty());
                continue;
            };
            let decoded = decode_base64_variant(&cleaned).expect("decode cleaned");
            assert_eq!(decoded, bytes, "round trip failed for len {len}");
        }
    }

    #[test]
    fn sanitize_replaces_only_stray_controls() {
        let input = "{\"a\":\"x\u{0}y\u{1f}z\u{7}\",\t\n\r\"b\":1}";
        let out = sanitize_json_control_chars(input);
        assert_eq!(out, "{\"a\":\"x y z \",\t\n\r\"b\":1}");
        assert_eq!(out.chars().count(), input.chars().count());
        assert_eq!(out.len(), input.len());
    }

    #[test]
    fn sanitize_keeps_printable_ascii() {
        let printable: String = (0x20u8..0x7f).map(char::from).collect();
        assert_eq!(sanitize_json_control_chars(&printable), printable);
        let controls: String = (0u8..0x20).map(char::from).collect();
        let out = sanitize_json_control_chars(&controls);
        for (before, after) in controls.chars().zip(out.chars()) {
            match before {
                '\t' | '\n' | '\r' => assert_eq!(after, before),
                _ => assert_eq!(after, ' ', "control {:#x} not replaced", before as u32),
            }
        }
    }
}
