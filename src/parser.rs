//! Bank-transfer description parser.
//!
//! Extracts an order identifier from the free-text description of an
//! incoming bank transfer. Descriptions come from many banking systems with
//! inconsistent noise (reference codes, trace numbers, NAPAS routing tags),
//! so extraction is a cascade of data-driven rules over a normalized form of
//! the text. The whole module is pure: same input, same output, no I/O.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Prefix token customers are asked to put in front of the order id
/// ("DH" - don hang).
const ORDER_PREFIX: &str = "dh";

const FULL_ID_LEN: usize = 32;
const MIN_PARTIAL_LEN: usize = 8;

/// A successfully extracted order reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedOrderRef {
    /// Full 32-hex identifier, canonicalized to grouped 8-4-4-4-12 form.
    Full(String),
    /// Truncated 8..=31 hex capture; the caller resolves it by prefix search.
    Partial(String),
}

impl ParsedOrderRef {
    /// The raw hex (no separators) of this reference.
    pub fn compact(&self) -> String {
        match self {
            ParsedOrderRef::Full(id) => id.replace('-', ""),
            ParsedOrderRef::Partial(prefix) => prefix.clone(),
        }
    }
}

/// Noise segments injected by banking systems, removed before extraction.
/// Ordered; applied repeatedly until the text stops shrinking.
const NOISE_PATTERNS: &[&str] = &[
    // reference codes: "ft23188273645", "FT123456"
    r"\bft\d{6,}\b",
    // trace numbers: "ma gd 123456789", "ma giao dich 0012345", "trace 731912"
    r"\b(?:ma gd|ma giao dich|trace)[ .:]*\d+\b",
    // inter-bank routing tags
    r"\bnapas\w*\b",
    // vietcombank envelope codes: "mbvcb.1234567890"
    r"\bmbvcb[ .]*\d+\b",
    // any standalone digit run long enough to be a trace number
    r"\b\d{10,}\b",
];

/// Extraction rules, most specific first. Each has a single capture group;
/// a capture that fails hex validation falls through to the next rule.
fn extraction_rules() -> &'static [Regex] {
    static RULES: OnceLock<Vec<Regex>> = OnceLock::new();
    RULES.get_or_init(|| {
        let sep = r"[ .:#-]*";
        let full = r"[0-9a-f]{8}[- .]?[0-9a-f]{4}[- .]?[0-9a-f]{4}[- .]?[0-9a-f]{4}[- .]?[0-9a-f]{12}";
        [
            // prefix + full id, with or without internal separators
            format!(r"\b{ORDER_PREFIX}{sep}({full})\b"),
            // prefix + truncated id
            format!(r"\b{ORDER_PREFIX}{sep}([0-9a-f]{{8,31}})\b"),
            // bare full id anywhere in the text
            format!(r"\b({full})\b"),
            // bare truncated id anywhere in the text
            r"\b([0-9a-f]{8,31})\b".to_string(),
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).expect("extraction pattern"))
        .collect()
    })
}

fn noise_rules() -> &'static [Regex] {
    static RULES: OnceLock<Vec<Regex>> = OnceLock::new();
    RULES.get_or_init(|| {
        NOISE_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern).expect("noise pattern"))
            .collect()
    })
}

/// Extract an order reference from a raw bank-transfer description.
pub fn extract_order_ref(description: &str) -> Option<ParsedOrderRef> {
    let cleaned = strip_noise(&normalize(description));

    for rule in extraction_rules() {
        let Some(captures) = rule.captures(&cleaned) else {
            continue;
        };
        let raw = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        if let Some(parsed) = validate_capture(raw) {
            return Some(parsed);
        }
    }

    None
}

/// True when the description mentions the given compact (32 hex, no
/// separators) identifier, under the same normalization the extractor uses.
/// Used by the reconciliation sweep for substring matching.
pub fn contains_identifier(description: &str, compact_id: &str) -> bool {
    let squashed: String = normalize(description)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect();
    squashed.contains(compact_id)
}

/// Lowercase, trim, and strip diacritics via NFD decomposition.
fn normalize(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect()
}

/// Remove bank-injected noise until a fixpoint, then collapse whitespace.
fn strip_noise(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for rule in noise_rules() {
            next = rule.replace_all(&next, " ").into_owned();
        }
        if next == current {
            break;
        }
        current = next;
    }
    current.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A capture must be hex digits plus internal separators. Exactly 32 hex
/// chars canonicalize to grouped form; 8..=31 stay ungrouped for prefix
/// resolution; anything else is rejected.
fn validate_capture(raw: &str) -> Option<ParsedOrderRef> {
    if !raw
        .chars()
        .all(|ch| ch.is_ascii_hexdigit() || matches!(ch, '-' | '.' | ' '))
    {
        return None;
    }

    let compact: String = raw.chars().filter(char::is_ascii_hexdigit).collect();
    match compact.len() {
        FULL_ID_LEN => Some(ParsedOrderRef::Full(to_canonical(&compact))),
        len if (MIN_PARTIAL_LEN..FULL_ID_LEN).contains(&len) => {
            Some(ParsedOrderRef::Partial(compact))
        }
        _ => None,
    }
}

/// Regroup 32 compact hex chars into the canonical 8-4-4-4-12 form.
fn to_canonical(compact: &str) -> String {
    debug_assert_eq!(compact.len(), FULL_ID_LEN);
    format!(
        "{}-{}-{}-{}-{}",
        &compact[..8],
        &compact[8..12],
        &compact[12..16],
        &compact[16..20],
        &compact[20..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "4d3d37ed-ec53-f1a0-0000-000000000000";
    const COMPACT: &str = "4d3d37edec53f1a00000000000000000";

    #[test]
    fn extracts_prefixed_compact_id() {
        let parsed = extract_order_ref(&format!("chuyen tien DH{COMPACT}"));
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn extracts_prefixed_canonical_id() {
        let parsed = extract_order_ref(&format!("thanh toan dh {CANONICAL}"));
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn extracts_id_with_dot_separators() {
        let parsed = extract_order_ref("DH 4d3d37ed.ec53.f1a0.0000.000000000000");
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn extracts_bare_compact_id() {
        let parsed = extract_order_ref(&format!("ck mua hang {COMPACT} cam on shop"));
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn extracts_partial_id_after_prefix() {
        let parsed = extract_order_ref("chuyen khoan DH4d3d37ed");
        assert_eq!(
            parsed,
            Some(ParsedOrderRef::Partial("4d3d37ed".to_string()))
        );
    }

    #[test]
    fn extracts_bare_partial_id() {
        let parsed = extract_order_ref("tt don 4d3d37edec53");
        assert_eq!(
            parsed,
            Some(ParsedOrderRef::Partial("4d3d37edec53".to_string()))
        );
    }

    #[test]
    fn strips_diacritics_before_matching() {
        let parsed = extract_order_ref(&format!("Chuyển tiền ĐH mua hàng DH{COMPACT}"));
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn survives_reference_code_noise() {
        let description = format!("chuyen tien DH{COMPACT} ft123456 ib");
        let parsed = extract_order_ref(&description);
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn survives_trace_and_napas_noise() {
        let description = format!(
            "MBVCB.3728801923 ma gd 182773645519 chuyen tien dh {COMPACT} napas247"
        );
        let parsed = extract_order_ref(&description);
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn long_digit_runs_are_not_mistaken_for_ids() {
        // 12-digit trace number, no order reference anywhere
        assert_eq!(extract_order_ref("trace 123456789012 noi dung ck"), None);
    }

    #[test]
    fn digit_run_inside_hex_id_is_preserved() {
        // the trailing zeros of the id must not be stripped as a digit run
        let parsed = extract_order_ref(&format!("dh{COMPACT}"));
        assert_eq!(parsed, Some(ParsedOrderRef::Full(CANONICAL.to_string())));
    }

    #[test]
    fn returns_none_for_plain_text() {
        assert_eq!(extract_order_ref("chuyen tien mua hang cam on"), None);
        assert_eq!(extract_order_ref(""), None);
        assert_eq!(extract_order_ref("   "), None);
    }

    #[test]
    fn too_short_hex_is_rejected() {
        assert_eq!(extract_order_ref("dh 4d3d37e"), None);
    }

    #[test]
    fn is_deterministic_and_pure() {
        let description = format!("MBVCB.99887766554 chuyen tien DH{COMPACT} ft998877");
        let first = extract_order_ref(&description);
        let second = extract_order_ref(&description);
        assert_eq!(first, second);
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize("  Chuyển Tiền ĐH Mua Hàng  ");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn compact_round_trips_through_canonical() {
        let parsed = extract_order_ref(&format!("dh{COMPACT}")).unwrap();
        assert_eq!(parsed.compact(), COMPACT);
    }

    #[test]
    fn contains_identifier_sees_through_separators() {
        assert!(contains_identifier(
            &format!("chuyen tien DH {CANONICAL} ft123456"),
            COMPACT
        ));
        assert!(contains_identifier(&format!("ck {COMPACT}"), COMPACT));
        assert!(!contains_identifier("chuyen tien mua hang", COMPACT));
    }
}
