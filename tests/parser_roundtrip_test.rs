//! Round-trip tests for the description parser against synthetic noisy
//! descriptions in the formats real banks produce. These run without any
//! infrastructure: regressions in bank formats must be reproducible as a
//! plain string in, identifier out.

use pimart_core::parser::{ParsedOrderRef, extract_order_ref};

const CANONICAL: &str = "9f8a2b1c-03de-4a71-b5c2-6e94d1a7f380";
const COMPACT: &str = "9f8a2b1c03de4a71b5c26e94d1a7f380";

fn assert_full(description: &str) {
    assert_eq!(
        extract_order_ref(description),
        Some(ParsedOrderRef::Full(CANONICAL.to_string())),
        "failed on: {description}"
    );
}

#[test]
fn vietcombank_style_description() {
    assert_full(&format!(
        "MBVCB.4458812345.086919.chuyen tien DH{COMPACT}.CT tu 0071000123456"
    ));
}

#[test]
fn techcombank_style_description() {
    assert_full(&format!("chuyen tien dh {COMPACT} ft231882736450 ib"));
}

#[test]
fn napas_tagged_description() {
    assert_full(&format!(
        "NAPAS247 chuyen khoan DH {COMPACT} ma gd 018827364551"
    ));
}

#[test]
fn diacritics_and_casing() {
    assert_full(&format!("Chuyển tiền mua hàng DH{COMPACT} cảm ơn shop"));
}

#[test]
fn canonical_grouped_form_in_description() {
    assert_full(&format!("thanh toan don hang dh {CANONICAL}"));
}

#[test]
fn bare_identifier_without_prefix() {
    assert_full(&format!("ck {COMPACT}"));
}

#[test]
fn partial_identifier_resolves_to_prefix() {
    let parsed = extract_order_ref("chuyen tien DH9f8a2b1c03de ft123456");
    assert_eq!(
        parsed,
        Some(ParsedOrderRef::Partial("9f8a2b1c03de".to_string()))
    );
}

#[test]
fn partial_prefix_matches_the_full_identifier() {
    let parsed = extract_order_ref("ck dh 9f8a2b1c03de4a71").expect("should parse");
    match parsed {
        ParsedOrderRef::Partial(prefix) => assert!(COMPACT.starts_with(&prefix)),
        ParsedOrderRef::Full(_) => panic!("16 hex chars must parse as a partial"),
    }
}

#[test]
fn noise_only_description_yields_nothing() {
    assert_eq!(
        extract_order_ref("MBVCB.1234567890.086919.CT tu 0071000123456 ft123456789"),
        None
    );
    assert_eq!(extract_order_ref("chuyen tien den tai khoan"), None);
}

#[test]
fn same_input_same_output() {
    let description = format!("NAPAS247 chuyen tien dh{COMPACT} trace 882736455190");
    let runs: Vec<_> = (0..5).map(|_| extract_order_ref(&description)).collect();
    assert!(runs.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(runs[0], Some(ParsedOrderRef::Full(CANONICAL.to_string())));
}

#[test]
fn ambiguous_prefix_inputs_parse_as_partials() {
    // Two orders sharing an 8-char prefix: the parser hands back the
    // partial; the matcher is the one that must refuse to settle on it.
    let parsed = extract_order_ref("chuyen tien DH9f8a2b1c");
    assert_eq!(parsed, Some(ParsedOrderRef::Partial("9f8a2b1c".to_string())));
}

#[test]
fn glued_prefix_with_truncated_id_still_resolves() {
    // The wire format observed in production: prefix glued to the id,
    // trailing bank reference noise.
    let description = "chuyen tien DH4d3d37edec53f1a0000000000000000 ft123456 ib";
    let parsed = extract_order_ref(description).expect("must extract a reference");
    let compact = "4d3d37edec53f1a00000000000000000";
    match parsed {
        ParsedOrderRef::Full(canonical) => {
            assert_eq!(canonical.replace('-', ""), compact);
        }
        ParsedOrderRef::Partial(prefix) => {
            assert!(
                compact.starts_with(&prefix),
                "partial {prefix} must prefix-match the order"
            );
            assert!(prefix.len() >= 8);
        }
    }
}
