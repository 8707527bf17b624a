//! Webhook intake contract tests: payload shape and HMAC signature
//! verification, no server or database required.

use hmac::{Hmac, Mac};
use pimart_core::handlers::webhook::{TransferNotification, verify_signature};
use serde_json::json;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn transfer_payload_deserializes() {
    let body = json!({
        "external_id": "FT23188273645",
        "amount": 150000,
        "description": "chuyen tien DH4d3d37edec53f1a0000000000000000 ft123456 ib",
        "occurred_at": "2026-07-01T09:30:00Z",
        "source_account": "0071000123456"
    })
    .to_string();

    let payload: TransferNotification = serde_json::from_str(&body).unwrap();
    assert_eq!(payload.external_id, "FT23188273645");
    assert_eq!(payload.amount, 150_000);
    assert!(payload.description.contains("DH4d3d37ed"));
}

#[test]
fn transfer_payload_rejects_missing_fields() {
    let body = json!({
        "external_id": "FT23188273645",
        "amount": 150000
    })
    .to_string();

    assert!(serde_json::from_str::<TransferNotification>(&body).is_err());
}

#[test]
fn transfer_payload_rejects_non_integer_amount() {
    let body = json!({
        "external_id": "FT23188273645",
        "amount": "150000.50",
        "description": "x",
        "occurred_at": "2026-07-01T09:30:00Z",
        "source_account": "0071000123456"
    })
    .to_string();

    assert!(serde_json::from_str::<TransferNotification>(&body).is_err());
}

#[test]
fn accepts_a_valid_signature() {
    let secret = "webhook_secret_key";
    let body = br#"{"external_id":"FT1","amount":150000}"#;
    let signature = sign(secret, body);

    assert!(verify_signature(secret.as_bytes(), body, &signature).is_ok());
}

#[test]
fn rejects_a_tampered_body() {
    let secret = "webhook_secret_key";
    let body = br#"{"external_id":"FT1","amount":150000}"#;
    let tampered = br#"{"external_id":"FT1","amount":999999}"#;
    let signature = sign(secret, body);

    assert!(verify_signature(secret.as_bytes(), tampered, &signature).is_err());
}

#[test]
fn rejects_a_wrong_secret() {
    let body = br#"{"external_id":"FT1","amount":150000}"#;
    let signature = sign("webhook_secret_key", body);

    assert!(verify_signature(b"another_secret", body, &signature).is_err());
}

#[test]
fn rejects_malformed_signature_hex() {
    let body = br#"{}"#;
    assert!(verify_signature(b"secret", body, "not-hex-at-all").is_err());
    assert!(verify_signature(b"secret", body, "").is_err());
}
