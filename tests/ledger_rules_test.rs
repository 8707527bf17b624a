//! Ledger arithmetic and workflow rules, exercised without a database:
//! conversion truncation, entry-amount conventions, refund clamping,
//! withdrawal validation and outcome serialization.

use pimart_core::db::models::{EntryType, NotificationKind, OrderStatus, WithdrawalStatus};
use pimart_core::services::matcher::MatchOutcome;
use pimart_core::services::wallet::{format_pi, milli_pi_to_vnd, vnd_to_milli_pi};
use pimart_core::services::withdrawal::{CreateWithdrawal, validate_request};
use uuid::Uuid;

#[test]
fn conversion_truncates_toward_zero() {
    // fixed-point integer division: never credit more than the rate allows
    assert_eq!(vnd_to_milli_pi(150_000, 10_000), 15_000);
    assert_eq!(vnd_to_milli_pi(149_999, 10_000), 14_999);
    assert_eq!(vnd_to_milli_pi(5, 10_000), 0);
}

#[test]
fn pi_to_vnd_round_trip_is_bounded() {
    for amount_vnd in [1_000i64, 14_999, 150_000, 987_654] {
        let pi = vnd_to_milli_pi(amount_vnd, 10_000);
        let back = milli_pi_to_vnd(pi, 10_000);
        assert!(back <= amount_vnd);
        assert!(amount_vnd - back < 10_000 / 100); // lost at most one milli-pi worth
    }
}

#[test]
fn format_pi_is_stable_for_descriptions() {
    assert_eq!(format_pi(15_000), "15.000");
    assert_eq!(format_pi(-1), "-0.001");
}

/// End-to-end scenario arithmetic: settle, early release, lock, reject.
/// The pool and entry-sum deltas of each step must cancel exactly.
#[test]
fn lifecycle_deltas_reconcile() {
    let rate = 10_000i64;
    let order_amount_vnd = 150_000i64;
    let accrued = vnd_to_milli_pi(order_amount_vnd, rate);

    // accrual: entry +X, pending +X
    let (mut pending, mut available, mut entry_sum) = (accrued, 0i64, accrued);
    assert_eq!(pending + available, entry_sum);

    // buyer confirms receipt an hour later: pending -> available, no entry amount
    pending -= accrued;
    available += accrued;
    assert_eq!(pending + available, entry_sum);
    assert_eq!(pending, 0);

    // withdrawal request locks funds: entry -X, available -X
    let withdrawal = 10_000i64;
    available -= withdrawal;
    entry_sum -= withdrawal;
    assert_eq!(pending + available, entry_sum);

    // admin rejects: entry +X, available +X, back to the prior balance
    available += withdrawal;
    entry_sum += withdrawal;
    assert_eq!(pending + available, entry_sum);
    assert_eq!(available, accrued);
}

/// Dispute refund on funds still in escrow: pending and lifetime total both
/// drop by the held amount and the wallet can never go negative.
#[test]
fn dispute_refund_clamps_at_pending() {
    let held = 15_000i64;

    // dispute filed while everything is still pending: full refund
    let pending = held;
    let refundable = held.min(pending).max(0);
    assert_eq!(refundable, held);
    assert_eq!(pending - refundable, 0);

    // dispute filed after the funds were already released: nothing to
    // reclaim, shortfall is flagged instead of clawed back
    let pending = 0i64;
    let refundable = held.min(pending).max(0);
    assert_eq!(refundable, 0);
    assert!(held - refundable > 0);
}

#[test]
fn withdrawal_validation_is_synchronous_and_specific() {
    let valid = CreateWithdrawal {
        requester_id: Uuid::new_v4(),
        amount_pi: 5_000,
        bank_name: "Techcombank".to_string(),
        bank_account_number: "19031234567890".to_string(),
        bank_account_name: "TRAN THI B".to_string(),
    };
    assert!(validate_request(&valid, 1_000).is_ok());

    let below_floor = CreateWithdrawal {
        amount_pi: 999,
        ..valid.clone()
    };
    assert!(validate_request(&below_floor, 1_000).is_err());

    let no_account = CreateWithdrawal {
        bank_account_number: String::new(),
        ..valid
    };
    assert!(validate_request(&no_account, 1_000).is_err());
}

#[test]
fn match_outcome_serializes_with_result_tag() {
    let order_id = Uuid::new_v4();
    let matched = serde_json::to_value(MatchOutcome::Matched { order_id }).unwrap();
    assert_eq!(matched["result"], "matched");
    assert_eq!(matched["order_id"], order_id.to_string());

    let unmatched = serde_json::to_value(MatchOutcome::Unmatched {
        reason: "Amount mismatch".to_string(),
    })
    .unwrap();
    assert_eq!(unmatched["result"], "unmatched");

    let duplicate = serde_json::to_value(MatchOutcome::Duplicate).unwrap();
    assert_eq!(duplicate["result"], "duplicate");
}

#[test]
fn closed_enums_cover_the_wire_strings() {
    assert_eq!(
        "disputed".parse::<OrderStatus>().unwrap(),
        OrderStatus::Disputed
    );
    assert_eq!(
        "dispute_refund".parse::<EntryType>().unwrap(),
        EntryType::DisputeRefund
    );
    assert_eq!(
        "approved".parse::<WithdrawalStatus>().unwrap(),
        WithdrawalStatus::Approved
    );
    assert_eq!(NotificationKind::PaymentVerified.as_str(), "payment_verified");
    assert!("debit".parse::<EntryType>().is_err());
}
