use crate::db::models::{
    BankTransaction, Notification, Order, OrderStatus, UnmatchedTransaction, Wallet,
    WalletLogEntry, WithdrawalRequest, WithdrawalStatus,
};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

// --- Order Queries ---

pub async fn get_order(pool: &PgPool, id: Uuid) -> Result<Option<Order>> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_order_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<String>> {
    sqlx::query_scalar::<_, String>("SELECT status FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

/// Pending orders whose compact identifier starts with the given lowercase
/// hex prefix. LIMIT 2 is enough: the caller only needs to distinguish
/// "exactly one" from "none or many".
pub async fn find_pending_orders_by_prefix(pool: &PgPool, prefix: &str) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE status = 'pending'
        AND REPLACE(id::text, '-', '') LIKE $1 || '%'
        LIMIT 2
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
}

/// Orders stuck in pending past the reconciliation SLA.
pub async fn stale_pending_orders(
    pool: &PgPool,
    older_than_minutes: i64,
    limit: i64,
) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE status = 'pending'
        AND created_at < NOW() - INTERVAL '1 minute' * $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(older_than_minutes)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Conditional pending -> paid flip. Returns affected rows: 0 means the
/// order was not in pending and the caller must classify the conflict.
pub async fn mark_order_paid(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
    bank_tx_id: Uuid,
    paid_at: DateTime<Utc>,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'paid',
            paid_at = $1,
            matched_tx_id = $2,
            delivery_status = 'processing',
            updated_at = NOW()
        WHERE id = $3 AND status = 'pending'
        "#,
    )
    .bind(paid_at)
    .bind(bank_tx_id)
    .bind(order_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Conditional status transition keyed on the expected prior status.
/// Never retried on conflict: zero rows means a real double-processing
/// attempt, not a transient race.
pub async fn update_order_status(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 AND status = $3",
    )
    .bind(to.as_str())
    .bind(order_id)
    .bind(from.as_str())
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Settled orders (paid or later) that carry a linked transaction; input
/// set for the ledger backfill job.
pub async fn settled_orders(pool: &PgPool) -> Result<Vec<Order>> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
        WHERE status IN ('paid', 'completed')
        AND matched_tx_id IS NOT NULL
        AND paid_at IS NOT NULL
        ORDER BY paid_at ASC
        "#,
    )
    .fetch_all(pool)
    .await
}

// --- Matched Transaction Queries ---

pub async fn matched_transaction_exists(pool: &PgPool, external_id: &str) -> Result<bool> {
    let row: Option<i32> =
        sqlx::query_scalar("SELECT 1 FROM bank_transactions WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Insert into the matched store. ON CONFLICT keeps the unique external_id
/// invariant under concurrent duplicate deliveries; 0 rows means another
/// delivery won the race.
pub async fn insert_matched_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    tx: &BankTransaction,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO bank_transactions (
            id, external_id, order_id, amount_vnd, description,
            source_account, occurred_at, matched_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (external_id) DO NOTHING
        "#,
    )
    .bind(tx.id)
    .bind(&tx.external_id)
    .bind(tx.order_id)
    .bind(tx.amount_vnd)
    .bind(&tx.description)
    .bind(&tx.source_account)
    .bind(tx.occurred_at)
    .bind(tx.matched_at)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

// --- Unmatched Transaction Queries ---

pub async fn insert_unmatched_transaction(
    pool: &PgPool,
    tx: &UnmatchedTransaction,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO unmatched_transactions (
            id, external_id, amount_vnd, description,
            source_account, occurred_at, reason, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (external_id) DO NOTHING
        "#,
    )
    .bind(tx.id)
    .bind(&tx.external_id)
    .bind(tx.amount_vnd)
    .bind(&tx.description)
    .bind(&tx.source_account)
    .bind(tx.occurred_at)
    .bind(&tx.reason)
    .bind(tx.created_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_unmatched_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM unmatched_transactions WHERE id = $1")
        .bind(id)
        .execute(&mut **executor)
        .await?;

    Ok(result.rows_affected())
}

pub async fn list_unmatched_transactions(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<UnmatchedTransaction>> {
    sqlx::query_as::<_, UnmatchedTransaction>(
        "SELECT * FROM unmatched_transactions ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Unmatched transactions whose amount equals the order's expected amount;
/// candidate set for the reconciliation sweep.
pub async fn unmatched_transactions_by_amount(
    pool: &PgPool,
    amount_vnd: i64,
) -> Result<Vec<UnmatchedTransaction>> {
    sqlx::query_as::<_, UnmatchedTransaction>(
        "SELECT * FROM unmatched_transactions WHERE amount_vnd = $1 ORDER BY occurred_at ASC",
    )
    .bind(amount_vnd)
    .fetch_all(pool)
    .await
}

// --- Wallet Queries ---

/// Fetch the owner's wallet, creating a zero-balance one on first use.
pub async fn get_or_create_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    owner_id: Uuid,
) -> Result<Wallet> {
    sqlx::query(
        r#"
        INSERT INTO wallets (id, owner_id)
        VALUES ($1, $2)
        ON CONFLICT (owner_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .execute(&mut **executor)
    .await?;

    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(&mut **executor)
        .await
}

pub async fn get_wallet(pool: &PgPool, id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_wallet_by_owner(pool: &PgPool, owner_id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_optional(pool)
        .await
}

/// Accrual arithmetic: pending and lifetime total both grow.
pub async fn credit_pending(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET pending_pi = pending_pi + $1,
            total_earned_pi = total_earned_pi + $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Release arithmetic, guarded so pending can never go negative.
pub async fn move_pending_to_available(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET pending_pi = pending_pi - $1,
            available_pi = available_pi + $1,
            updated_at = NOW()
        WHERE id = $2 AND pending_pi >= $1
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Refund arithmetic: held funds leave both pending and the lifetime total.
pub async fn debit_pending_for_refund(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET pending_pi = pending_pi - $1,
            total_earned_pi = total_earned_pi - $1,
            updated_at = NOW()
        WHERE id = $2 AND pending_pi >= $1
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Withdrawal lock: the conditional check and the decrement are one
/// statement, so concurrent requests cannot double-spend `available`.
pub async fn lock_available(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET available_pi = available_pi - $1,
            updated_at = NOW()
        WHERE id = $2 AND available_pi >= $1
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Exact reversal of `lock_available` for rejected withdrawals.
pub async fn unlock_available(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET available_pi = available_pi + $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

/// Approved withdrawals permanently leave the payable pool.
pub async fn finalize_total_earned(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount_pi: i64,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE wallets
        SET total_earned_pi = total_earned_pi - $1,
            updated_at = NOW()
        WHERE id = $2 AND total_earned_pi >= $1
        "#,
    )
    .bind(amount_pi)
    .bind(wallet_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

// --- Wallet Log Entry Queries ---

pub async fn insert_wallet_log_entry(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &WalletLogEntry,
) -> Result<WalletLogEntry> {
    sqlx::query_as::<_, WalletLogEntry>(
        r#"
        INSERT INTO wallet_log_entries (
            id, wallet_id, order_id, entry_type, status,
            amount_pi, amount_vnd, description, release_at, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(entry.wallet_id)
    .bind(entry.order_id)
    .bind(&entry.entry_type)
    .bind(&entry.status)
    .bind(entry.amount_pi)
    .bind(entry.amount_vnd)
    .bind(&entry.description)
    .bind(entry.release_at)
    .bind(entry.created_at)
    .fetch_one(&mut **executor)
    .await
}

/// Idempotency probe for accrual: has this order already earned?
pub async fn earning_entry_exists(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<bool> {
    let row: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM wallet_log_entries WHERE order_id = $1 AND entry_type = 'earning'",
    )
    .bind(order_id)
    .fetch_optional(&mut **executor)
    .await?;

    Ok(row.is_some())
}

/// Entries due for scheduled release. Entries whose order is disputed (or
/// already refunded) are excluded: the dispute gate. This is a plain read;
/// each entry is then released in its own transaction behind a conditional
/// status flip, so concurrent sweep ticks cannot double-process a row.
pub async fn due_pending_entries(
    pool: &PgPool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<WalletLogEntry>> {
    sqlx::query_as::<_, WalletLogEntry>(
        r#"
        SELECT e.* FROM wallet_log_entries e
        LEFT JOIN orders o ON o.id = e.order_id
        WHERE e.status = 'pending'
        AND e.release_at IS NOT NULL
        AND e.release_at <= $1
        AND (o.id IS NULL OR o.status NOT IN ('disputed', 'refunded'))
        ORDER BY e.release_at ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn pending_entries_for_order(
    executor: &mut SqlxTransaction<'_, Postgres>,
    order_id: Uuid,
) -> Result<Vec<WalletLogEntry>> {
    sqlx::query_as::<_, WalletLogEntry>(
        r#"
        SELECT * FROM wallet_log_entries
        WHERE order_id = $1 AND status = 'pending'
        FOR UPDATE
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut **executor)
    .await
}

/// Conditional pending -> released flip; 0 rows means someone else already
/// released the entry (benign race with early release).
pub async fn mark_entry_released(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry_id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE wallet_log_entries SET status = 'released' WHERE id = $1 AND status = 'pending'",
    )
    .bind(entry_id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn entries_for_wallet(
    pool: &PgPool,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<WalletLogEntry>> {
    sqlx::query_as::<_, WalletLogEntry>(
        r#"
        SELECT * FROM wallet_log_entries
        WHERE wallet_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Signed sum over the whole log; the ledger invariant compares this
/// against pending + available.
pub async fn sum_entry_amounts(pool: &PgPool, wallet_id: Uuid) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(amount_pi), 0) FROM wallet_log_entries WHERE wallet_id = $1",
    )
    .bind(wallet_id)
    .fetch_one(pool)
    .await
}

// --- Withdrawal Queries ---

pub async fn insert_withdrawal_request(
    executor: &mut SqlxTransaction<'_, Postgres>,
    request: &WithdrawalRequest,
) -> Result<WithdrawalRequest> {
    sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        INSERT INTO withdrawal_requests (
            id, requester_id, wallet_id, amount_pi, amount_vnd,
            bank_name, bank_account_number, bank_account_name,
            status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(request.id)
    .bind(request.requester_id)
    .bind(request.wallet_id)
    .bind(request.amount_pi)
    .bind(request.amount_vnd)
    .bind(&request.bank_name)
    .bind(&request.bank_account_number)
    .bind(&request.bank_account_name)
    .bind(&request.status)
    .bind(request.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_withdrawal_request(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<WithdrawalRequest>> {
    sqlx::query_as::<_, WithdrawalRequest>("SELECT * FROM withdrawal_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Conditional state transition; None means the request was not in the
/// expected source state (concurrent admin action).
pub async fn transition_withdrawal(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
    processed_by: Uuid,
    rejection_reason: Option<&str>,
) -> Result<Option<WithdrawalRequest>> {
    sqlx::query_as::<_, WithdrawalRequest>(
        r#"
        UPDATE withdrawal_requests
        SET status = $1,
            rejection_reason = COALESCE($2, rejection_reason),
            processed_by = $3,
            processed_at = NOW()
        WHERE id = $4 AND status = $5
        RETURNING *
        "#,
    )
    .bind(to.as_str())
    .bind(rejection_reason)
    .bind(processed_by)
    .bind(id)
    .bind(from.as_str())
    .fetch_optional(&mut **executor)
    .await
}

/// Rolling-window rate limit probe: one open pending request at a time.
pub async fn has_open_withdrawal(
    pool: &PgPool,
    requester_id: Uuid,
    window_hours: i64,
) -> Result<bool> {
    let row: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT 1 FROM withdrawal_requests
        WHERE requester_id = $1
        AND status = 'pending'
        AND created_at > NOW() - INTERVAL '1 hour' * $2
        LIMIT 1
        "#,
    )
    .bind(requester_id)
    .bind(window_hours)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

// --- Notification Queries ---

pub async fn insert_notification(pool: &PgPool, notification: &Notification) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, kind, title, body, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(notification.id)
    .bind(notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
