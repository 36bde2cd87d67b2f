//! Row decoding helpers shared by the adapters
//!
//! Text columns hold the domain's SCREAMING_SNAKE_CASE labels. Anything that
//! fails to parse is reported as a corrupt row rather than silently skipped.

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{Currency, Money, UserId};
use domain_billing::{Actor, DocumentKind, Role, SettlementKind, Transaction, TransactionState};

use crate::error::DatabaseError;

pub(crate) const TRANSACTION_COLUMNS: &str = "transaction_id, document_id, document_kind, \
     amount, currency, method_id, settlement_kind, status, requested_by, requested_role, \
     created_at, updated_at, confirmed_at, confirmed_by, rejected_by, failure_reason, \
     gateway_ref, notes";

/// Parses a text column with the value's own `FromStr`
pub(crate) fn parse_label<T>(column: &str, raw: &str) -> Result<T, DatabaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| DatabaseError::corrupt(format!("{}: {}", column, e)))
}

/// Builds a `Money` from a NUMERIC amount and a CHAR(3) currency column
pub(crate) fn money(amount: Decimal, currency: &str) -> Result<Money, DatabaseError> {
    let currency: Currency = parse_label("currency", currency.trim())?;
    Ok(Money::new(amount, currency))
}

/// Resolves a stored status, accepting legacy labels
pub(crate) fn transaction_state(
    raw: &str,
    settlement_kind: SettlementKind,
) -> Result<TransactionState, DatabaseError> {
    TransactionState::from_label(raw, settlement_kind)
        .map_err(|e| DatabaseError::corrupt(format!("status: {}", e)))
}

pub(crate) fn transaction_from_row(row: &PgRow) -> Result<Transaction, DatabaseError> {
    let settlement_kind: SettlementKind =
        parse_label("settlement_kind", row.try_get::<&str, _>("settlement_kind")?)?;
    let document_kind: DocumentKind =
        parse_label("document_kind", row.try_get::<&str, _>("document_kind")?)?;
    let role: Role = parse_label("requested_role", row.try_get::<&str, _>("requested_role")?)?;

    Ok(Transaction {
        id: row.try_get::<Uuid, _>("transaction_id")?.into(),
        document_id: row.try_get::<Uuid, _>("document_id")?.into(),
        document_kind,
        amount: money(row.try_get("amount")?, row.try_get("currency")?)?,
        method_id: row.try_get::<Uuid, _>("method_id")?.into(),
        settlement_kind,
        state: transaction_state(row.try_get("status")?, settlement_kind)?,
        requested_by: Actor::new(row.try_get::<Uuid, _>("requested_by")?.into(), role),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        confirmed_at: row.try_get("confirmed_at")?,
        confirmed_by: row.try_get::<Option<Uuid>, _>("confirmed_by")?.map(UserId::from),
        rejected_by: row.try_get::<Option<Uuid>, _>("rejected_by")?.map(UserId::from),
        failure_reason: row.try_get("failure_reason")?,
        gateway_ref: row.try_get("gateway_ref")?,
        notes: row.try_get("notes")?,
    })
}
