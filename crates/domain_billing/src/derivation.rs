//! Status derivation
//!
//! A document's payment status is never stored. Every read path calls
//! [`derive`] on the document total and its transactions, so the answer is
//! always consistent with the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{Money, MoneyError};

use crate::transaction::{Transaction, TransactionState};

/// Payment status of a billable document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::PartiallyPaid => "PARTIALLY_PAID",
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`derive`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStatus {
    pub status: PaymentStatus,
    pub total_amount: Money,
    /// Sum of SUCCESS transactions
    pub paid_amount: Money,
    /// Sum of transactions still awaiting a gateway result or an approval
    pub pending_amount: Money,
    /// Never negative; overpayment shows as PAID with zero remaining
    pub remaining_amount: Money,
}

impl DerivedStatus {
    /// Amount paid beyond the total, zero unless the document is overpaid
    pub fn overpaid_amount(&self) -> Result<Money, MoneyError> {
        let excess = self.paid_amount.checked_sub(&self.total_amount)?;
        excess.checked_max(&Money::zero(excess.currency()))
    }
}

/// Derives the payment status of a document
///
/// Only SUCCESS transactions count toward the paid amount. A total of zero
/// or less yields UNPAID with nothing remaining.
///
/// # Errors
///
/// Fails if any transaction amount is in a different currency from the total
pub fn derive(total: Money, transactions: &[Transaction]) -> Result<DerivedStatus, MoneyError> {
    let currency = total.currency();
    let paid = sum_where(total, transactions, |s| s == TransactionState::Success)?;
    let pending = sum_where(total, transactions, |s| s.is_pending())?;
    let zero = Money::zero(currency);

    if !total.is_positive() {
        return Ok(DerivedStatus {
            status: PaymentStatus::Unpaid,
            total_amount: total,
            paid_amount: paid,
            pending_amount: pending,
            remaining_amount: zero,
        });
    }

    let remaining = total.checked_sub(&paid)?;
    let status = if !remaining.is_positive() {
        PaymentStatus::Paid
    } else if paid.is_positive() {
        PaymentStatus::PartiallyPaid
    } else {
        PaymentStatus::Unpaid
    };

    Ok(DerivedStatus {
        status,
        total_amount: total,
        paid_amount: paid,
        pending_amount: pending,
        remaining_amount: remaining.checked_max(&zero)?,
    })
}

/// How much a new payment may still claim against the document
///
/// Pending transactions reserve their amount until they resolve, so two
/// in-flight payments cannot together exceed the total.
pub fn admission_headroom(total: Money, transactions: &[Transaction]) -> Result<Money, MoneyError> {
    let committed = sum_where(total, transactions, |s| s != TransactionState::Failed)?;
    let headroom = total.checked_sub(&committed)?;
    headroom.checked_max(&Money::zero(total.currency()))
}

fn sum_where(
    total: Money,
    transactions: &[Transaction],
    include: impl Fn(TransactionState) -> bool,
) -> Result<Money, MoneyError> {
    Money::sum(
        total.currency(),
        transactions
            .iter()
            .filter(|tx| include(tx.state))
            .map(|tx| &tx.amount),
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::test_support::{tx_in_state, vnd};
    use core_kernel::Currency;
    use proptest::prelude::*;

    fn state_strategy() -> impl Strategy<Value = TransactionState> {
        prop_oneof![
            Just(TransactionState::PendingGateway),
            Just(TransactionState::PendingConfirmation),
            Just(TransactionState::Success),
            Just(TransactionState::Failed),
        ]
    }

    proptest! {
        #[test]
        fn remaining_is_total_minus_success_sum(
            total_minor in 1i64..10_000_000_000i64,
            entries in prop::collection::vec((1i64..5_000_000_000i64, state_strategy()), 0..12)
        ) {
            let total = Money::from_minor(total_minor, Currency::USD);
            let txs: Vec<_> = entries
                .iter()
                .map(|(minor, state)| tx_in_state(Money::from_minor(*minor, Currency::USD), *state))
                .collect();

            let success_minor: i64 = entries
                .iter()
                .filter(|(_, s)| *s == TransactionState::Success)
                .map(|(m, _)| *m)
                .sum();

            let derived = derive(total, &txs).unwrap();
            let expected = (total_minor - success_minor).max(0);
            prop_assert_eq!(derived.remaining_amount, Money::from_minor(expected, Currency::USD));

            let expected_status = if success_minor >= total_minor {
                PaymentStatus::Paid
            } else if success_minor > 0 {
                PaymentStatus::PartiallyPaid
            } else {
                PaymentStatus::Unpaid
            };
            prop_assert_eq!(derived.status, expected_status);
        }

        #[test]
        fn failed_and_pending_never_change_remaining(
            total in 1i64..1_000_000_000i64,
            noise in prop::collection::vec((1i64..1_000_000_000i64, state_strategy()), 0..8)
        ) {
            let non_success: Vec<_> = noise
                .iter()
                .filter(|(_, s)| *s != TransactionState::Success)
                .map(|(m, s)| tx_in_state(vnd(*m), *s))
                .collect();

            let derived = derive(vnd(total), &non_success).unwrap();
            prop_assert_eq!(derived.status, PaymentStatus::Unpaid);
            prop_assert_eq!(derived.remaining_amount, vnd(total));
        }
    }
}
