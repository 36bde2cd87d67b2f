//! Property-Based Test Generators
//!
//! Proptest strategies for ledger data that keeps domain invariants:
//! positive document totals and transactions in the document's currency.

use core_kernel::{Currency, CustomerId, DealerId, Money};
use domain_billing::{
    Actor, BillableDocument, PaymentMethod, Role, StandardMethods, Transaction, TransactionState,
};
use proptest::prelude::*;

use crate::builders::{TestInvoiceBuilder, TestOrderBuilder};
use crate::fixtures::TemporalFixtures;

/// Strategy for positive VND amounts up to 10 billion
pub fn vnd_amount_strategy() -> impl Strategy<Value = i64> {
    1i64..10_000_000_000i64
}

/// Strategy for positive VND Money values
pub fn vnd_money_strategy() -> impl Strategy<Value = Money> {
    vnd_amount_strategy().prop_map(|amount| Money::from_minor(amount, Currency::VND))
}

/// Strategy for any transaction state
pub fn transaction_state_strategy() -> impl Strategy<Value = TransactionState> {
    prop_oneof![
        Just(TransactionState::PendingGateway),
        Just(TransactionState::PendingConfirmation),
        Just(TransactionState::Success),
        Just(TransactionState::Failed),
    ]
}

/// Strategy for a customer order or a dealer invoice with a VND total
pub fn document_strategy() -> impl Strategy<Value = BillableDocument> {
    (vnd_money_strategy(), any::<bool>(), 0i64..120).prop_map(|(total, is_order, overdue)| {
        if is_order {
            TestOrderBuilder::new()
                .for_customer(CustomerId::new())
                .with_total(total)
                .build()
        } else {
            TestInvoiceBuilder::new()
                .for_dealer(DealerId::new())
                .with_total(total)
                .overdue_by(overdue)
                .build()
        }
    })
}

/// Strategy for (amount, state) pairs making up a document's history
pub fn ledger_entries_strategy(max_len: usize) -> impl Strategy<Value = Vec<(i64, TransactionState)>> {
    proptest::collection::vec(
        (1i64..2_000_000_000i64, transaction_state_strategy()),
        0..=max_len,
    )
}

/// Materializes generated entries as transactions of `document`
///
/// States are set directly; the entries describe an end state, not a path
/// through the workflow.
pub fn transactions_for(
    document: &BillableDocument,
    entries: &[(i64, TransactionState)],
) -> Vec<Transaction> {
    let currency = document.total_amount().currency();
    entries
        .iter()
        .map(|(amount, state)| {
            let method = method_for(*state);
            let mut tx = Transaction::new(
                document,
                Money::from_minor(*amount, currency),
                &method,
                Actor::new(core_kernel::UserId::new(), Role::DealerStaff),
                None,
            );
            tx.state = *state;
            tx.created_at = TemporalFixtures::created_at();
            tx.updated_at = tx.created_at;
            tx
        })
        .collect()
}

fn method_for(state: TransactionState) -> PaymentMethod {
    let id = match state {
        TransactionState::PendingGateway => StandardMethods::VNPAY,
        _ => StandardMethods::CASH,
    };
    StandardMethods::all()
        .into_iter()
        .find(|m| m.id == id)
        .expect("standard methods include cash and VNPAY")
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_billing::{derive, PaymentStatus};

    proptest! {
        #[test]
        fn vnd_money_is_always_positive(money in vnd_money_strategy()) {
            prop_assert!(money.is_positive());
            prop_assert_eq!(money.currency(), Currency::VND);
        }

        #[test]
        fn generated_documents_have_positive_totals(doc in document_strategy()) {
            prop_assert!(doc.total_amount().is_positive());
        }

        #[test]
        fn remaining_never_negative(
            doc in document_strategy(),
            entries in ledger_entries_strategy(8),
        ) {
            let txs = transactions_for(&doc, &entries);
            let derived = derive(doc.total_amount(), &txs).unwrap();

            prop_assert!(!derived.remaining_amount.is_negative());
            if derived.remaining_amount.is_zero() {
                prop_assert_eq!(derived.status, PaymentStatus::Paid);
            }
        }
    }
}
