//! Custom Test Assertions
//!
//! Assertion helpers for ledger types that give more meaningful failure
//! messages than standard assertions.

use core_kernel::Money;
use domain_billing::{
    derive, BillableDocument, DebtSummaryRow, DocumentStatus, PaymentStatus, Transaction,
    TransactionState,
};

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that money values sum to a total
///
/// # Panics
///
/// Panics if the currencies differ or the sum doesn't equal the total
pub fn assert_money_sum_equals(parts: &[Money], total: &Money) {
    let sum = Money::sum(total.currency(), parts).expect("Currency mismatch in sum");

    assert_eq!(
        sum.amount(),
        total.amount(),
        "Sum of parts ({}) doesn't equal total ({})",
        sum.amount(),
        total.amount()
    );
}

/// Asserts a document's derived status and remaining amount
pub fn assert_document_status(status: &DocumentStatus, expected: PaymentStatus, remaining: &Money) {
    assert_eq!(
        status.status, expected,
        "Document {} is {}, expected {}",
        status.document_id, status.status, expected
    );
    assert_eq!(
        &status.remaining_amount, remaining,
        "Document {} has {} remaining, expected {}",
        status.document_id, status.remaining_amount, remaining
    );
}

/// Asserts that a transaction ended in `expected`
pub fn assert_transaction_state(tx: &Transaction, expected: TransactionState) {
    assert_eq!(
        tx.state, expected,
        "Transaction {} is {}, expected {}",
        tx.id, tx.state, expected
    );
}

/// Asserts the balance identities of a debt row
///
/// `current_balance` must equal the sum of the documents' remaining amounts,
/// and `total_owed - total_paid == current_balance`.
pub fn assert_debt_row_consistent(
    row: &DebtSummaryRow,
    documents: &[(BillableDocument, Vec<Transaction>)],
) {
    let remaining: Vec<Money> = documents
        .iter()
        .map(|(doc, txs)| {
            derive(doc.total_amount(), txs)
                .expect("derivation failed")
                .remaining_amount
        })
        .collect();
    assert_money_sum_equals(&remaining, &row.current_balance);

    let outstanding = row
        .total_owed
        .checked_sub(&row.total_paid)
        .expect("Currency mismatch in debt row");
    assert_eq!(
        outstanding, row.current_balance,
        "total_owed - total_paid ({}) doesn't equal current_balance ({}) for {}",
        outstanding, row.current_balance, row.owner
    );
}

/// Asserts that a result is Ok and returns the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $msg, e),
        }
    };
}

/// Asserts that a result is Err and returns the error
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("Expected Err, got Ok: {:?}", value),
            Err(e) => e,
        }
    };
}

/// Asserts that an error matches a specific variant
#[macro_export]
macro_rules! assert_err_variant {
    ($result:expr, $pattern:pat) => {
        match $result {
            Err($pattern) => {}
            Err(other) => panic!("Error variant mismatch: got {:?}", other),
            Ok(value) => panic!("Expected Err({}), got Ok: {:?}", stringify!($pattern), value),
        }
    };
}
