//! Shared helpers for unit tests in this crate

use chrono::Utc;

use core_kernel::{Currency, CustomerId, DealerId, Money, UserId};

use crate::document::{BillableDocument, CustomerOrder, DealerInvoice};
use crate::identity::{Actor, Role};
use crate::method::{PaymentMethod, SettlementKind, StandardMethods};
use crate::transaction::{Transaction, TransactionState};

pub fn vnd(amount: i64) -> Money {
    Money::from_minor(amount, Currency::VND)
}

pub fn order(total: i64) -> BillableDocument {
    CustomerOrder::new(CustomerId::new(), vnd(total)).unwrap().into()
}

pub fn invoice(dealer: DealerId, total: i64, due_in_days: i64) -> BillableDocument {
    let due = Utc::now().date_naive() + chrono::Duration::days(due_in_days);
    DealerInvoice::new(dealer, vnd(total), due).unwrap().into()
}

pub fn standard_method(kind: SettlementKind) -> PaymentMethod {
    let id = match kind {
        SettlementKind::Gateway => StandardMethods::VNPAY,
        SettlementKind::Manual => StandardMethods::CASH,
    };
    StandardMethods::all().into_iter().find(|m| m.id == id).unwrap()
}

pub fn staff() -> Actor {
    Actor::new(UserId::new(), Role::DealerStaff)
}

/// A transaction forced into `state`, bypassing the state machine
pub fn tx_in_state(amount: Money, state: TransactionState) -> Transaction {
    let kind = match state {
        TransactionState::PendingGateway => SettlementKind::Gateway,
        _ => SettlementKind::Manual,
    };
    let document: BillableDocument =
        CustomerOrder::new(CustomerId::new(), Money::from_minor(1, amount.currency()))
            .unwrap()
            .into();
    let mut tx = Transaction::new(&document, amount, &standard_method(kind), staff(), None);
    tx.state = state;
    tx
}
