//! Debt aggregation
//!
//! Read-side rollups of document balances per customer or dealer. Every
//! figure is built from [`derive`], so an owner's balance always equals the
//! sum of the remaining amounts of their documents.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{Currency, DealerId, DocumentId, Money};

use crate::derivation::derive;
use crate::document::{BillableDocument, OwnerRef};
use crate::error::BillingError;
use crate::transaction::Transaction;

/// 1-based page selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub const MAX_PER_PAGE: u32 = 200;

    /// Clamps `page` to at least 1 and `per_page` to 1..=200
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    /// Number of items across all pages
    pub total: u64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page.max(1) as u64)
    }
}

/// Debt position of one customer or dealer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtSummaryRow {
    pub owner: OwnerRef,
    pub currency: Currency,
    pub document_count: usize,
    pub total_owed: Money,
    /// Portion of the payments applied against document totals
    pub total_paid: Money,
    pub current_balance: Money,
    /// Payments received beyond document totals
    pub unapplied_credit: Money,
}

/// Everything the aggregator needs about one owner
#[derive(Debug, Clone)]
pub struct OwnerPortfolio {
    pub owner: OwnerRef,
    pub documents: Vec<BillableDocument>,
    pub transactions: HashMap<DocumentId, Vec<Transaction>>,
}

/// Remaining balance grouped by days past due
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgingBuckets {
    /// Not yet due, or due today
    pub current: Money,
    pub days_1_30: Money,
    pub days_31_60: Money,
    pub days_over_60: Money,
}

impl AgingBuckets {
    fn empty(currency: Currency) -> Self {
        let zero = Money::zero(currency);
        Self {
            current: zero,
            days_1_30: zero,
            days_31_60: zero,
            days_over_60: zero,
        }
    }

    fn bucket_mut(&mut self, days_past_due: i64) -> &mut Money {
        match days_past_due {
            d if d <= 0 => &mut self.current,
            1..=30 => &mut self.days_1_30,
            31..=60 => &mut self.days_31_60,
            _ => &mut self.days_over_60,
        }
    }
}

/// Aging of a dealer's invoices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub owner: OwnerRef,
    pub as_of: NaiveDate,
    pub buckets: AgingBuckets,
    pub total: Money,
}

/// Builds debt summaries and aging reports
#[derive(Debug, Clone, Copy)]
pub struct DebtAggregator {
    currency: Currency,
}

impl DebtAggregator {
    pub fn new(currency: Currency) -> Self {
        Self { currency }
    }

    /// Summarizes one owner's documents
    ///
    /// # Errors
    ///
    /// `Validation` if a document belongs to another owner; `Money` if a
    /// document or transaction is not in the aggregator's currency
    pub fn summarize(
        &self,
        owner: &OwnerRef,
        documents: &[BillableDocument],
        transactions: &HashMap<DocumentId, Vec<Transaction>>,
    ) -> Result<DebtSummaryRow, BillingError> {
        let zero = Money::zero(self.currency);
        let mut total_owed = zero;
        let mut total_paid = zero;
        let mut current_balance = zero;
        let mut unapplied_credit = zero;

        for document in documents {
            ensure_owned_by(document, owner)?;
            let txs = transactions.get(&document.id()).map(Vec::as_slice).unwrap_or(&[]);
            let derived = derive(document.total_amount(), txs)?;

            let applied = derived.total_amount.checked_sub(&derived.remaining_amount)?;
            total_owed = total_owed.checked_add(&derived.total_amount)?;
            total_paid = total_paid.checked_add(&applied)?;
            current_balance = current_balance.checked_add(&derived.remaining_amount)?;
            unapplied_credit = unapplied_credit.checked_add(&derived.overpaid_amount()?)?;
        }

        Ok(DebtSummaryRow {
            owner: *owner,
            currency: self.currency,
            document_count: documents.len(),
            total_owed,
            total_paid,
            current_balance,
            unapplied_credit,
        })
    }

    /// Summarizes many owners, largest balance first
    pub fn summarize_all(
        &self,
        portfolios: &[OwnerPortfolio],
        page: PageRequest,
    ) -> Result<Page<DebtSummaryRow>, BillingError> {
        let mut rows = portfolios
            .iter()
            .map(|p| self.summarize(&p.owner, &p.documents, &p.transactions))
            .collect::<Result<Vec<_>, _>>()?;

        rows.sort_by(|a, b| {
            b.current_balance
                .amount()
                .cmp(&a.current_balance.amount())
                .then_with(|| a.owner.cmp(&b.owner))
        });

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(page.offset())
            .take(page.per_page as usize)
            .collect();

        Ok(Page {
            items,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    /// Buckets a dealer's outstanding invoice balances by days past due
    ///
    /// Documents without a due date are skipped.
    pub fn aging(
        &self,
        dealer: DealerId,
        documents: &[BillableDocument],
        transactions: &HashMap<DocumentId, Vec<Transaction>>,
        today: NaiveDate,
    ) -> Result<AgingReport, BillingError> {
        let owner = OwnerRef::Dealer(dealer);
        let mut buckets = AgingBuckets::empty(self.currency);
        let mut total = Money::zero(self.currency);

        for document in documents {
            ensure_owned_by(document, &owner)?;
            let Some(due_date) = document.due_date() else {
                continue;
            };
            let txs = transactions.get(&document.id()).map(Vec::as_slice).unwrap_or(&[]);
            let remaining = derive(document.total_amount(), txs)?.remaining_amount;

            let bucket = buckets.bucket_mut((today - due_date).num_days());
            *bucket = bucket.checked_add(&remaining)?;
            total = total.checked_add(&remaining)?;
        }

        Ok(AgingReport {
            owner,
            as_of: today,
            buckets,
            total,
        })
    }
}

fn ensure_owned_by(document: &BillableDocument, owner: &OwnerRef) -> Result<(), BillingError> {
    if document.owner() != *owner {
        return Err(BillingError::validation(format!(
            "document {} belongs to {}, not {}",
            document.id(),
            document.owner(),
            owner
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{invoice, tx_in_state, vnd};
    use crate::transaction::TransactionState;

    fn paid(document: &BillableDocument, amount: i64) -> Transaction {
        let mut tx = tx_in_state(vnd(amount), TransactionState::Success);
        tx.document_id = document.id();
        tx
    }

    #[test]
    fn test_summary_matches_document_balances() {
        let dealer = DealerId::new();
        let a = invoice(dealer, 500_000, 30);
        let b = invoice(dealer, 1_000_000, 30);
        let mut txs = HashMap::new();
        txs.insert(a.id(), vec![paid(&a, 200_000)]);
        txs.insert(b.id(), vec![paid(&b, 1_100_000)]);

        let row = DebtAggregator::new(Currency::VND)
            .summarize(&OwnerRef::Dealer(dealer), &[a, b], &txs)
            .unwrap();

        assert_eq!(row.document_count, 2);
        assert_eq!(row.total_owed, vnd(1_500_000));
        assert_eq!(row.total_paid, vnd(1_200_000));
        assert_eq!(row.current_balance, vnd(300_000));
        assert_eq!(row.unapplied_credit, vnd(100_000));
    }

    #[test]
    fn test_summary_rejects_foreign_document() {
        let doc = invoice(DealerId::new(), 500_000, 0);
        let result = DebtAggregator::new(Currency::VND).summarize(
            &OwnerRef::Dealer(DealerId::new()),
            &[doc],
            &HashMap::new(),
        );
        assert!(matches!(result, Err(BillingError::Validation(_))));
    }

    #[test]
    fn test_summarize_all_orders_and_paginates() {
        let aggregator = DebtAggregator::new(Currency::VND);
        let portfolios: Vec<_> = [100_000, 300_000, 200_000]
            .into_iter()
            .map(|total| {
                let dealer = DealerId::new();
                OwnerPortfolio {
                    owner: OwnerRef::Dealer(dealer),
                    documents: vec![invoice(dealer, total, 10)],
                    transactions: HashMap::new(),
                }
            })
            .collect();

        let first = aggregator.summarize_all(&portfolios, PageRequest::new(1, 2)).unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.total_pages(), 2);
        let balances: Vec<_> = first.items.iter().map(|r| r.current_balance).collect();
        assert_eq!(balances, vec![vnd(300_000), vnd(200_000)]);

        let second = aggregator.summarize_all(&portfolios, PageRequest::new(2, 2)).unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].current_balance, vnd(100_000));
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, per_page: 1 });
        assert_eq!(PageRequest::new(3, 10_000).per_page, PageRequest::MAX_PER_PAGE);
    }

    #[test]
    fn test_aging_buckets() {
        let dealer = DealerId::new();
        let today = chrono::Utc::now().date_naive();
        let docs = vec![
            invoice(dealer, 100, 5),
            invoice(dealer, 200, 0),
            invoice(dealer, 300, -1),
            invoice(dealer, 400, -30),
            invoice(dealer, 500, -31),
            invoice(dealer, 600, -61),
        ];
        let mut txs = HashMap::new();
        txs.insert(docs[5].id(), vec![paid(&docs[5], 600)]);

        let report = DebtAggregator::new(Currency::VND)
            .aging(dealer, &docs, &txs, today)
            .unwrap();

        assert_eq!(report.buckets.current, vnd(300));
        assert_eq!(report.buckets.days_1_30, vnd(700));
        assert_eq!(report.buckets.days_31_60, vnd(500));
        assert!(report.buckets.days_over_60.is_zero());
        assert_eq!(report.total, vnd(1_500));
    }
}
