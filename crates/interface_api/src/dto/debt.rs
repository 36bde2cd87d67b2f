//! Debt DTOs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain_billing::{AgingReport, DebtSummaryRow, Page, PageRequest};

use super::amount;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl PageQuery {
    pub fn to_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(defaults.page),
            self.per_page.unwrap_or(defaults.per_page),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AgingQuery {
    /// Defaults to today (UTC)
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebtSummaryResponse {
    pub owner_kind: String,
    pub owner_id: Uuid,
    pub currency: String,
    pub document_count: usize,
    pub total_owed: String,
    pub total_paid: String,
    pub current_balance: String,
    pub unapplied_credit: String,
}

impl From<&DebtSummaryRow> for DebtSummaryResponse {
    fn from(row: &DebtSummaryRow) -> Self {
        Self {
            owner_kind: row.owner.kind().to_string(),
            owner_id: *row.owner.as_uuid(),
            currency: row.currency.code().to_string(),
            document_count: row.document_count,
            total_owed: amount(&row.total_owed),
            total_paid: amount(&row.total_paid),
            current_balance: amount(&row.current_balance),
            unapplied_credit: amount(&row.unapplied_credit),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl From<&Page<DebtSummaryRow>> for PageResponse<DebtSummaryResponse> {
    fn from(page: &Page<DebtSummaryRow>) -> Self {
        Self {
            items: page.items.iter().map(DebtSummaryResponse::from).collect(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            total_pages: page.total_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingResponse {
    pub dealer_id: Uuid,
    pub as_of: NaiveDate,
    pub currency: String,
    pub current: String,
    pub days_1_30: String,
    pub days_31_60: String,
    pub days_over_60: String,
    pub total: String,
}

impl From<&AgingReport> for AgingResponse {
    fn from(report: &AgingReport) -> Self {
        Self {
            dealer_id: *report.owner.as_uuid(),
            as_of: report.as_of,
            currency: report.total.currency().code().to_string(),
            current: amount(&report.buckets.current),
            days_1_30: amount(&report.buckets.days_1_30),
            days_31_60: amount(&report.buckets.days_31_60),
            days_over_60: amount(&report.buckets.days_over_60),
            total: amount(&report.total),
        }
    }
}
