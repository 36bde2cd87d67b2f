//! PostgreSQL Document Adapter
//!
//! Stores the snapshots of customer orders and dealer invoices that the
//! owning subsystems push to the ledger.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    CustomerId, DealerId, DocumentId, DomainPort, HealthCheckResult, HealthCheckable, PortError,
};
use domain_billing::{
    BillableDocument, CustomerOrder, DealerInvoice, DocumentKind, DocumentStore, OwnerKind,
    OwnerRef,
};

use crate::adapters::ping;
use crate::error::DatabaseError;
use crate::rows::{money, parse_label};

const DOCUMENT_COLUMNS: &str = "document_id, kind, owner_id, selling_dealer, total_amount, \
     currency, due_date, issued_at";

/// PostgreSQL-backed [`DocumentStore`]
#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl DomainPort for PostgresDocumentStore {}

#[async_trait]
impl HealthCheckable for PostgresDocumentStore {
    async fn health_check(&self) -> HealthCheckResult {
        ping(&self.pool, "postgres-document-store").await
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self), fields(document_id = %id))]
    async fn get_document(&self, id: DocumentId) -> Result<BillableDocument, PortError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM billable_documents WHERE document_id = $1",
            DOCUMENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from)?
        .ok_or_else(|| DatabaseError::not_found("Document", id))?;

        Ok(document_from_row(&row)?)
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn list_by_owner(&self, owner: &OwnerRef) -> Result<Vec<DocumentId>, PortError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT document_id FROM billable_documents \
             WHERE owner_kind = $1 AND owner_id = $2 \
             ORDER BY document_id",
        )
        .bind(owner.kind().as_str())
        .bind(owner.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(ids.into_iter().map(DocumentId::from).collect())
    }

    #[instrument(skip(self))]
    async fn list_owners(&self, kind: OwnerKind) -> Result<Vec<OwnerRef>, PortError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT owner_id FROM billable_documents \
             WHERE owner_kind = $1 \
             ORDER BY owner_id",
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        Ok(ids
            .into_iter()
            .map(|id| match kind {
                OwnerKind::Customer => OwnerRef::Customer(CustomerId::from(id)),
                OwnerKind::Dealer => OwnerRef::Dealer(DealerId::from(id)),
            })
            .collect())
    }

    #[instrument(skip(self, document), fields(document_id = %document.id(), kind = %document.kind()))]
    async fn save_document(&self, document: &BillableDocument) -> Result<(), PortError> {
        let owner = document.owner();
        let (selling_dealer, issued_at) = match document {
            BillableDocument::CustomerOrder(o) => (o.dealer_id.map(Uuid::from), o.created_at),
            BillableDocument::DealerInvoice(i) => (None, i.issued_at),
        };
        let total = document.total_amount();

        // A re-sync refreshes details only; kind, owner and total are fixed
        let result = sqlx::query(
            "INSERT INTO billable_documents (
                document_id, kind, owner_kind, owner_id, selling_dealer,
                total_amount, currency, due_date, issued_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (document_id) DO UPDATE SET
                selling_dealer = EXCLUDED.selling_dealer,
                due_date = EXCLUDED.due_date,
                issued_at = EXCLUDED.issued_at,
                synced_at = NOW()
            WHERE billable_documents.kind = EXCLUDED.kind
              AND billable_documents.owner_kind = EXCLUDED.owner_kind
              AND billable_documents.owner_id = EXCLUDED.owner_id
              AND billable_documents.total_amount = EXCLUDED.total_amount
              AND billable_documents.currency = EXCLUDED.currency",
        )
        .bind(document.id().as_uuid())
        .bind(document.kind().as_str())
        .bind(owner.kind().as_str())
        .bind(owner.as_uuid())
        .bind(selling_dealer)
        .bind(total.amount())
        .bind(total.currency().code())
        .bind(document.due_date())
        .bind(issued_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(PortError::validation(format!(
                "document {} already exists with a different kind, owner or total",
                document.id()
            )));
        }

        debug!("Document snapshot saved");
        Ok(())
    }
}

fn document_from_row(row: &PgRow) -> Result<BillableDocument, DatabaseError> {
    let id = DocumentId::from(row.try_get::<Uuid, _>("document_id")?);
    let kind: DocumentKind = parse_label("kind", row.try_get::<&str, _>("kind")?)?;
    let owner_id: Uuid = row.try_get("owner_id")?;
    let total = money(row.try_get("total_amount")?, row.try_get("currency")?)?;
    let issued_at: DateTime<Utc> = row.try_get("issued_at")?;

    let document = match kind {
        DocumentKind::CustomerOrder => BillableDocument::CustomerOrder(CustomerOrder {
            order_id: id,
            customer_id: CustomerId::from(owner_id),
            dealer_id: row
                .try_get::<Option<Uuid>, _>("selling_dealer")?
                .map(DealerId::from),
            total_amount: total,
            created_at: issued_at,
        }),
        DocumentKind::DealerInvoice => {
            let due_date: NaiveDate = row
                .try_get::<Option<NaiveDate>, _>("due_date")?
                .ok_or_else(|| DatabaseError::corrupt(format!("invoice {} has no due date", id)))?;
            BillableDocument::DealerInvoice(DealerInvoice {
                invoice_id: id,
                dealer_id: DealerId::from(owner_id),
                total_amount: total,
                due_date,
                issued_at,
            })
        }
    };
    Ok(document)
}
