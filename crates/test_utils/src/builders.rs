//! Test Data Builders
//!
//! Builder patterns for constructing documents, seeded services and provider
//! callbacks. Tests specify only the relevant fields and take defaults for
//! everything else.

use chrono::NaiveDate;
use core_kernel::{CustomerId, DealerId, DocumentId, Money, TransactionId};
use domain_billing::gateway::HmacSha512Verifier;
use domain_billing::{
    BillableDocument, CustomerOrder, DealerInvoice, InMemoryDocumentStore, InMemoryLedgerStore,
    LedgerConfig, PaymentMethodRegistry, PaymentService, VnpayConfig, VnpayGateway,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::fixtures::{GatewayFixtures, IdFixtures, MoneyFixtures, TemporalFixtures};

/// Builder for customer orders
pub struct TestOrderBuilder {
    id: DocumentId,
    customer_id: CustomerId,
    dealer_id: Option<DealerId>,
    total: Money,
}

impl Default for TestOrderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestOrderBuilder {
    /// Creates a new builder with a fresh id and a 30,000,000 ₫ total
    pub fn new() -> Self {
        Self {
            id: DocumentId::new(),
            customer_id: CustomerId::new(),
            dealer_id: None,
            total: MoneyFixtures::order_total(),
        }
    }

    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = id;
        self
    }

    pub fn for_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = customer_id;
        self
    }

    pub fn sold_by(mut self, dealer_id: DealerId) -> Self {
        self.dealer_id = Some(dealer_id);
        self
    }

    pub fn with_total(mut self, total: Money) -> Self {
        self.total = total;
        self
    }

    /// Builds the order
    ///
    /// # Panics
    ///
    /// Panics if the total is not positive
    pub fn build(self) -> BillableDocument {
        let mut order = CustomerOrder::new(self.customer_id, self.total)
            .expect("test order total must be positive")
            .with_id(self.id);
        if let Some(dealer) = self.dealer_id {
            order = order.sold_by(dealer);
        }
        order.into()
    }
}

/// Builder for dealer invoices
pub struct TestInvoiceBuilder {
    id: DocumentId,
    dealer_id: DealerId,
    total: Money,
    due_date: NaiveDate,
}

impl Default for TestInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestInvoiceBuilder {
    /// Creates a new builder for the fixture dealer, due on the fixture date
    pub fn new() -> Self {
        Self {
            id: DocumentId::new(),
            dealer_id: IdFixtures::dealer_id(),
            total: MoneyFixtures::invoice_total(),
            due_date: TemporalFixtures::as_of(),
        }
    }

    pub fn with_id(mut self, id: DocumentId) -> Self {
        self.id = id;
        self
    }

    pub fn for_dealer(mut self, dealer_id: DealerId) -> Self {
        self.dealer_id = dealer_id;
        self
    }

    pub fn with_total(mut self, total: Money) -> Self {
        self.total = total;
        self
    }

    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    /// Due `days` before the fixture "today", i.e. `days` past due
    pub fn overdue_by(mut self, days: i64) -> Self {
        self.due_date = TemporalFixtures::days_before_as_of(days);
        self
    }

    /// Builds the invoice
    ///
    /// # Panics
    ///
    /// Panics if the total is not positive
    pub fn build(self) -> BillableDocument {
        DealerInvoice::new(self.dealer_id, self.total, self.due_date)
            .expect("test invoice total must be positive")
            .with_id(self.id)
            .into()
    }
}

/// Builder for a [`PaymentService`] over in-memory stores
pub struct TestServiceBuilder {
    config: LedgerConfig,
    methods: Option<PaymentMethodRegistry>,
    gateway: bool,
}

impl Default for TestServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestServiceBuilder {
    /// Default ledger settings, standard methods, no gateway
    pub fn new() -> Self {
        Self {
            config: LedgerConfig::default(),
            methods: None,
            gateway: false,
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_methods(mut self, methods: PaymentMethodRegistry) -> Self {
        self.methods = Some(methods);
        self
    }

    /// Enables VNPAY with the fixture merchant settings
    pub fn with_vnpay(mut self) -> Self {
        self.gateway = true;
        self
    }

    pub fn build(self) -> PaymentService {
        let mut service = PaymentService::new(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryDocumentStore::new()),
            self.config,
        );
        if let Some(methods) = self.methods {
            service = service.with_methods(methods);
        }
        if self.gateway {
            let gateway = VnpayGateway::new(vnpay_config());
            let verifier = Arc::new(gateway.verifier());
            service = service.with_gateway(Arc::new(gateway), verifier);
        }
        service
    }
}

/// VNPAY merchant settings matching [`GatewayFixtures`]
pub fn vnpay_config() -> VnpayConfig {
    VnpayConfig {
        tmn_code: GatewayFixtures::tmn_code().to_string(),
        hash_secret: GatewayFixtures::hash_secret().to_string(),
        payment_url: GatewayFixtures::payment_url().to_string(),
        return_url: GatewayFixtures::return_url().to_string(),
        locale: "vn".to_string(),
        expire_minutes: 15,
    }
}

/// Builder for VNPAY IPN query parameters
///
/// Defaults describe a successful payment; the result is signed with the
/// fixture secret unless [`Self::tampered`] is set.
pub struct TestCallbackBuilder {
    transaction_id: TransactionId,
    raw_amount: i64,
    response_code: String,
    transaction_status: String,
    tampered: bool,
}

impl TestCallbackBuilder {
    /// A successful callback for `amount` (whole currency units)
    pub fn new(transaction_id: TransactionId, amount: i64) -> Self {
        Self {
            transaction_id,
            raw_amount: amount * 100,
            response_code: "00".to_string(),
            transaction_status: "00".to_string(),
            tampered: false,
        }
    }

    /// Provider codes, e.g. `("24", "02")` for a customer cancellation
    pub fn with_codes(mut self, response_code: &str, transaction_status: &str) -> Self {
        self.response_code = response_code.to_string();
        self.transaction_status = transaction_status.to_string();
        self
    }

    /// Overrides the reported amount (whole currency units)
    pub fn with_amount(mut self, amount: i64) -> Self {
        self.raw_amount = amount * 100;
        self
    }

    /// Alters a field after signing
    pub fn tampered(mut self) -> Self {
        self.tampered = true;
        self
    }

    /// Builds the signed parameter map
    ///
    /// # Panics
    ///
    /// Panics if signing fails
    pub fn build(self) -> BTreeMap<String, String> {
        let mut params: BTreeMap<String, String> = [
            ("vnp_TmnCode", GatewayFixtures::tmn_code().to_string()),
            ("vnp_TxnRef", self.transaction_id.as_uuid().simple().to_string()),
            ("vnp_Amount", self.raw_amount.to_string()),
            ("vnp_ResponseCode", self.response_code),
            ("vnp_TransactionStatus", self.transaction_status),
            ("vnp_TransactionNo", "14000001".to_string()),
            ("vnp_BankCode", "NCB".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let hash = HmacSha512Verifier::new(GatewayFixtures::hash_secret())
            .sign(&params)
            .expect("signing test callback");
        params.insert("vnp_SecureHash".to_string(), hash);

        if self.tampered {
            params.insert("vnp_BankCode".to_string(), "VCB".to_string());
        }
        params
    }
}
