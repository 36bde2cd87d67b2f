//! Pre-built Test Fixtures
//!
//! Ready-to-use test data for the ledger. Amounts are in VND, the default
//! ledger currency, unless a fixture says otherwise.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_kernel::{Currency, CustomerId, DealerId, DocumentId, Money, UserId};
use domain_billing::{Actor, Role};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Shorthand for a whole-dong amount
    pub fn vnd(amount: i64) -> Money {
        Money::from_minor(amount, Currency::VND)
    }

    /// Total of a typical customer vehicle order (30,000,000 ₫)
    pub fn order_total() -> Money {
        Self::vnd(30_000_000)
    }

    /// Total of a typical dealer stock invoice (1,200,000,000 ₫)
    pub fn invoice_total() -> Money {
        Self::vnd(1_200_000_000)
    }

    /// A deposit well below an order total
    pub fn deposit() -> Money {
        Self::vnd(5_000_000)
    }

    pub fn vnd_zero() -> Money {
        Money::zero(Currency::VND)
    }

    /// A USD amount for currency mismatch tests
    pub fn usd_100() -> Money {
        Money::new(dec!(100.00), Currency::USD)
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Fixed "today" for aging tests (Mar 1, 2026)
    pub fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    /// `days` before [`Self::as_of`]
    pub fn days_before_as_of(days: i64) -> NaiveDate {
        Self::as_of() - chrono::Duration::days(days)
    }

    /// Fixed creation instant for transactions
    pub fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }
}

/// Fixture for identifier test data
pub struct IdFixtures;

impl IdFixtures {
    /// Creates a deterministic customer ID for testing
    pub fn customer_id() -> CustomerId {
        CustomerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440001").unwrap())
    }

    /// Creates a deterministic dealer ID for testing
    pub fn dealer_id() -> DealerId {
        DealerId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440002").unwrap())
    }

    /// Creates a deterministic document ID for testing
    pub fn document_id() -> DocumentId {
        DocumentId::from_uuid(Uuid::parse_str("550e8400-e29b-41d4-a716-446655440003").unwrap())
    }
}

/// Fixture for the people acting on the ledger
///
/// Every call returns a fresh user, so two calls never share an identity.
pub struct ActorFixtures;

impl ActorFixtures {
    pub fn with_role(role: Role) -> Actor {
        Actor::new(UserId::new(), role)
    }

    pub fn customer() -> Actor {
        Self::with_role(Role::Customer)
    }

    pub fn dealer_staff() -> Actor {
        Self::with_role(Role::DealerStaff)
    }

    pub fn dealer_manager() -> Actor {
        Self::with_role(Role::DealerManager)
    }

    pub fn manufacturer_staff() -> Actor {
        Self::with_role(Role::ManufacturerStaff)
    }

    pub fn admin() -> Actor {
        Self::with_role(Role::Admin)
    }
}

/// Fixture for gateway settings
pub struct GatewayFixtures;

impl GatewayFixtures {
    pub fn hash_secret() -> &'static str {
        "TESTSECRETTESTSECRETTESTSECRET00"
    }

    pub fn tmn_code() -> &'static str {
        "DEMO0001"
    }

    pub fn payment_url() -> &'static str {
        "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html"
    }

    pub fn return_url() -> &'static str {
        "https://shop.example.com/payment/return"
    }
}
