//! Core Kernel - Foundational types shared by the payment ledger crates
//!
//! This crate provides the fundamental building blocks used across all modules:
//! - Money types with exact decimal arithmetic
//! - Strongly-typed identifiers for documents, transactions, and owners
//! - Port primitives for the hexagonal storage boundary

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Money, Currency, MoneyError};
pub use identifiers::{
    DocumentId, TransactionId, PaymentMethodId,
    CustomerId, DealerId, UserId,
};
pub use error::CoreError;
pub use ports::{
    PortError, DomainPort, HealthCheckable, HealthCheckResult, AdapterHealth,
};
