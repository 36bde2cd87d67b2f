//! Payment gateway contract
//!
//! Outbound, a [`PaymentGateway`] turns a pending transaction into a redirect
//! URL. Inbound, the provider's IPN callback is verified with a
//! [`CallbackVerifier`], parsed into a [`GatewayCallback`], and answered with
//! the [`ProviderAck`] of its [`ReconciliationOutcome`].

pub mod callback;
pub mod signature;
pub mod vnpay;

pub use callback::{
    CallbackRejection, GatewayCallback, ProviderAck, ReconciliationOutcome, SUCCESS_CODE,
};
pub use signature::{canonical_query, CallbackVerifier, HmacSha512Verifier};
pub use vnpay::{CheckoutRequest, VnpayConfig, VnpayGateway};

use crate::error::BillingError;

/// Builds checkout redirects for a payment provider
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> &str;

    /// Redirect URL that starts the provider's payment flow
    fn initiate(&self, request: &CheckoutRequest) -> Result<String, BillingError>;
}
