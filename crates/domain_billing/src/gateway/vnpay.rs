//! VNPAY checkout redirect

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

use core_kernel::{Currency, DocumentId, Money, TransactionId};

use super::signature::{canonical_query, encode, HmacSha512Verifier, SECURE_HASH_FIELD};
use super::PaymentGateway;
use crate::error::BillingError;

const API_VERSION: &str = "2.1.0";
const VIETNAM_UTC_OFFSET_SECS: i32 = 7 * 3600;

/// Merchant settings for VNPAY
#[derive(Debug, Clone, Deserialize)]
pub struct VnpayConfig {
    /// Terminal code assigned to the merchant
    pub tmn_code: String,
    pub hash_secret: String,
    /// Payment page base URL
    pub payment_url: String,
    /// Where the customer's browser lands after paying
    pub return_url: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Validity window of a checkout link
    #[serde(default = "default_expire_minutes")]
    pub expire_minutes: i64,
}

fn default_locale() -> String {
    "vn".to_string()
}

fn default_expire_minutes() -> i64 {
    15
}

/// Everything needed to build a checkout URL
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub transaction_id: TransactionId,
    pub document_id: DocumentId,
    pub amount: Money,
    /// Overrides the configured return URL
    pub return_url: Option<String>,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
}

/// VNPAY implementation of [`PaymentGateway`]
#[derive(Debug, Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
    signer: HmacSha512Verifier,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        let signer = HmacSha512Verifier::new(config.hash_secret.clone());
        Self { config, signer }
    }

    /// Signer sharing this gateway's secret, for verifying its callbacks
    pub fn verifier(&self) -> HmacSha512Verifier {
        self.signer.clone()
    }

    fn checkout_params(&self, request: &CheckoutRequest) -> Result<BTreeMap<String, String>, BillingError> {
        if request.amount.currency() != Currency::VND {
            return Err(BillingError::validation(format!(
                "VNPAY only accepts VND, got {}",
                request.amount.currency()
            )));
        }
        let raw_amount = request
            .amount
            .to_minor()?
            .checked_mul(100)
            .ok_or_else(|| BillingError::validation("amount too large for VNPAY"))?;

        let offset = FixedOffset::east_opt(VIETNAM_UTC_OFFSET_SECS)
            .ok_or_else(|| BillingError::validation("invalid gateway time zone"))?;
        let created = request.created_at.with_timezone(&offset);
        let expires = created + Duration::minutes(self.config.expire_minutes);

        let return_url = request
            .return_url
            .clone()
            .unwrap_or_else(|| self.config.return_url.clone());

        let params = [
            ("vnp_Version", API_VERSION.to_string()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", raw_amount.to_string()),
            ("vnp_CurrCode", Currency::VND.code().to_string()),
            ("vnp_TxnRef", request.transaction_id.as_uuid().simple().to_string()),
            ("vnp_OrderInfo", format!("Payment for {}", request.document_id)),
            ("vnp_OrderType", "other".to_string()),
            ("vnp_Locale", self.config.locale.clone()),
            ("vnp_ReturnUrl", return_url),
            ("vnp_IpAddr", request.client_ip.clone()),
            ("vnp_CreateDate", created.format("%Y%m%d%H%M%S").to_string()),
            ("vnp_ExpireDate", expires.format("%Y%m%d%H%M%S").to_string()),
        ];

        Ok(params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }
}

impl PaymentGateway for VnpayGateway {
    fn name(&self) -> &str {
        "VNPAY"
    }

    fn initiate(&self, request: &CheckoutRequest) -> Result<String, BillingError> {
        let params = self.checkout_params(request)?;
        let hash = self
            .signer
            .sign(&params)
            .map_err(BillingError::GatewayCallbackRejected)?;

        tracing::debug!(
            transaction_id = %request.transaction_id,
            document_id = %request.document_id,
            "Built VNPAY checkout URL"
        );

        Ok(format!(
            "{}?{}&{}={}",
            self.config.payment_url,
            canonical_query(&params),
            SECURE_HASH_FIELD,
            encode(&hash)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::signature::CallbackVerifier;
    use chrono::TimeZone;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "DEMO0001".to_string(),
            hash_secret: "SECRET".to_string(),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "https://dealer.example/payments/return".to_string(),
            locale: default_locale(),
            expire_minutes: default_expire_minutes(),
        })
    }

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            transaction_id: TransactionId::new(),
            document_id: DocumentId::new(),
            amount: Money::from_minor(1_200_000_000, Currency::VND),
            return_url: None,
            client_ip: "127.0.0.1".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap(),
        }
    }

    fn query_params(url: &str) -> BTreeMap<String, String> {
        let query = url.split_once('?').map(|(_, q)| q).unwrap_or_default();
        url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_checkout_url_is_signed_and_verifiable() {
        let gateway = gateway();
        let request = request();
        let url = gateway.initiate(&request).unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?"));

        let params = query_params(&url);
        assert_eq!(params["vnp_Amount"], "120000000000");
        assert_eq!(params["vnp_TxnRef"], request.transaction_id.as_uuid().simple().to_string());
        assert_eq!(params["vnp_CreateDate"], "20261018100000");
        assert_eq!(params["vnp_ExpireDate"], "20261018101500");
        assert!(gateway.verifier().verify(&params).is_ok());
    }

    #[test]
    fn test_rejects_non_vnd() {
        let mut request = request();
        request.amount = Money::from_minor(100, Currency::USD);
        assert!(gateway().initiate(&request).is_err());
    }
}
