//! Gateway callback parsing and acknowledgement

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use core_kernel::{Money, TransactionId};

use crate::workflow::GatewayVerdict;

/// Provider sentinel for success in both the response and status codes
pub const SUCCESS_CODE: &str = "00";

/// Why a callback was not applied
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackRejection {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("missing field {0}")]
    MissingField(&'static str),

    #[error("malformed field {field}: {value}")]
    MalformedField { field: &'static str, value: String },

    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: i64 },

    #[error("unknown transaction {0}")]
    UnknownTransaction(String),

    /// The callback was valid but could not be applied
    #[error("unprocessable callback: {0}")]
    Unprocessable(String),
}

/// The fields of a callback the ledger acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    pub transaction_id: TransactionId,
    /// `vnp_Amount`: the amount in minor units multiplied by 100
    pub raw_amount: i64,
    pub response_code: String,
    pub transaction_status: String,
    /// Provider transaction number
    pub gateway_ref: Option<String>,
    pub bank_code: Option<String>,
}

impl GatewayCallback {
    /// Extracts the callback fields; call only after the signature checked out
    pub fn parse(params: &BTreeMap<String, String>) -> Result<Self, CallbackRejection> {
        let txn_ref = required(params, "vnp_TxnRef")?;
        let transaction_id = txn_ref
            .parse::<TransactionId>()
            .map_err(|_| CallbackRejection::MalformedField {
                field: "vnp_TxnRef",
                value: txn_ref.to_string(),
            })?;

        let amount = required(params, "vnp_Amount")?;
        let raw_amount = amount
            .parse::<i64>()
            .map_err(|_| CallbackRejection::MalformedField {
                field: "vnp_Amount",
                value: amount.to_string(),
            })?;

        Ok(Self {
            transaction_id,
            raw_amount,
            response_code: required(params, "vnp_ResponseCode")?.to_string(),
            transaction_status: required(params, "vnp_TransactionStatus")?.to_string(),
            gateway_ref: optional(params, "vnp_TransactionNo"),
            bank_code: optional(params, "vnp_BankCode"),
        })
    }

    /// Classifies the provider codes
    ///
    /// Success needs both codes to equal the sentinel. A non-success
    /// response code is an explicit failure. Anything else stays pending.
    pub fn verdict(&self) -> GatewayVerdict {
        if self.response_code != SUCCESS_CODE {
            return GatewayVerdict::Failure {
                code: self.response_code.clone(),
            };
        }
        if self.transaction_status == SUCCESS_CODE {
            GatewayVerdict::Success {
                gateway_ref: self.gateway_ref.clone(),
            }
        } else {
            GatewayVerdict::Inconclusive {
                code: self.transaction_status.clone(),
            }
        }
    }

    /// Checks the callback amount against the recorded transaction amount
    pub fn check_amount(&self, expected: &Money) -> Result<(), CallbackRejection> {
        let expected_raw = expected
            .to_minor()
            .ok()
            .and_then(|minor| minor.checked_mul(100))
            .ok_or_else(|| CallbackRejection::Unprocessable(format!("amount {} out of range", expected)))?;

        if expected_raw != self.raw_amount {
            return Err(CallbackRejection::AmountMismatch {
                expected: expected_raw,
                received: self.raw_amount,
            });
        }
        Ok(())
    }
}

fn required<'a>(
    params: &'a BTreeMap<String, String>,
    field: &'static str,
) -> Result<&'a str, CallbackRejection> {
    params
        .get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(CallbackRejection::MissingField(field))
}

fn optional(params: &BTreeMap<String, String>, field: &str) -> Option<String> {
    params
        .get(field)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// What handling a callback did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Transaction moved to SUCCESS
    Settled { transaction_id: TransactionId },
    /// Transaction moved to FAILED
    Failed { transaction_id: TransactionId },
    /// Replay of a callback whose result was already applied
    AlreadyFinal { transaction_id: TransactionId },
    /// Inconclusive result; the transaction stays PENDING_GATEWAY
    Pending { transaction_id: TransactionId },
    Rejected(CallbackRejection),
}

impl ReconciliationOutcome {
    /// The body the provider expects in reply to its IPN call
    pub fn acknowledgement(&self) -> ProviderAck {
        let (code, message) = match self {
            ReconciliationOutcome::Settled { .. } | ReconciliationOutcome::Failed { .. } => {
                ("00", "Confirm Success")
            }
            ReconciliationOutcome::AlreadyFinal { .. } => ("02", "Order already confirmed"),
            ReconciliationOutcome::Pending { .. } => ("99", "Payment not final"),
            ReconciliationOutcome::Rejected(rejection) => match rejection {
                CallbackRejection::UnknownTransaction(_) => ("01", "Order not found"),
                CallbackRejection::AmountMismatch { .. } => ("04", "Invalid amount"),
                CallbackRejection::InvalidSignature => ("97", "Invalid signature"),
                CallbackRejection::MissingField(_)
                | CallbackRejection::MalformedField { .. }
                | CallbackRejection::Unprocessable(_) => ("99", "Unknown error"),
            },
        };
        ProviderAck {
            rsp_code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ReconciliationOutcome::Rejected(_))
    }
}

/// IPN acknowledgement body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    fn params(response: &str, status: &str) -> BTreeMap<String, String> {
        let tx = TransactionId::new();
        [
            ("vnp_TxnRef", tx.as_uuid().simple().to_string()),
            ("vnp_Amount", "120000000000".to_string()),
            ("vnp_ResponseCode", response.to_string()),
            ("vnp_TransactionStatus", status.to_string()),
            ("vnp_TransactionNo", "14123456".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_success_requires_both_sentinels() {
        let callback = GatewayCallback::parse(&params("00", "00")).unwrap();
        assert_eq!(
            callback.verdict(),
            GatewayVerdict::Success { gateway_ref: Some("14123456".to_string()) }
        );
    }

    #[test]
    fn test_non_success_response_is_failure() {
        let callback = GatewayCallback::parse(&params("24", "02")).unwrap();
        assert_eq!(callback.verdict(), GatewayVerdict::Failure { code: "24".to_string() });
    }

    #[test]
    fn test_unfinished_status_is_inconclusive() {
        let callback = GatewayCallback::parse(&params("00", "01")).unwrap();
        assert_eq!(callback.verdict(), GatewayVerdict::Inconclusive { code: "01".to_string() });
    }

    #[test]
    fn test_missing_and_malformed_fields() {
        let mut p = params("00", "00");
        p.remove("vnp_ResponseCode");
        assert_eq!(
            GatewayCallback::parse(&p),
            Err(CallbackRejection::MissingField("vnp_ResponseCode"))
        );

        let mut p = params("00", "00");
        p.insert("vnp_TxnRef".to_string(), "not-a-uuid".to_string());
        assert!(matches!(
            GatewayCallback::parse(&p),
            Err(CallbackRejection::MalformedField { field: "vnp_TxnRef", .. })
        ));
    }

    #[test]
    fn test_amount_is_minor_units_times_100() {
        let callback = GatewayCallback::parse(&params("00", "00")).unwrap();
        assert!(callback.check_amount(&Money::from_minor(1_200_000_000, Currency::VND)).is_ok());
        assert!(matches!(
            callback.check_amount(&Money::from_minor(1_000, Currency::VND)),
            Err(CallbackRejection::AmountMismatch { .. })
        ));
    }

    #[test]
    fn test_acknowledgement_codes() {
        let id = TransactionId::new();
        let code = |o: ReconciliationOutcome| o.acknowledgement().rsp_code;
        assert_eq!(code(ReconciliationOutcome::Settled { transaction_id: id }), "00");
        assert_eq!(code(ReconciliationOutcome::AlreadyFinal { transaction_id: id }), "02");
        assert_eq!(code(ReconciliationOutcome::Rejected(CallbackRejection::InvalidSignature)), "97");
        assert_eq!(
            code(ReconciliationOutcome::Rejected(CallbackRejection::UnknownTransaction("x".into()))),
            "01"
        );
    }
}
