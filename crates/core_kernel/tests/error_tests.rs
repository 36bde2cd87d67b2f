//! Tests for core_kernel error types

use core_kernel::error::CoreError;
use core_kernel::money::{Currency, MoneyError};
use core_kernel::PortError;

#[test]
fn test_configuration_error_names_the_setting() {
    let error = CoreError::configuration("ledger.max_retry_attempts", "must be at least 1");

    assert!(matches!(
        error,
        CoreError::Configuration { setting: "ledger.max_retry_attempts", .. }
    ));
    assert_eq!(
        error.to_string(),
        "Invalid setting ledger.max_retry_attempts: must be at least 1"
    );
}

#[test]
fn test_unknown_currency_code_converts() {
    let money_error = "XYZ".parse::<Currency>().unwrap_err();
    let core_error: CoreError = money_error.into();

    assert!(matches!(core_error, CoreError::Money(MoneyError::UnknownCurrency(_))));
}

#[test]
fn test_port_error_conflict_is_not_transient() {
    let error = PortError::conflict("version 3 expected, found 4");
    assert!(error.is_conflict());
    assert!(!error.is_transient());
}
