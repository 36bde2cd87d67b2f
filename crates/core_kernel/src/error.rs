//! Kernel errors

use thiserror::Error;
use crate::money::MoneyError;

/// Raised while turning raw settings into kernel values
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Invalid setting {setting}: {reason}")]
    Configuration {
        setting: &'static str,
        reason: String,
    },
}

impl CoreError {
    pub fn configuration(setting: &'static str, reason: impl Into<String>) -> Self {
        CoreError::Configuration {
            setting,
            reason: reason.into(),
        }
    }
}
