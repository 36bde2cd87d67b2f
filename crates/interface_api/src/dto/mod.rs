//! Request and response bodies
//!
//! Money always leaves the API as a decimal string in the ledger currency's
//! minor-unit precision. Incoming amounts may be strings or JSON numbers;
//! numbers are rounded to the nearest minor unit.

pub mod debt;
pub mod documents;
pub mod methods;
pub mod payments;

use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, MoneyError};

/// An amount as sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(f64),
}

impl AmountInput {
    pub fn to_money(&self, currency: Currency) -> Result<Money, MoneyError> {
        match self {
            AmountInput::Text(text) => Money::parse(text, currency),
            AmountInput::Number(value) => Money::from_f64_lenient(*value, currency),
        }
    }
}

/// Renders an amount for a response body
pub fn amount(money: &Money) -> String {
    money.to_plain_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_input_accepts_strings_and_numbers() {
        let text: AmountInput = serde_json::from_str(r#""30000000""#).unwrap();
        let number: AmountInput = serde_json::from_str("30000000").unwrap();

        let expected = Money::from_minor(30_000_000, Currency::VND);
        assert_eq!(text.to_money(Currency::VND).unwrap(), expected);
        assert_eq!(number.to_money(Currency::VND).unwrap(), expected);
    }

    #[test]
    fn test_fractional_text_is_rejected_for_vnd() {
        let text = AmountInput::Text("100.5".to_string());
        assert!(text.to_money(Currency::VND).is_err());
    }

    #[test]
    fn test_amount_renders_plain() {
        assert_eq!(amount(&Money::from_minor(500_000, Currency::VND)), "500000");
    }

    proptest::proptest! {
        #[test]
        fn whole_dong_numbers_match_their_text(value in 0i64..1_000_000_000_000i64) {
            let text = AmountInput::Text(value.to_string()).to_money(Currency::VND).unwrap();
            let number = AmountInput::Number(value as f64).to_money(Currency::VND).unwrap();
            proptest::prop_assert_eq!(text, number);
        }
    }
}
