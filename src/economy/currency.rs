//! Currency naming and display helpers.
//!
//! Balances are plain `f64` amounts; the server presents them in whole units
//! ("250 emeralds", "◆250"). The unit names and symbol come from
//! configuration so servers can rebrand the currency without code changes.

use serde::{Deserialize, Serialize};

/// Display names for the server currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySpec {
    pub singular: String,
    pub plural: String,
    pub symbol: String,
}

impl Default for CurrencySpec {
    fn default() -> Self {
        Self {
            singular: "emerald".to_string(),
            plural: "emeralds".to_string(),
            symbol: "◆".to_string(),
        }
    }
}

impl CurrencySpec {
    /// Whole-unit rendering with the singular/plural unit name:
    /// `1 emerald`, `250 emeralds`.
    pub fn format_amount(&self, amount: f64) -> String {
        let unit = if amount == 1.0 {
            &self.singular
        } else {
            &self.plural
        };
        format!("{:.0} {}", amount, unit)
    }

    /// Compact symbol rendering: `◆250`.
    pub fn format_symbol(&self, amount: f64) -> String {
        format!("{}{:.0}", self.symbol, amount)
    }

    /// Signed rendering for transaction lists: `+30 emeralds`, `-1 emerald`.
    pub fn format_signed(&self, amount: f64) -> String {
        let sign = if amount < 0.0 { "-" } else { "+" };
        format!("{}{}", sign, self.format_amount(amount.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singular_and_plural_units() {
        let spec = CurrencySpec::default();
        assert_eq!(spec.format_amount(1.0), "1 emerald");
        assert_eq!(spec.format_amount(0.0), "0 emeralds");
        assert_eq!(spec.format_amount(250.0), "250 emeralds");
    }

    #[test]
    fn symbol_formatting() {
        let spec = CurrencySpec::default();
        assert_eq!(spec.format_symbol(250.0), "◆250");
        assert_eq!(spec.format_symbol(0.0), "◆0");
    }

    #[test]
    fn signed_formatting_uses_magnitude_for_units() {
        let spec = CurrencySpec::default();
        assert_eq!(spec.format_signed(30.0), "+30 emeralds");
        assert_eq!(spec.format_signed(-30.0), "-30 emeralds");
        assert_eq!(spec.format_signed(-1.0), "-1 emerald");
        assert_eq!(spec.format_signed(0.0), "+0 emeralds");
    }

    #[test]
    fn custom_spec_rebrands() {
        let spec = CurrencySpec {
            singular: "shilling".to_string(),
            plural: "shillings".to_string(),
            symbol: "s".to_string(),
        };
        assert_eq!(spec.format_amount(12.0), "12 shillings");
        assert_eq!(spec.format_symbol(12.0), "s12");
    }
}
