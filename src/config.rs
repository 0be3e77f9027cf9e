// ⚙️ Register Configuration - preferences as data
// Loaded from JSON; every field has a default.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::quickfill::QuickFillSort;
use crate::register::RegisterStyle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterConfig {
    /// Ledger, auto-expanding ledger, or journal display
    pub style: RegisterStyle,

    /// Lead rows gain a second physical row for notes
    pub double_line: bool,

    /// Mark the first future-dated transaction with a dividing row
    pub show_present_divider: bool,

    /// Ask before a split leaves the reconciled state
    pub confirm_reconciled_change: bool,

    /// Candidate policy for the description/notes/memo completers
    pub quickfill_sort: QuickFillSort,

    /// chrono format used for the date cell
    pub date_format: String,

    /// Separator between account names in a full account path
    pub account_separator: char,

    /// Currency used when no default account supplies one
    pub default_currency: String,

    /// Decimal places of the default currency
    pub currency_scale: u32,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        RegisterConfig {
            style: RegisterStyle::Ledger,
            double_line: false,
            show_present_divider: true,
            confirm_reconciled_change: true,
            quickfill_sort: QuickFillSort::Lifo,
            date_format: "%Y-%m-%d".to_string(),
            account_separator: ':',
            default_currency: "USD".to_string(),
            currency_scale: 2,
        }
    }
}

impl RegisterConfig {
    /// Load preferences from a JSON file; missing keys fall back to defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read register config: {:?}", path.as_ref()))?;

        let config: RegisterConfig = serde_json::from_str(&content)
            .context("Failed to parse register config JSON")?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RegisterConfig =
            serde_json::from_str(r#"{ "style": "Journal", "double_line": true }"#).unwrap();

        assert_eq!(config.style, RegisterStyle::Journal);
        assert!(config.double_line);
        assert!(config.confirm_reconciled_change);
        assert_eq!(config.account_separator, ':');
        assert_eq!(config.date_format, "%Y-%m-%d");
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = RegisterConfig::from_file("/nonexistent/register.json").unwrap_err();
        assert!(err.to_string().contains("Failed to read register config"));
    }
}
