//! SQL quoting and identifier utilities.
//!
//! Every identifier that reaches compiled SQL goes through
//! [`SqlSecurity::quote_identifier`], and every string literal through
//! [`SqlSecurity::quote_literal`]. User-controlled text is never spliced
//! into a statement unquoted.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{JoineryError, Result};

/// Prefix for engine table identifiers derived from dataset ids.
pub const TABLE_PREFIX: &str = "ds_";

/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LENGTH: usize = 256;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and double-quotes a SQL identifier, doubling any internal `"`.
    ///
    /// # Examples
    /// ```rust
    /// use joinery::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::quote_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert_eq!(SqlSecurity::quote_identifier("a\"b").unwrap(), "\"a\"\"b\"");
    /// assert!(SqlSecurity::quote_identifier("").is_err());
    /// ```
    pub fn quote_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates an identifier without quoting it.
    ///
    /// Quoting makes almost any text a legal identifier, so only empty,
    /// over-long and NUL-containing names are rejected.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(JoineryError::invalid_operation(
                "SQL identifier cannot be empty or whitespace-only",
            ));
        }
        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(JoineryError::invalid_operation(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }
        if identifier.contains('\0') {
            return Err(JoineryError::invalid_operation(
                "SQL identifier cannot contain null bytes",
            ));
        }
        Ok(())
    }

    /// Single-quotes a string literal, doubling any internal `'`.
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Maps a dataset id to a stable engine table identifier.
    ///
    /// The result is `ds_` followed by the id with every character outside
    /// `[A-Za-z0-9_]` replaced by `_`. When a replacement happened, the first
    /// eight hex digits of the SHA-256 of the raw id are appended so that ids
    /// differing only in illegal characters still map to distinct tables.
    ///
    /// ```rust
    /// use joinery::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::table_identifier("orders"), "ds_orders");
    /// assert_ne!(
    ///     SqlSecurity::table_identifier("a-b"),
    ///     SqlSecurity::table_identifier("a.b"),
    /// );
    /// ```
    pub fn table_identifier(dataset_id: &str) -> String {
        static ILLEGAL: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"[^A-Za-z0-9_]").expect("Hard-coded regex pattern should be valid")
        });

        let sanitized = ILLEGAL.replace_all(dataset_id, "_");
        if sanitized == dataset_id && !dataset_id.is_empty() {
            return format!("{TABLE_PREFIX}{sanitized}");
        }

        let digest = Sha256::digest(dataset_id.as_bytes());
        let suffix = hex::encode(&digest[..4]);
        format!("{TABLE_PREFIX}{sanitized}_{suffix}")
    }
}
