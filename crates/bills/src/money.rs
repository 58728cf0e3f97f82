//! Currency codes and amount rounding.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use tally_core::{DomainError, ValueObject};

/// Currencies a bill can be opened in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "GEL")]
    Gel,
}

impl Currency {
    pub const SUPPORTED: [Currency; 2] = [Currency::Usd, Currency::Gel];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Gel => "GEL",
        }
    }
}

impl ValueObject for Currency {}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    /// Codes are matched exactly as submitted ("usd" is not USD).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::SUPPORTED
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation("unsupported currency, only USD or GEL"))
    }
}

/// Upper bound (exclusive) for an amount scaled to cents.
pub const MAX_CENTS: f64 = i64::MAX as f64;

/// Round an amount to 2 decimal places (half-up) and return it in cents.
///
/// Amounts arrive as decimal literals parsed into `f64`, so a value such as
/// `1.005` is stored as `1.00499999...`. The scaled value is nudged up by a
/// relative epsilon before rounding so such literals still round half-up.
pub fn round2_cents(amount: f64) -> i64 {
    let scaled = amount * 100.0;
    (scaled * (1.0 + 4.0 * f64::EPSILON)).round() as i64
}

/// Convert cents back into a decimal amount.
pub fn cents_to_amount(cents: i64) -> f64 {
    cents as f64 / 100.0
}
