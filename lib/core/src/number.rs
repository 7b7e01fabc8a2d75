//! Human-facing document numbers.
//!
//! Numbers are scoped by document kind and calendar year, e.g. `CTR-2026-0042`.
//! The sequence part comes from a durable counter (see the store crate); this
//! module only knows how to format and parse the result.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of document a number is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberPrefix {
    /// Business request (tender).
    BusinessRequest,
    /// Contract.
    Contract,
    /// Vendor registration.
    Vendor,
    /// Payment authorization form.
    PaymentAuthorization,
}

impl NumberPrefix {
    /// Returns the printed prefix.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BusinessRequest => "BR",
            Self::Contract => "CTR",
            Self::Vendor => "VND",
            Self::PaymentAuthorization => "PAF",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "BR" => Some(Self::BusinessRequest),
            "CTR" => Some(Self::Contract),
            "VND" => Some(Self::Vendor),
            "PAF" => Some(Self::PaymentAuthorization),
            _ => None,
        }
    }
}

impl fmt::Display for NumberPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A formatted document number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentNumber {
    /// Document kind.
    pub prefix: NumberPrefix,
    /// Calendar year the number was issued in.
    pub year: i32,
    /// Position within the (prefix, year) sequence, starting at 1.
    pub sequence: u64,
}

impl DocumentNumber {
    /// Creates a document number.
    #[must_use]
    pub const fn new(prefix: NumberPrefix, year: i32, sequence: u64) -> Self {
        Self {
            prefix,
            year,
            sequence,
        }
    }

    /// Returns the counter scope this number is allocated from.
    ///
    /// Every (prefix, year) pair has its own counter so numbering restarts
    /// at 1 each year.
    #[must_use]
    pub fn scope(prefix: NumberPrefix, year: i32) -> String {
        format!("{prefix}:{year}")
    }
}

impl fmt::Display for DocumentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for DocumentNumber {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(year), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed document number: {s}"));
        };
        let prefix =
            NumberPrefix::parse(prefix).ok_or_else(|| format!("unknown number prefix: {prefix}"))?;
        let year = year
            .parse()
            .map_err(|_| format!("invalid year in document number: {s}"))?;
        let sequence = sequence
            .parse()
            .map_err(|_| format!("invalid sequence in document number: {s}"))?;
        Ok(Self::new(prefix, year, sequence))
    }
}

impl Serialize for DocumentNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DocumentNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
