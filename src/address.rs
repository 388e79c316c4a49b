//! Address identity types shared by every stage of the pipeline.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// One of the five NYC boroughs, identified by its two-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Borough {
    Manhattan,
    Bronx,
    Brooklyn,
    Queens,
    StatenIsland,
}

impl Borough {
    pub const ALL: [Borough; 5] = [
        Borough::Manhattan,
        Borough::Bronx,
        Borough::Brooklyn,
        Borough::Queens,
        Borough::StatenIsland,
    ];

    /// Two-letter code used in the input and log tables
    pub fn code(&self) -> &'static str {
        match self {
            Borough::Manhattan => "MN",
            Borough::Bronx => "BX",
            Borough::Brooklyn => "BK",
            Borough::Queens => "QN",
            Borough::StatenIsland => "SI",
        }
    }

    /// Numeric borough id expected by the address lookup form
    pub fn form_id(&self) -> u8 {
        match self {
            Borough::Manhattan => 1,
            Borough::Bronx => 2,
            Borough::Brooklyn => 3,
            Borough::Queens => 4,
            Borough::StatenIsland => 5,
        }
    }
}

impl fmt::Display for Borough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned when a borough code is not one of MN, BX, BK, QN, SI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBorough(pub String);

impl fmt::Display for UnknownBorough {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown borough code '{}' (expected one of MN, BX, BK, QN, SI)", self.0)
    }
}

impl std::error::Error for UnknownBorough {}

impl FromStr for Borough {
    type Err = UnknownBorough;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Borough::ALL
            .iter()
            .copied()
            .find(|b| b.code() == s)
            .ok_or_else(|| UnknownBorough(s.to_string()))
    }
}

/// Identity of one unit of work: house number, street and borough.
///
/// House numbers are opaque strings (hyphenated block-lot style numbers are
/// common in Queens), so no numeric parsing is done.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AddressKey {
    house_number: String,
    street: String,
    borough: Borough,
}

impl AddressKey {
    pub fn new(house_number: impl Into<String>, street: impl Into<String>, borough: Borough) -> Self {
        Self {
            house_number: house_number.into(),
            street: street.into(),
            borough,
        }
    }

    pub fn house_number(&self) -> &str {
        &self.house_number
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn borough(&self) -> Borough {
        self.borough
    }
}

impl fmt::Display for AddressKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.house_number, self.street, self.borough)
    }
}

/// An address plus the passthrough columns that travel with it from input to output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub key: AddressKey,
    pub extra_columns: Vec<String>,
    /// Lookups already attempted for this item in the current run
    pub attempts: u32,
    /// Any attempt found more than one form on the lookup page
    pub saw_multiple_forms: bool,
}

impl WorkItem {
    pub fn new(key: AddressKey, extra_columns: Vec<String>) -> Self {
        Self {
            key,
            extra_columns,
            attempts: 0,
            saw_multiple_forms: false,
        }
    }

    /// Leading log columns: house number, street, borough code, then the extra columns
    pub fn log_prefix(&self) -> Vec<&str> {
        let mut row = Vec::with_capacity(3 + self.extra_columns.len());
        row.push(self.key.house_number());
        row.push(self.key.street());
        row.push(self.key.borough().code());
        row.extend(self.extra_columns.iter().map(String::as_str));
        row
    }
}
