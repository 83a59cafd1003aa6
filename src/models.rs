use chrono::NaiveDate;

/// One show as listed on the ranking page during a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    /// Stable part of the info line, e.g. the streaming platform.
    pub category: String,
    pub is_first_day: bool,
    /// "上线8天" and the like. Changes daily, so it is only ever displayed.
    pub volatile_descriptor: String,
}

/// A row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub name: String,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub last_category: String,
}
