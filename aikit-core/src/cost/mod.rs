//! Cost accounting derived from provider usage metadata

pub mod ledger;
pub mod pricing;

pub use ledger::{CostLedger, CostRecord, CostReport, SharedLedger, LEDGER_STORAGE_KEY};
pub use pricing::{ModelPrice, PriceMatch, PriceTable};
