pub mod store;

pub use store::{EntryCategory, LedgerEntry, LedgerStore, SqliteLedger};
