//! Cache module for storing API responses durably
//!
//! Responses are grouped into named namespaces (one per kind of data), each
//! persisted as a single JSON document. `CacheManager` sits between every
//! data-fetching call and the network: fresh entries are served from disk,
//! stale or missing ones are fetched, stored with a timestamp, and returned.

mod clock;
mod manager;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{CacheManager, Ttl};
pub use store::{CacheEntry, FileSlotStore, MemorySlotStore, NamespaceMap, NamespaceStore, SlotStore};

/// Symbol search results, keyed by query
pub const SEARCH_CACHE: &str = "searchCache";

/// Dividend history, keyed by symbol
pub const DIVIDEND_CACHE: &str = "dividendCache";

/// Company profiles, keyed by symbol
pub const COMPANY_PROFILE_CACHE: &str = "companyProfileCache";

/// Price predictions, keyed by comma-joined symbols
pub const PREDICTIONS_CACHE: &str = "predictionsCache";

/// Side-by-side quotes, keyed by comma-joined symbols
pub const PORTFOLIO_COMPARISON_CACHE: &str = "portfolioComparisonCache";

/// Namespaces holding per-symbol entries, cleared when a holding changes
pub const SYMBOL_NAMESPACES: [&str; 2] = [DIVIDEND_CACHE, COMPANY_PROFILE_CACHE];

/// Builds the entry key for a list of symbols
pub fn symbols_key<S: AsRef<str>>(symbols: &[S]) -> String {
    symbols
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(",")
}
