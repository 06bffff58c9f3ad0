/// Maximum compare-and-swap attempts before giving up.
pub const MAX_CAS_RETRIES: u32 = 20;

/// Cards per study session; the time budget a client sends does not change it.
pub const DEFAULT_SESSION_SIZE: usize = 20;

/// Interval (days) at which a card counts as mastered.
pub const MASTERED_INTERVAL_DAYS: i64 = 21;

/// Study sessions older than this are dropped by cleanup.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// Upper bound on the page size a client may request.
pub const MAX_PAGE_SIZE: u64 = 100;

/// Maximum number of cards accepted in one batch add.
pub const MAX_CARD_BATCH: usize = 500;

pub const MAX_DECK_NAME_LEN: usize = 120;

pub const MAX_CARD_TEXT_LEN: usize = 2_000;
