// ── Hard limits ─────────────────────────────────────────────────

/// Widest stay (in days, inclusive) a single admission or query may expand.
pub const MAX_RANGE_DAYS: i64 = 3_660;

/// Reservations kept per resource, all statuses included.
pub const MAX_RESERVATIONS_PER_RESOURCE: usize = 100_000;

pub const MAX_RESOURCES: usize = 1_000_000;

pub const MAX_NAME_LEN: usize = 256;

/// Rows in a multi-row reservation INSERT.
pub const MAX_BATCH_SIZE: usize = 256;

/// Entries in a `status IN (...)` list.
pub const MAX_STATUS_FILTER: usize = 16;
