//! Application-wide constants
//!
//! Defaults for values that are also exposed through `app_config`. Handlers
//! should read the live configuration; these exist so the defaults live in
//! one place.

/// Days a soft-deleted user must stay untouched before it can be pruned.
pub const USER_RETENTION_DAYS: i64 = 730;

/// Days a soft-deleted product must stay untouched before it can be pruned.
pub const PRODUCT_RETENTION_DAYS: i64 = 365;

/// Upper bound on a configured retention window (100 years).
pub const MAX_RETENTION_DAYS: i64 = 36_500;

/// Seconds between scheduled prune sweeps.
pub const PRUNE_INTERVAL_SECONDS: u64 = 86_400;

/// Maximum stored image size in bytes (2 MiB).
pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;

/// Content types accepted by the image upload endpoint.
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// Maximum stored filename length for images.
pub const MAX_IMAGE_FILENAME_LENGTH: u64 = 128;

/// Maximum length of a title string.
pub const MAX_TITLE_LENGTH: u64 = 256;

/// Maximum length of a tag string.
pub const MAX_TAG_LENGTH: u64 = 40;

/// Maximum length of a product version string.
pub const MAX_VERSION_LENGTH: u64 = 40;

/// Number of reviews returned by the "latest reviews" endpoint.
pub const LATEST_REVIEWS_LIMIT: i64 = 25;
