/// Version of the canary standard produced by this library.
pub const STANDARD_VERSION: &str = "0.1";

/// Maximum lag between the anchoring block's timestamp and the release date.
pub const FRESHNESS_TOLERANCE_SECS: u64 = 3_600; // 1 hour

/// Default validity window for a newly issued canary.
pub const DEFAULT_EXPIRY_MINUTES: i64 = 43_200; // one month

/// Name given to the author when none is supplied.
pub const DEFAULT_AUTHOR_NAME: &str = "author";

/// Environment variable overriding the local key and canary store root.
pub const CANARY_HOME_ENV: &str = "CANARY_HOME";

/// Directory under the user's home used when `CANARY_HOME` is unset.
pub const CANARY_HOME_DIR: &str = ".canarytail";
