/// Application name
pub const APP_NAME: &str = "BizMatch";

/// Literal shown instead of a company name on name-private listings.
pub const HIDDEN_NAME_PLACEHOLDER: &str = "[Company Name Hidden]";

/// Maximum number of attempts for a single backend call
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff between retries, in milliseconds
pub const RETRY_BASE_DELAY_MS: u64 = 1_000;

/// Default interval at which live lists re-fetch, in seconds
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Routes used as redirect targets and notification action urls
pub const ROUTE_SIGN_IN: &str = "/sign-in";
pub const ROUTE_CONNECTIONS: &str = "/connections";
pub const ROUTE_MESSAGES: &str = "/messages";
pub const ROUTE_OPPORTUNITIES: &str = "/opportunities";
pub const ROUTE_REQUIREMENTS: &str = "/requirements";

/// Default page size for inbox-style listings
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Maximum length of a connection introduction message
pub const MAX_INTRO_MESSAGE_LEN: usize = 2_000;

/// Maximum length of a direct message
pub const MAX_MESSAGE_LEN: usize = 10_000;

/// Number of lead requests shown in the "recent" panel
pub const RECENT_REQUIREMENTS_LIMIT: u32 = 5;

/// Refresh interval of the "recent" panel, in seconds
pub const RECENT_REQUIREMENTS_REFRESH_SECS: u64 = 300;

/// A lead request younger than this is flagged as new
pub const NEW_REQUIREMENT_HOURS: i64 = 24;

/// Industry categories a lead request can be filed under
pub const INDUSTRY_CATEGORIES: [&str; 10] = [
    "Technology",
    "Healthcare",
    "Financial Services",
    "Manufacturing",
    "Retail",
    "Professional Services",
    "Real Estate",
    "Education",
    "Energy",
    "Media & Entertainment",
];
