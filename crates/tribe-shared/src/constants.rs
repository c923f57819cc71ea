/// Default base URL of the chat REST service
pub const DEFAULT_API_BASE: &str = "https://dummy-chat-server.tribechat.com/api";

/// Key under which the persisted state blob is stored
pub const STORAGE_KEY: &str = "chat-storage";

/// Placeholder avatar service used when a participant has no avatar URL
pub const AVATAR_FALLBACK_BASE: &str = "https://ui-avatars.com/api/?name=";

/// Name fed to the avatar service when the participant has no name
pub const AVATAR_FALLBACK_NAME: &str = "User";

/// Display name for a message whose author could not be resolved
pub const UNKNOWN_PARTICIPANT_NAME: &str = "Unknown";

/// Participant uuid the service uses for the local user
pub const SELF_PARTICIPANT_UUID: &str = "you";

/// Default primary image edge in pixels when the attachment has no size
pub const DEFAULT_IMAGE_EDGE: u32 = 120;

/// Attachment type surfaced as the primary image
pub const IMAGE_ATTACHMENT_TYPE: &str = "image";

/// Numeric timestamps below this magnitude are read as epoch seconds
pub const SECONDS_THRESHOLD: i64 = 100_000_000_000;

/// Poll interval while updates keep arriving (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 4_000;

/// Poll interval after a tick with no updates (milliseconds)
pub const SLOW_POLL_INTERVAL_MS: u64 = 15_000;

/// Upper bound on the backoff interval after failures (milliseconds)
pub const MAX_POLL_BACKOFF_MS: u64 = 60_000;

/// Consecutive poll failures tolerated before polling stops
pub const MAX_POLL_RETRIES: u32 = 5;

/// Default HTTP request timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
