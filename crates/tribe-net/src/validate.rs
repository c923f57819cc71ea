//! Local validation of API call parameters.
//!
//! Every check here runs before a request is built, so invalid input never
//! reaches the wire.

use std::fmt;

use tribe_shared::time::parse_time_str;
use tribe_shared::ValidationError;
use uuid::Uuid;

/// Length of the canonical hyphenated uuid form.
const HYPHENATED_UUID_LEN: usize = 36;

/// Validate a message reference uuid.  Only the hyphenated RFC-4122 form is
/// accepted; the trimmed value is returned.
pub fn validate_uuid(raw: &str) -> Result<&str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.len() != HYPHENATED_UUID_LEN || Uuid::parse_str(trimmed).is_err() {
        return Err(ValidationError::InvalidUuid(raw.to_string()));
    }
    Ok(trimmed)
}

/// Validate outgoing message text.
pub fn validate_text(raw: &str) -> Result<&str, ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::EmptyText);
    }
    Ok(raw)
}

/// Lower bound for an incremental updates request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Since {
    /// Epoch milliseconds.
    Millis(i64),
    /// ISO-8601 date or datetime.
    Iso(String),
}

impl Since {
    /// Validate and render the path segment sent to the server.
    pub fn to_path_segment(&self) -> Result<String, ValidationError> {
        match self {
            Since::Millis(ms) if *ms >= 0 => Ok(ms.to_string()),
            Since::Millis(ms) => Err(ValidationError::InvalidTime(format!(
                "negative epoch millis {ms}"
            ))),
            Since::Iso(s) => {
                let trimmed = s.trim();
                let numeric = trimmed.parse::<f64>().is_ok();
                if numeric || parse_time_str(trimmed).is_none() {
                    return Err(ValidationError::InvalidTime(format!(
                        "not an ISO-8601 date: {s:?}"
                    )));
                }
                Ok(trimmed.to_string())
            }
        }
    }
}

impl From<i64> for Since {
    fn from(ms: i64) -> Self {
        Since::Millis(ms)
    }
}

impl fmt::Display for Since {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Since::Millis(ms) => write!(f, "{ms}"),
            Since::Iso(s) => f.write_str(s),
        }
    }
}
