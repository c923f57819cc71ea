// HTTP collaborator for the Tribe chat REST service.

pub mod api;
pub mod error;
pub mod http;
pub mod validate;
pub mod wire;

pub use api::ChatApi;
pub use error::{ApiError, Operation};
pub use http::HttpChatApi;
pub use validate::{validate_text, validate_uuid, Since};
