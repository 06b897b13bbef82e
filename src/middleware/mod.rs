pub mod auth;
pub mod response;
pub mod upload;
pub mod validate;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use response::{error_responder, route_not_found};
pub use upload::{upload_body_limit, ImageUpload, StoredImage, UploadRejection};
pub use validate::{normalize_email, validate_fields, ValidatedJson};
