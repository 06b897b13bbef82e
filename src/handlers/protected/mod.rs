// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Every handler here runs behind jwt_auth_middleware and receives the
// caller as an `Extension<AuthUser>`.

pub mod places;

pub use places::{create_place, delete_place, update_place};
