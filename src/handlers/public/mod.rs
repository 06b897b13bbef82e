// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Account creation, token acquisition, the user listing and read-only place
// lookups. Nothing here sees an AuthUser.

pub mod places;
pub mod users;

pub use places::{get_place_by_id, get_places_by_user_id};
pub use users::{list_users, login, signup};
