pub mod place;
pub mod user;

pub use place::{Location, NewPlace, Place, PlaceEdit};
pub use user::{NewUser, User, UserProfile};
