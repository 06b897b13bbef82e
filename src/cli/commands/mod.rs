pub mod database;
pub mod geocode;
