//! Persistence seams for users and places.
//!
//! Controllers only see these traits. Writes that touch both a place and its
//! owner's place list go through a [`StoreTransaction`]: everything staged on
//! it lands on `commit`, and dropping it uncommitted discards every write.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{NewPlace, NewUser, Place, PlaceEdit, User, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Missing record: {0}")]
    MissingRecord(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trips to the backend.
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when the email is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_place_by_id(&self, id: Uuid) -> Result<Option<Place>, StoreError>;

    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, StoreError>;

    /// Returns `None` when no place has this id.
    async fn update_place(&self, id: Uuid, edit: PlaceEdit) -> Result<Option<Place>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, StoreError>;

    async fn delete_place(&mut self, id: Uuid) -> Result<(), StoreError>;

    /// Appends `place` to the user's place list.
    async fn push_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError>;

    /// Removes `place` from the user's place list.
    async fn pull_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
