use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::models::{NewPlace, NewUser, Place, PlaceEdit, User, UserProfile};
use crate::database::store::{Store, StoreError, StoreTransaction};

const USER_COLUMNS: &str = "id, name, email, password, image, places, created_at";
const PLACE_COLUMNS: &str = "id, title, description, address, lat, lng, image, creator, created_at";

/// Postgres-backed store. Owns a clone of the pool handle.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateKey(db_err.constraint().unwrap_or("unique").to_string())
        }
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        let users = sqlx::query_as::<_, UserProfile>(
            "SELECT id, name, email, image, places FROM users ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password, image, places, created_at)
            VALUES ($1, $2, $3, $4, $5, '{{}}', $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.image)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(created)
    }

    async fn find_place_by_id(&self, id: Uuid) -> Result<Option<Place>, StoreError> {
        let place = sqlx::query_as::<_, Place>(&format!("SELECT {} FROM places WHERE id = $1", PLACE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(place)
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, StoreError> {
        let places = sqlx::query_as::<_, Place>(&format!(
            "SELECT {} FROM places WHERE creator = $1 ORDER BY created_at",
            PLACE_COLUMNS
        ))
        .bind(creator)
        .fetch_all(&self.pool)
        .await?;

        Ok(places)
    }

    async fn update_place(&self, id: Uuid, edit: PlaceEdit) -> Result<Option<Place>, StoreError> {
        let place = sqlx::query_as::<_, Place>(&format!(
            "UPDATE places SET title = $1, description = $2 WHERE id = $3 RETURNING {}",
            PLACE_COLUMNS
        ))
        .bind(&edit.title)
        .bind(&edit.description)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(place)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Wraps a live sqlx transaction; sqlx rolls it back on drop.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, StoreError> {
        let created = sqlx::query_as::<_, Place>(&format!(
            r#"
            INSERT INTO places (id, title, description, address, lat, lng, image, creator, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PLACE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&place.title)
        .bind(&place.description)
        .bind(&place.address)
        .bind(place.location.lat)
        .bind(place.location.lng)
        .bind(&place.image)
        .bind(place.creator)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn delete_place(&mut self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM places WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(format!("place {}", id)));
        }
        Ok(())
    }

    async fn push_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET places = array_append(places, $2) WHERE id = $1")
            .bind(user)
            .bind(place)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(format!("user {}", user)));
        }
        Ok(())
    }

    async fn pull_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET places = array_remove(places, $2) WHERE id = $1")
            .bind(user)
            .bind(place)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::MissingRecord(format!("user {}", user)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }
}
