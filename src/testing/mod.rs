//! In-process test harness: an in-memory [`Store`], a canned geocoder and
//! request helpers that drive the real router without a database or network.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::config::AppConfig;
use crate::database::models::{Location, NewPlace, NewUser, Place, PlaceEdit, User, UserProfile};
use crate::database::{Store, StoreError, StoreTransaction};
use crate::geocoding::{GeocodeError, Geocoder};
use crate::state::AppState;

/// Smallest valid PNG header; uploads are checked by MIME type only.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R'];

/// The address [`StubGeocoder`] cannot resolve.
pub const UNKNOWN_ADDRESS: &str = "asdkfjasldkfj12345";

const BOUNDARY: &str = "places-api-test-boundary";

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    places: Vec<Place>,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
    fail_commits: AtomicBool,
}

/// Store kept in memory. Transactions stage their writes and apply them
/// under one lock on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        lock(&self.shared)
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.shared.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    pub fn fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, fail: bool) {
        self.shared.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.tables().users.len()
    }

    pub fn place_count(&self) -> usize {
        self.tables().places.len()
    }

    pub fn user_places(&self, user: Uuid) -> Vec<Uuid> {
        self.tables()
            .users
            .iter()
            .find(|u| u.id == user)
            .map(|u| u.places.clone())
            .unwrap_or_default()
    }
}

fn lock(shared: &Shared) -> MutexGuard<'_, Tables> {
    shared.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.check_reads()
    }

    async fn list_users(&self) -> Result<Vec<UserProfile>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().users.iter().cloned().map(UserProfile::from).collect())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables();
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateKey("users_email_key".to_string()));
        }

        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password: user.password_hash,
            image: user.image,
            places: Vec::new(),
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_place_by_id(&self, id: Uuid) -> Result<Option<Place>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().places.iter().find(|p| p.id == id).cloned())
    }

    async fn find_places_by_creator(&self, creator: Uuid) -> Result<Vec<Place>, StoreError> {
        self.check_reads()?;
        Ok(self.tables().places.iter().filter(|p| p.creator == creator).cloned().collect())
    }

    async fn update_place(&self, id: Uuid, edit: PlaceEdit) -> Result<Option<Place>, StoreError> {
        let mut tables = self.tables();
        let Some(place) = tables.places.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        place.title = edit.title;
        place.description = edit.description;
        Ok(Some(place.clone()))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            shared: self.shared.clone(),
            staged: Vec::new(),
        }))
    }
}

enum Staged {
    InsertPlace(Place),
    DeletePlace(Uuid),
    PushUserPlace(Uuid, Uuid),
    PullUserPlace(Uuid, Uuid),
}

struct MemoryTransaction {
    shared: Arc<Shared>,
    staged: Vec<Staged>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_place(&mut self, place: NewPlace) -> Result<Place, StoreError> {
        let place = Place {
            id: Uuid::new_v4(),
            title: place.title,
            description: place.description,
            address: place.address,
            location: place.location,
            image: place.image,
            creator: place.creator,
            created_at: Utc::now(),
        };
        self.staged.push(Staged::InsertPlace(place.clone()));
        Ok(place)
    }

    async fn delete_place(&mut self, id: Uuid) -> Result<(), StoreError> {
        if !lock(&self.shared).places.iter().any(|p| p.id == id) {
            return Err(StoreError::MissingRecord(format!("place {}", id)));
        }
        self.staged.push(Staged::DeletePlace(id));
        Ok(())
    }

    async fn push_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError> {
        if !lock(&self.shared).users.iter().any(|u| u.id == user) {
            return Err(StoreError::MissingRecord(format!("user {}", user)));
        }
        self.staged.push(Staged::PushUserPlace(user, place));
        Ok(())
    }

    async fn pull_user_place(&mut self, user: Uuid, place: Uuid) -> Result<(), StoreError> {
        if !lock(&self.shared).users.iter().any(|u| u.id == user) {
            return Err(StoreError::MissingRecord(format!("user {}", user)));
        }
        self.staged.push(Staged::PullUserPlace(user, place));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { shared, staged } = *self;
        if shared.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit refused".to_string()));
        }

        let mut tables = lock(&shared);
        for op in staged {
            match op {
                Staged::InsertPlace(place) => tables.places.push(place),
                Staged::DeletePlace(id) => tables.places.retain(|p| p.id != id),
                Staged::PushUserPlace(user, place) => {
                    if let Some(u) = tables.users.iter_mut().find(|u| u.id == user) {
                        u.places.push(place);
                    }
                }
                Staged::PullUserPlace(user, place) => {
                    if let Some(u) = tables.users.iter_mut().find(|u| u.id == user) {
                        u.places.retain(|p| *p != place);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Resolves every address to the Empire State Building except
/// [`UNKNOWN_ADDRESS`].
pub struct StubGeocoder;

#[async_trait]
impl Geocoder for StubGeocoder {
    async fn locate(&self, address: &str) -> Result<Location, GeocodeError> {
        if address == UNKNOWN_ADDRESS {
            return Err(GeocodeError::AddressNotFound);
        }
        Ok(Location {
            lat: 40.7484474,
            lng: -73.9871516,
        })
    }
}

/// One isolated application: its own store and uploads directory.
pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
    uploads_dir: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Like [`TestApp::new`], with `adjust` applied to the config last.
    pub fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let uploads_dir = std::env::temp_dir().join(format!("places-api-test-{}", Uuid::new_v4()));

        let mut config = AppConfig::development();
        config.uploads.dir = uploads_dir.clone();
        config.security.jwt_secret = "test-secret".to_string();
        config.security.bcrypt_cost = 4;
        adjust(&mut config);

        let store = MemoryStore::default();
        let state = AppState::new(Arc::new(store.clone()), Arc::new(StubGeocoder), config);

        Self {
            state,
            store,
            uploads_dir,
        }
    }

    pub fn router(&self) -> Router {
        crate::app(self.state.clone())
    }

    /// Files currently in the uploads directory.
    pub fn stored_upload_count(&self) -> usize {
        std::fs::read_dir(&self.uploads_dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }

    pub fn token_for(&self, user_id: Uuid, email: &str) -> String {
        let security = &self.state.config.security;
        let claims = Claims::new(user_id, email.to_string(), security.jwt_expiry_hours);
        generate_jwt(&claims, &security.jwt_secret).expect("sign test token")
    }

    /// Sign up through the API and return `(user_id, token)`.
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> (Uuid, String) {
        let (status, body) = send(
            self.router(),
            multipart_request(
                "/api/users/signup",
                None,
                &[("name", name), ("email", email), ("password", password)],
                Some(("avatar.png", "image/png", PNG_BYTES)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {}", body);

        let user_id = body["userId"].as_str().and_then(|s| s.parse().ok()).expect("userId");
        let token = body["token"].as_str().expect("token").to_string();
        (user_id, token)
    }

    /// Create a place through the API and return its JSON.
    pub async fn create_place(&self, token: &str, title: &str, description: &str, address: &str) -> Value {
        let (status, body) = send(
            self.router(),
            multipart_request(
                "/api/places",
                Some(token),
                &[("title", title), ("description", description), ("address", address)],
                Some(("place.png", "image/png", PNG_BYTES)),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "create place failed: {}", body);
        body["place"].clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.uploads_dir);
    }
}

fn with_token(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
        None => builder,
    }
}

pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method(method).uri(uri), token)
        .body(Body::empty())
        .expect("request")
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_token(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

/// POST a `multipart/form-data` body with text `fields` and an optional
/// `image` part given as `(filename, mime, bytes)`.
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    image: Option<(&str, &str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, mime, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, filename, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    with_token(Request::builder().method("POST").uri(uri), token)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .expect("request")
}

/// Run one request and decode the JSON body (`Null` when there is none).
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
