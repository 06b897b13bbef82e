use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::database::models::{NewPlace, PlaceEdit};
use crate::database::StoreError;
use crate::error::ApiError;
use crate::geocoding::GeocodeError;
use crate::handlers::parse_id;
use crate::middleware::{validate_fields, AuthUser, ImageUpload, StoredImage, UploadRejection, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct NewPlaceForm {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 5))]
    pub description: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub address: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceEditRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 5))]
    pub description: String,
}

/// POST /api/places - multipart `title`, `description`, `address` + `image`
///
/// The place insert and the creator's place-list append commit together or
/// not at all.
pub async fn create_place(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    upload: ImageUpload,
) -> Result<(StatusCode, Json<Value>), UploadRejection> {
    let image = upload.image.clone();
    insert_place(&state, &auth, upload)
        .await
        .map_err(|e| e.discarding(image.as_ref()))
}

async fn insert_place(state: &AppState, auth: &AuthUser, upload: ImageUpload) -> Result<(StatusCode, Json<Value>), ApiError> {
    let form: NewPlaceForm = validate_fields(&upload.fields)?;
    let image = upload.require_image()?;

    let location = state.geocoder.locate(&form.address).await.map_err(|e| match e {
        GeocodeError::AddressNotFound => ApiError::AddressNotFound,
        other => {
            tracing::error!("Geocoding {:?} failed: {}", form.address, other);
            ApiError::GeocodingFailed
        }
    })?;

    let user = state
        .store
        .find_user_by_id(auth.user_id)
        .await
        .map_err(|e| {
            tracing::error!("Creator lookup failed: {}", e);
            ApiError::CreateFailed
        })?
        .ok_or(ApiError::UserNotFound)?;

    let new_place = NewPlace {
        title: form.title,
        description: form.description,
        address: form.address,
        location,
        image: image.path.clone(),
        creator: user.id,
    };

    let place = async {
        let mut tx = state.store.begin().await?;
        let place = tx.insert_place(new_place).await?;
        tx.push_user_place(user.id, place.id).await?;
        tx.commit().await?;
        Ok::<_, StoreError>(place)
    }
    .await
    .map_err(|e| {
        tracing::error!("Creating place failed: {}", e);
        ApiError::CreateFailed
    })?;

    tracing::info!(place_id = %place.id, user_id = %user.id, "Place created");
    Ok((StatusCode::CREATED, Json(json!({ "place": place }))))
}

/// PATCH /api/places/:pid - JSON `{title, description}`, creator only
pub async fn update_place(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(pid): Path<String>,
    ValidatedJson(request): ValidatedJson<PlaceEditRequest>,
) -> Result<Json<Value>, ApiError> {
    const NOT_FOUND: ApiError = ApiError::NotFound("Could not find place for the given id");

    let id = parse_id(&pid).ok_or(NOT_FOUND)?;
    let place = state
        .store
        .find_place_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Place lookup failed: {}", e);
            ApiError::LookupFailed
        })?
        .ok_or(NOT_FOUND)?;

    if place.creator != auth.user_id {
        return Err(ApiError::Forbidden("You are not allowed to edit this place"));
    }

    let edit = PlaceEdit {
        title: request.title,
        description: request.description,
    };
    let updated = state
        .store
        .update_place(id, edit)
        .await
        .map_err(|e| {
            tracing::error!("Updating place {} failed: {}", id, e);
            ApiError::UpdateFailed
        })?
        .ok_or(NOT_FOUND)?;

    Ok(Json(json!({ "updatedPlace": updated })))
}

/// DELETE /api/places/:pid - creator only
///
/// The place row and the creator's list entry go in one transaction; the
/// image file is removed afterwards.
pub async fn delete_place(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(pid): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const NOT_FOUND: ApiError = ApiError::NotFound("Could not find place for the given id");

    let id = parse_id(&pid).ok_or(NOT_FOUND)?;
    let place = state
        .store
        .find_place_by_id(id)
        .await
        .map_err(|e| {
            tracing::error!("Place lookup failed: {}", e);
            ApiError::LookupFailed
        })?
        .ok_or(NOT_FOUND)?;

    if place.creator != auth.user_id {
        return Err(ApiError::Forbidden("You are not allowed to delete this place"));
    }

    async {
        let mut tx = state.store.begin().await?;
        tx.delete_place(place.id).await?;
        tx.pull_user_place(place.creator, place.id).await?;
        tx.commit().await?;
        Ok::<_, StoreError>(())
    }
    .await
    .map_err(|e| {
        tracing::error!("Deleting place {} failed: {}", id, e);
        ApiError::DeleteFailed
    })?;

    StoredImage { path: place.image }.discard().await;

    tracing::info!(place_id = %id, "Place deleted");
    Ok(Json(json!({ "message": "place deleted" })))
}
