use std::sync::Arc;

use axum::{extract::State, Json};

use super::dto::LocationDto;
use crate::domain::LocationDirectory;
use crate::interfaces::http::common::{ApiError, ApiResponse};

#[derive(Clone)]
pub struct LocationState {
    pub directory: Arc<dyn LocationDirectory>,
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Locations",
    responses(
        (status = 200, description = "Active pickup locations",
            body = ApiResponse<Vec<LocationDto>>),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn list_locations(
    State(state): State<LocationState>,
) -> Result<Json<ApiResponse<Vec<LocationDto>>>, ApiError> {
    let locations = state.directory.list_active_locations().await?;
    Ok(Json(ApiResponse::success(
        locations.into_iter().map(LocationDto::from).collect(),
    )))
}
