use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};

use super::dto::{OptimalSlotParams, SlotDto, SlotGridDto, SlotGridParams};
use crate::application::{Allocation, QuickQueue, SlotGridCache};
use crate::domain::{LocationId, Period};
use crate::interfaces::http::common::{ApiError, ApiResponse};

pub const NOT_AVAILABLE_MESSAGE: &str = "No pickup slot available for this period";

#[derive(Clone)]
pub struct SlotState {
    pub cache: Arc<SlotGridCache>,
    pub quick_queue: Arc<QuickQueue>,
}

#[utoipa::path(
    get,
    path = "/api/v1/slots",
    tag = "Slots",
    params(SlotGridParams),
    responses(
        (status = 200, description = "Slot grid for one location", body = ApiResponse<SlotGridDto>),
        (status = 400, description = "Unknown period"),
        (status = 404, description = "Inactive location or date outside the booking window")
    )
)]
pub async fn get_slot_grid(
    State(state): State<SlotState>,
    Query(params): Query<SlotGridParams>,
) -> Result<Json<ApiResponse<SlotGridDto>>, ApiError> {
    let period: Period = params.period.parse()?;
    let location_id = LocationId::new(params.location_id);

    let grid = state.cache.get(&location_id, params.date, period).await?;
    Ok(Json(ApiResponse::success(SlotGridDto::new(
        &grid,
        state.quick_queue.allocator(),
    ))))
}

#[utoipa::path(
    get,
    path = "/api/v1/slots/optimal",
    tag = "Slots",
    params(OptimalSlotParams),
    responses(
        (status = 200, description = "Lowest-wait slot, or `data: null` when nothing is left",
            body = ApiResponse<SlotDto>),
        (status = 400, description = "Unknown period"),
        (status = 404, description = "Date outside the booking window")
    )
)]
pub async fn find_optimal_slot(
    State(state): State<SlotState>,
    Query(params): Query<OptimalSlotParams>,
) -> Result<Json<ApiResponse<SlotDto>>, ApiError> {
    let period: Period = params.period.parse()?;
    let preferred = params
        .preferred_location
        .filter(|p| !p.trim().is_empty())
        .map(LocationId::new);

    let allocation = state
        .quick_queue
        .find_optimal_slot_for_active(params.date, period, preferred.as_ref(), &[])
        .await?;

    Ok(Json(match allocation {
        Allocation::Available(slot) => {
            ApiResponse::success(SlotDto::new(&slot, state.quick_queue.allocator()))
        }
        Allocation::NotAvailable => ApiResponse::empty(NOT_AVAILABLE_MESSAGE),
    }))
}
