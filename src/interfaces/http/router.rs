//! API router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::modules::health::{self, HealthState};
use super::modules::locations::{self, LocationState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::request_id::request_id_middleware;
use super::modules::reservations::{self, ReservationState};
use super::modules::slots::{self, SlotState};
use crate::application::{QuickQueue, ReservationCoordinator, SlotGridCache};
use crate::domain::{LocationDirectory, SlotStore};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        locations::list_locations,
        slots::get_slot_grid,
        slots::find_optimal_slot,
        reservations::create_reservation,
        reservations::get_reservation,
        reservations::confirm_reservation,
        reservations::release_reservation,
        reservations::cancel_reservation,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ComponentHealth,
            locations::LocationDto,
            slots::SlotDto,
            slots::SlotGridDto,
            reservations::CreateReservationRequest,
            reservations::ConfirmReservationRequest,
            reservations::ReservationHandleDto,
            reservations::ReservationDto,
        )
    ),
    tags(
        (name = "Health", description = "Liveness and store connectivity"),
        (name = "Locations", description = "Cafeterias and pickup points"),
        (name = "Slots", description = "Pickup slot grids and QuickQueue lowest-wait lookup"),
        (name = "Reservations", description = "Hold, confirm, release and cancel pickup slots"),
    ),
    info(
        title = "Lunchline QuickQueue API",
        version = "0.1.0",
        description = "Lunch pickup slot allocation and reservation"
    )
)]
pub struct ApiDoc;

/// Everything the handlers need; each handler extracts its own slice via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn SlotStore>,
    pub directory: Arc<dyn LocationDirectory>,
    pub cache: Arc<SlotGridCache>,
    pub quick_queue: Arc<QuickQueue>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub metrics: PrometheusHandle,
    pub started_at: Arc<Instant>,
}

impl FromRef<ApiState> for HealthState {
    fn from_ref(s: &ApiState) -> Self {
        HealthState {
            store: Arc::clone(&s.store),
            directory: Arc::clone(&s.directory),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<ApiState> for LocationState {
    fn from_ref(s: &ApiState) -> Self {
        LocationState {
            directory: Arc::clone(&s.directory),
        }
    }
}

impl FromRef<ApiState> for SlotState {
    fn from_ref(s: &ApiState) -> Self {
        SlotState {
            cache: Arc::clone(&s.cache),
            quick_queue: Arc::clone(&s.quick_queue),
        }
    }
}

impl FromRef<ApiState> for ReservationState {
    fn from_ref(s: &ApiState) -> Self {
        ReservationState {
            store: Arc::clone(&s.store),
            coordinator: Arc::clone(&s.coordinator),
        }
    }
}

impl FromRef<ApiState> for MetricsState {
    fn from_ref(s: &ApiState) -> Self {
        MetricsState {
            handle: s.metrics.clone(),
        }
    }
}

pub fn create_api_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let slot_routes = Router::new()
        .route("/", get(slots::get_slot_grid))
        .route("/optimal", get(slots::find_optimal_slot));

    let reservation_routes = Router::new()
        .route("/", post(reservations::create_reservation))
        .route("/{id}", get(reservations::get_reservation))
        .route("/{id}/confirm", post(reservations::confirm_reservation))
        .route("/{id}/release", post(reservations::release_reservation))
        .route("/{id}/cancel", post(reservations::cancel_reservation));

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/v1/locations", get(locations::list_locations))
        .nest("/api/v1/slots", slot_routes)
        .nest("/api/v1/reservations", reservation_routes)
        .with_state(state)
        .merge(swagger_routes)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{fixture, next_weekday, Fixture, MAIN_1, MAIN_2};
    use crate::domain::{LocationId, Period, TimeSlot};
    use crate::interfaces::http::common::error::SLOT_FULL_MESSAGE;
    use crate::interfaces::http::modules::request_id::REQUEST_ID_HEADER;
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::{json, Value};
    use tower::Service;

    fn app(fx: &Fixture) -> Router {
        create_api_router(ApiState {
            store: fx.store.clone(),
            directory: fx.directory.clone(),
            cache: fx.cache.clone(),
            quick_queue: fx.quick_queue.clone(),
            coordinator: fx.coordinator.clone(),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
            started_at: Arc::new(Instant::now()),
        })
    }

    async fn call(router: &Router, req: Request<Body>) -> Response<Body> {
        let mut svc = router.clone().into_service();
        svc.call(req).await.unwrap()
    }

    async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        read(call(router, req).await).await
    }

    async fn post_json(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        read(call(router, req).await).await
    }

    async fn read(resp: Response<Body>) -> (StatusCode, Value) {
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn first_slot(fx: &Fixture, location: &str) -> TimeSlot {
        let date = next_weekday(fx.today);
        let grid = fx
            .loader
            .load(&LocationId::new(location), date, Period::A)
            .await
            .unwrap();
        grid.slots[0].clone()
    }

    #[tokio::test]
    async fn health_reports_store_and_locations() {
        let fx = fixture();
        let (status, body) = get_json(&app(&fx), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"]["status"], "ok");
        assert_eq!(body["active_locations"], 2);
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_text() {
        let fx = fixture();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = call(&app(&fx), req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()["content-type"].to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_generated() {
        let fx = fixture();
        let router = app(&fx);

        let req = Request::builder()
            .uri("/health")
            .header(REQUEST_ID_HEADER, "kiosk-7")
            .body(Body::empty())
            .unwrap();
        let resp = call(&router, req).await;
        assert_eq!(resp.headers()[REQUEST_ID_HEADER], "kiosk-7");

        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = call(&router, req).await;
        assert!(!resp.headers()[REQUEST_ID_HEADER].is_empty());
    }

    #[tokio::test]
    async fn lists_only_active_locations() {
        let fx = fixture();
        fx.directory.set_active(&LocationId::new(MAIN_2), false);

        let (status, body) = get_json(&app(&fx), "/api/v1/locations").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], MAIN_1);
    }

    #[tokio::test]
    async fn slot_grid_is_generated_from_template() {
        let fx = fixture();
        let date = next_weekday(fx.today);
        let uri = format!("/api/v1/slots?date={}&period=A&location_id=MAIN%201", date);

        let (status, body) = get_json(&app(&fx), &uri).await;
        assert_eq!(status, StatusCode::OK);
        let slots = body["data"]["slots"].as_array().unwrap();
        assert_eq!(slots.len(), 12);
        assert_eq!(slots[0]["start_time"], "11:00");
        assert_eq!(slots[11]["start_time"], "11:55");
        assert_eq!(body["data"]["total_remaining"], 120);
    }

    #[tokio::test]
    async fn slot_grid_rejects_bad_period_and_weekend() {
        let fx = fixture();
        let router = app(&fx);
        let date = next_weekday(fx.today);

        let uri = format!("/api/v1/slots?date={}&period=C&location_id=MAIN%201", date);
        let (status, body) = get_json(&router, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        // 2026-10-24 is a Saturday
        let uri = "/api/v1/slots?date=2026-10-24&period=A&location_id=MAIN%201";
        let (status, _) = get_json(&router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn optimal_slot_prefers_requested_location() {
        let fx = fixture();
        let router = app(&fx);
        let date = next_weekday(fx.today);

        let uri = format!("/api/v1/slots/optimal?date={}&period=B", date);
        let (status, body) = get_json(&router, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["location_id"], MAIN_1);
        assert_eq!(body["data"]["start_time"], "12:00");

        let uri = format!(
            "/api/v1/slots/optimal?date={}&period=B&preferred_location=MAIN%202",
            date
        );
        let (_, body) = get_json(&router, &uri).await;
        assert_eq!(body["data"]["location_id"], MAIN_2);
    }

    #[tokio::test]
    async fn optimal_slot_returns_null_data_when_nothing_left() {
        let fx = fixture();
        fx.directory.set_active(&LocationId::new(MAIN_1), false);
        fx.directory.set_active(&LocationId::new(MAIN_2), false);
        let date = next_weekday(fx.today);

        let uri = format!("/api/v1/slots/optimal?date={}&period=A", date);
        let (status, body) = get_json(&app(&fx), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["data"].is_null());
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn hold_confirm_then_cancel() {
        let fx = fixture();
        let router = app(&fx);
        let slot = first_slot(&fx, MAIN_1).await;

        let (status, body) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-1", "slot_id": slot.id.0}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["reservation_id"].as_i64().unwrap();
        assert_eq!(fx.store.remaining(slot.id), Some(slot.capacity - 1));

        let (status, body) = post_json(
            &router,
            &format!("/api/v1/reservations/{}/confirm", id),
            json!({"order_id": "ORD-1"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Confirmed");
        assert_eq!(body["data"]["order_id"], "ORD-1");

        let release = format!("/api/v1/reservations/{}/release", id);
        let (status, _) = post_json(&router, &release, json!({})).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let cancel = format!("/api/v1/reservations/{}/cancel", id);
        let (status, body) = post_json(&router, &cancel, json!({})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Cancelled");
        assert_eq!(fx.store.remaining(slot.id), Some(slot.capacity));

        let (status, body) = get_json(&router, &format!("/api/v1/reservations/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Cancelled");
    }

    #[tokio::test]
    async fn release_is_idempotent_over_http() {
        let fx = fixture();
        let router = app(&fx);
        let slot = first_slot(&fx, MAIN_1).await;

        let (_, body) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-2", "slot_id": slot.id.0}),
        )
        .await;
        let id = body["data"]["reservation_id"].as_i64().unwrap();

        for _ in 0..2 {
            let release = format!("/api/v1/reservations/{}/release", id);
            let (status, body) = post_json(&router, &release, json!({})).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["status"], "Released");
        }
        assert_eq!(fx.store.remaining(slot.id), Some(slot.capacity));
    }

    #[tokio::test]
    async fn second_order_same_day_is_conflict() {
        let fx = fixture();
        let router = app(&fx);
        let first = first_slot(&fx, MAIN_1).await;
        let other = first_slot(&fx, MAIN_2).await;

        let (status, _) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-3", "slot_id": first.id.0}),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-3", "slot_id": other.id.0}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "You already have an order today");
        assert_eq!(fx.store.remaining(other.id), Some(other.capacity));
    }

    #[tokio::test]
    async fn full_slot_is_conflict() {
        let fx = fixture();
        let router = app(&fx);
        let slot = first_slot(&fx, MAIN_1).await;
        fx.store.set_remaining(slot.id, 0);

        let (status, body) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-4", "slot_id": slot.id.0}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], SLOT_FULL_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let fx = fixture();
        let router = app(&fx);

        let (status, _) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-5", "slot_id": 9999}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_json(&router, "/api/v1/reservations/4242").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn slot_outside_booking_window_is_not_found() {
        let fx = fixture();
        let router = app(&fx);
        let yesterday = fx.today - chrono::Duration::days(1);
        let slot = fx.store.insert_slot(
            &LocationId::new(MAIN_1),
            yesterday,
            Period::A,
            chrono::NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            10,
            10,
        );

        let (status, body) = post_json(
            &router,
            "/api/v1/reservations",
            json!({"user_id": "student-6", "slot_id": slot.id.0}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(fx.store.remaining(slot.id), Some(10));
        assert_eq!(fx.store.reservation_count(), 0);
    }

    #[tokio::test]
    async fn invalid_body_is_unprocessable() {
        let fx = fixture();
        let (status, body) = post_json(
            &app(&fx),
            "/api/v1/reservations",
            json!({"user_id": "", "slot_id": 1}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
    }
}
