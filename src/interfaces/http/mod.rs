//! HTTP REST API
//!
//! - `common`: response envelope, error mapping, validated JSON extractor
//! - `modules`: handlers and DTOs per resource, plus request-id and metrics middleware
//! - `router`: route table and the OpenAPI document served at `/docs/`

pub mod common;
pub mod modules;
pub mod router;

pub use common::{ApiError, ApiResponse, ValidatedJson};
pub use router::{create_api_router, ApiDoc, ApiState};
