//! OpenAPI document for the public endpoints.

use utoipa::OpenApi;

use super::handlers::{HealthResponse, InstanceResponse, UserResponse};
use crate::error::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Webstack API",
        description = "Backend API for Kubernetes Webstack project",
        version = "1.0.0"
    ),
    paths(
        super::handlers::get_user,
        super::handlers::get_instance_id,
        super::handlers::health
    ),
    components(schemas(UserResponse, InstanceResponse, HealthResponse, ErrorResponse)),
    tags((name = "webstack", description = "User, instance and health endpoints"))
)]
pub struct ApiDoc;
