pub mod config;
pub mod database;
pub mod delivery;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod utils;

use axum::http::HeaderValue;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stagedoor Script Licensing API",
        version = "1.0.0",
        description = "Secure licensed-script delivery: watermarked perusal and full-script downloads behind presigned, expiring URLs"
    ),
    tags(
        (name = "Scripts", description = "Script metadata and manuscript uploads"),
        (name = "Licenses", description = "License records and licensed downloads"),
        (name = "Perusal", description = "Perusal requests and perusal downloads"),
        (name = "Files", description = "Presigned download token redemption"),
    ),
    paths(
        handlers::script::create_script,
        handlers::script::get_script,
        handlers::script::upload_script_file,
        handlers::script::delete_script,
        handlers::perusal::create_perusal_request,
        handlers::perusal::download_perusal,
        handlers::license::create_license,
        handlers::license::get_license,
        handlers::license::download_license,
        handlers::files::redeem_download_token,
    ),
    components(schemas(
        common::LicenseStatus,
        common::PerusalRequestStatus,
        error::ErrorBody,
        models::delivery::DownloadResponse,
        models::license::CreateLicenseRequest,
        models::license::LicenseResponse,
        models::license::PerformanceDate,
        models::perusal::PerusalRequestResponse,
        models::script::CreateScriptRequest,
        models::script::ScriptFileResponse,
        models::script::ScriptResponse,
    )),
    modifiers(&SecurityAddon),
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state);

    axum::Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .layer(cors)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let cors_config = &state.config.server.cors;

    let origins = if cors_config.allow_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cors_config
                .allow_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(cors_config.max_age))
}
