use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/scripts", script_routes())
        .nest("/licenses", license_routes())
        .nest("/files", file_routes())
}

fn script_routes() -> Router<AppState> {
    let crud = Router::new()
        .route("/", post(handlers::script::create_script))
        .route(
            "/{id}",
            get(handlers::script::get_script).delete(handlers::script::delete_script),
        )
        .route(
            "/{id}/perusal",
            post(handlers::perusal::create_perusal_request),
        )
        .route(
            "/perusal/{request_id}/download",
            get(handlers::perusal::download_perusal),
        );

    let upload = Router::new()
        .route("/{id}/file", post(handlers::script::upload_script_file))
        .layer(handlers::script::upload_body_limit());

    crud.merge(upload)
}

fn license_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::license::create_license))
        .route("/{id}", get(handlers::license::get_license))
        .route("/{id}/download", get(handlers::license::download_license))
}

fn file_routes() -> Router<AppState> {
    Router::new().route("/{token}", get(handlers::files::redeem_download_token))
}
