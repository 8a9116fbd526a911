//! `GET /` and `GET /health` (spec §11 SUPPLEMENTED FEATURES).

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn root() -> Json<HealthBody> {
    health().await
}
