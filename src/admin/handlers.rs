use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AdminState;
use crate::load_balancer::{Algorithm, RegistryStats, UpdateOutcome};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct AlgorithmChange {
    pub algorithm: String,
}

#[derive(Debug, Serialize)]
pub struct AlgorithmView {
    pub algorithm: Algorithm,
}

#[derive(Debug, Deserialize)]
pub struct HealthChange {
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthView {
    pub name: String,
    pub healthy: bool,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<RegistryStats> {
    Json(state.registry.stats())
}

pub async fn put_algorithm(
    State(state): State<AdminState>,
    Json(change): Json<AlgorithmChange>,
) -> Json<AlgorithmView> {
    let algorithm = state.registry.set_algorithm(&change.algorithm);
    Json(AlgorithmView { algorithm })
}

pub async fn put_backend_health(
    State(state): State<AdminState>,
    Path(name): Path<String>,
    Json(change): Json<HealthChange>,
) -> Result<Json<HealthView>, StatusCode> {
    match state.registry.set_health(&name, change.healthy) {
        UpdateOutcome::NotFound => Err(StatusCode::NOT_FOUND),
        UpdateOutcome::Applied | UpdateOutcome::Unchanged => Ok(Json(HealthView {
            name,
            healthy: change.healthy,
        })),
    }
}
