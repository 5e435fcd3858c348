//! Cast targets. Discovery is external; devices are registered here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use castit_core::{DeviceId, Error};
use serde::Deserialize;

use crate::device::DeviceDescriptor;
use crate::server::context::AppContext;
use crate::server::error::AppError;

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceRequest {
    pub id: String,
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// GET /api/devices
pub async fn list_devices(State(ctx): State<AppContext>) -> Json<Vec<DeviceDescriptor>> {
    Json(ctx.devices.list())
}

/// POST /api/devices
pub async fn register_device(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterDeviceRequest>,
) -> Result<StatusCode, AppError> {
    if req.id.trim().is_empty() || req.host.trim().is_empty() {
        return Err(Error::Validation("device id and host are required".into()).into());
    }
    ctx.devices
        .register(DeviceDescriptor::new(req.id, req.name, req.host, req.port));
    Ok(StatusCode::CREATED)
}

/// POST /api/devices/{id}/connect
pub async fn connect_device(State(ctx): State<AppContext>, Path(id): Path<String>) -> Result<StatusCode, AppError> {
    ctx.session.connect(DeviceId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
