// src/handlers/inventory.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::validate_money,
    middleware::tenancy::LandlordContext,
    models::inventory::{AssetType, AvailabilitySummary, Batch, NewBatch},
};

// ---
// Payload: CreateAssetType
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetTypePayload {
    #[validate(length(min = 1, max = 120, message = "O nome é obrigatório (até 120 caracteres)."))]
    pub name: String,

    #[validate(custom(function = "validate_money"))]
    pub default_daily_value: Decimal,
}

// ---
// Payload: CreateBatch
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBatchPayload {
    pub asset_type_id: Uuid,

    #[validate(length(max = 60, message = "O número do lote pode ter até 60 caracteres."))]
    pub batch_number: Option<String>,

    #[validate(range(min = 0, max = 1_000_000, message = "A quantidade deve estar entre 0 e 1000000."))]
    pub total_quantity: i32,

    #[validate(custom(function = "validate_money"))]
    pub unit_cost: Option<Decimal>,

    pub acquired_at: NaiveDate,

    pub notes: Option<String>,
}

impl From<CreateBatchPayload> for NewBatch {
    fn from(p: CreateBatchPayload) -> Self {
        NewBatch {
            asset_type_id: p.asset_type_id,
            batch_number: p.batch_number,
            total_quantity: p.total_quantity,
            unit_cost: p.unit_cost,
            acquired_at: p.acquired_at,
            notes: p.notes,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/asset-types",
    tag = "Estoque",
    request_body = CreateAssetTypePayload,
    responses(
        (status = 201, description = "Tipo de ativo criado", body = AssetType),
        (status = 400, description = "Dados inválidos")
    ),
    params(
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn create_asset_type(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Json(payload): Json<CreateAssetTypePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let asset_type = app_state
        .inventory_service
        .create_asset_type(landlord.0, &payload.name, payload.default_daily_value)
        .await?;

    Ok((StatusCode::CREATED, Json(asset_type)))
}

#[utoipa::path(
    get,
    path = "/api/asset-types",
    tag = "Estoque",
    responses(
        (status = 200, description = "Tipos de ativo do locador", body = Vec<AssetType>)
    ),
    params(
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn list_asset_types(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
) -> Result<impl IntoResponse, AppError> {
    let asset_types = app_state.inventory_service.list_asset_types(landlord.0).await?;
    Ok((StatusCode::OK, Json(asset_types)))
}

#[utoipa::path(
    get,
    path = "/api/asset-types/{id}/availability",
    tag = "Estoque",
    responses(
        (status = 200, description = "Resumo de disponibilidade", body = AvailabilitySummary),
        (status = 404, description = "Tipo de ativo não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do tipo de ativo"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn get_availability(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(asset_type_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let summary = app_state.inventory_service.availability(landlord.0, asset_type_id).await?;
    Ok((StatusCode::OK, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/api/asset-types/{id}/batches",
    tag = "Estoque",
    responses(
        (status = 200, description = "Lotes em ordem FIFO", body = Vec<Batch>),
        (status = 404, description = "Tipo de ativo não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do tipo de ativo"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn list_batches(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(asset_type_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let batches = app_state.inventory_service.list_batches(landlord.0, asset_type_id).await?;
    Ok((StatusCode::OK, Json(batches)))
}

#[utoipa::path(
    post,
    path = "/api/batches",
    tag = "Estoque",
    request_body = CreateBatchPayload,
    responses(
        (status = 201, description = "Lote registrado", body = Batch),
        (status = 400, description = "Dados inválidos"),
        (status = 404, description = "Tipo de ativo não encontrado")
    ),
    params(
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn create_batch(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Json(payload): Json<CreateBatchPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let batch = app_state.inventory_service.create_batch(landlord.0, payload.into()).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

#[utoipa::path(
    delete,
    path = "/api/batches/{id}",
    tag = "Estoque",
    responses(
        (status = 204, description = "Lote excluído"),
        (status = 404, description = "Lote não encontrado"),
        (status = 409, description = "Lote com alocações")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do lote"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn delete_batch(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(batch_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.inventory_service.delete_batch(landlord.0, batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
