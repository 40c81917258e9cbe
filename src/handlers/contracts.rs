// src/handlers/contracts.rs

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
use validator::{Validate, ValidationError};

use crate::{
    common::error::AppError,
    config::AppState,
    handlers::validate_money,
    middleware::tenancy::LandlordContext,
    models::contracts::{
        Contract, ContractDetail, ContractItemChanges, ContractItemDetail, NewContract, NewContractItem,
    },
};

// ---
// Payload: CreateContract
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_period"))]
pub struct CreateContractPayload {
    pub lessee_id: Uuid,

    /// Gerado automaticamente (CTR-AAAAMMDD-XXXXXXXX) quando omitido.
    #[validate(length(min = 1, max = 40, message = "O código pode ter até 40 caracteres."))]
    pub code: Option<String>,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

fn validate_period(payload: &CreateContractPayload) -> Result<(), ValidationError> {
    if payload.end_date < payload.start_date {
        let mut err = ValidationError::new("period");
        err.message = Some("A data de término não pode ser anterior à data de início.".into());
        return Err(err);
    }
    Ok(())
}

// ---
// Payloads de itens
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddContractItemPayload {
    pub asset_type_id: Uuid,

    #[validate(range(min = 1, max = 1_000_000, message = "A quantidade deve estar entre 1 e 1000000."))]
    pub quantity: i32,

    /// Usa a diária padrão do tipo de ativo quando omitido.
    #[validate(custom(function = "validate_money"))]
    pub unit_daily_value: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContractItemPayload {
    #[validate(range(min = 1, max = 1_000_000, message = "A quantidade deve estar entre 1 e 1000000."))]
    pub quantity: Option<i32>,

    #[validate(custom(function = "validate_money"))]
    pub unit_daily_value: Option<Decimal>,
}

// --- CONTRATO ---

#[utoipa::path(
    post,
    path = "/api/contracts",
    tag = "Contratos",
    request_body = CreateContractPayload,
    responses(
        (status = 201, description = "Contrato criado em rascunho", body = Contract),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Código já utilizado")
    ),
    params(
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn create_contract(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Json(payload): Json<CreateContractPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let contract = app_state
        .contract_service
        .create_contract(
            landlord.0,
            NewContract {
                lessee_id: payload.lessee_id,
                code: payload.code,
                start_date: payload.start_date,
                end_date: payload.end_date,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(contract)))
}

#[utoipa::path(
    get,
    path = "/api/contracts/{id}",
    tag = "Contratos",
    responses(
        (status = 200, description = "Contrato com itens, alocações e aditivos", body = ContractDetail),
        (status = 404, description = "Contrato não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let detail = app_state.contract_service.get_contract(landlord.0, contract_id).await?;
    Ok((StatusCode::OK, Json(detail)))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/activate",
    tag = "Contratos",
    responses(
        (status = 200, description = "Contrato ativado", body = Contract),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn activate_contract(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let contract = app_state.contract_service.activate_contract(landlord.0, contract_id).await?;
    Ok((StatusCode::OK, Json(contract)))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/cancel",
    tag = "Contratos",
    responses(
        (status = 200, description = "Contrato cancelado e estoque devolvido", body = Contract),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn cancel_contract(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let contract = app_state.contract_service.cancel_contract(landlord.0, contract_id).await?;
    Ok((StatusCode::OK, Json(contract)))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/finish",
    tag = "Contratos",
    responses(
        (status = 200, description = "Contrato finalizado e estoque devolvido", body = Contract),
        (status = 409, description = "Transição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn finish_contract(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let contract = app_state.contract_service.finish_contract(landlord.0, contract_id).await?;
    Ok((StatusCode::OK, Json(contract)))
}

// --- ITENS ---

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/items",
    tag = "Contratos",
    request_body = AddContractItemPayload,
    responses(
        (status = 201, description = "Item adicionado e alocado", body = ContractItemDetail),
        (status = 409, description = "Tipo de ativo já está no contrato"),
        (status = 422, description = "Estoque insuficiente ou contrato não editável")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn add_item(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
    Json(payload): Json<AddContractItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .contract_service
        .add_item(
            landlord.0,
            contract_id,
            NewContractItem {
                asset_type_id: payload.asset_type_id,
                quantity: payload.quantity,
                unit_daily_value: payload.unit_daily_value,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    patch,
    path = "/api/contracts/{id}/items/{item_id}",
    tag = "Contratos",
    request_body = UpdateContractItemPayload,
    responses(
        (status = 200, description = "Item atualizado", body = ContractItemDetail),
        (status = 422, description = "Estoque insuficiente ou contrato não editável")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("item_id" = Uuid, Path, description = "ID do item"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn update_item(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path((contract_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateContractItemPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let item = app_state
        .contract_service
        .update_item(
            landlord.0,
            contract_id,
            item_id,
            ContractItemChanges {
                quantity: payload.quantity,
                unit_daily_value: payload.unit_daily_value,
            },
        )
        .await?;

    Ok((StatusCode::OK, Json(item)))
}

#[utoipa::path(
    delete,
    path = "/api/contracts/{id}/items/{item_id}",
    tag = "Contratos",
    responses(
        (status = 204, description = "Item removido e estoque devolvido"),
        (status = 422, description = "Contrato não editável")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("item_id" = Uuid, Path, description = "ID do item"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn remove_item(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path((contract_id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    app_state.contract_service.remove_item(landlord.0, contract_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
