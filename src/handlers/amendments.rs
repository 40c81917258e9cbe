// src/handlers/amendments.rs

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
    models::amendments::{Amendment, AmendmentEffect, AmendmentType, NewAmendment, NewAmendmentItem},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AmendmentItemPayload {
    pub asset_type_id: Uuid,

    /// Sempre positiva; o sentido vem do tipo do aditivo.
    #[validate(range(min = 1, max = 1_000_000, message = "A quantidade deve estar entre 1 e 1000000."))]
    pub quantity: i32,

    #[validate(custom(function = "validate_money"))]
    pub unit_value: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAmendmentPayload {
    pub amendment_type: AmendmentType,

    pub effective_date: NaiveDate,

    #[validate(length(max = 500, message = "A descrição pode ter até 500 caracteres."))]
    pub description: Option<String>,

    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<AmendmentItemPayload>,

    /// Obrigatória em TERM_CHANGE.
    pub new_end_date: Option<NaiveDate>,

    /// VALUE_ADJUSTMENT: delta com sinal. REFUND: valor positivo a devolver.
    pub value: Option<Decimal>,
}

impl From<CreateAmendmentPayload> for NewAmendment {
    fn from(p: CreateAmendmentPayload) -> Self {
        let items = p
            .items
            .into_iter()
            .map(|i| NewAmendmentItem {
                asset_type_id: i.asset_type_id,
                // Itens em tipos que não os aceitam são recusados na validação da composição
                effect: match p.amendment_type {
                    AmendmentType::Reduction => AmendmentEffect::Reduction { quantity: i.quantity },
                    _ => AmendmentEffect::Increase { quantity: i.quantity },
                },
                unit_value: i.unit_value,
            })
            .collect();

        NewAmendment {
            amendment_type: p.amendment_type,
            effective_date: p.effective_date,
            description: p.description,
            items,
            new_end_date: p.new_end_date,
            value: p.value,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/amendments",
    tag = "Aditivos",
    request_body = CreateAmendmentPayload,
    responses(
        (status = 201, description = "Aditivo registrado como PENDING", body = Amendment),
        (status = 409, description = "Contrato não está ativo"),
        (status = 422, description = "Composição inválida")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn create_amendment(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
    Json(payload): Json<CreateAmendmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let amendment = app_state
        .amendment_service
        .create_amendment(landlord.0, contract_id, payload.into())
        .await?;

    Ok((StatusCode::CREATED, Json(amendment)))
}

#[utoipa::path(
    get,
    path = "/api/contracts/{id}/amendments",
    tag = "Aditivos",
    responses(
        (status = 200, description = "Aditivos do contrato", body = Vec<Amendment>),
        (status = 404, description = "Contrato não encontrado")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn list_amendments(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path(contract_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let amendments = app_state.amendment_service.list_amendments(landlord.0, contract_id).await?;
    Ok((StatusCode::OK, Json(amendments)))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/amendments/{amendment_id}/activate",
    tag = "Aditivos",
    responses(
        (status = 200, description = "Aditivo ativado", body = Amendment),
        (status = 409, description = "Estado inválido"),
        (status = 422, description = "Estoque insuficiente ou redução impossível")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("amendment_id" = Uuid, Path, description = "ID do aditivo"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn activate_amendment(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path((contract_id, amendment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let amendment = app_state
        .amendment_service
        .activate_amendment(landlord.0, contract_id, amendment_id)
        .await?;
    Ok((StatusCode::OK, Json(amendment)))
}

#[utoipa::path(
    post,
    path = "/api/contracts/{id}/amendments/{amendment_id}/cancel",
    tag = "Aditivos",
    responses(
        (status = 200, description = "Aditivo cancelado e efeitos desfeitos", body = Amendment),
        (status = 409, description = "Estado inválido"),
        (status = 422, description = "Efeitos não podem ser desfeitos")
    ),
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("amendment_id" = Uuid, Path, description = "ID do aditivo"),
        ("x-landlord-id" = Uuid, Header, description = "ID do locador")
    )
)]
pub async fn cancel_amendment(
    State(app_state): State<AppState>,
    landlord: LandlordContext,
    Path((contract_id, amendment_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let amendment = app_state
        .amendment_service
        .cancel_amendment(landlord.0, contract_id, amendment_id)
        .await?;
    Ok((StatusCode::OK, Json(amendment)))
}
