// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{amendments::AmendmentStatus, contracts::ContractStatus};

// Nosso tipo de erro, com `thiserror` para melhor ergonomia.
// As variantes de domínio carregam os campos que o corpo da resposta precisa.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0} não encontrado(a).")]
    ResourceNotFound(String),

    #[error(
        "Quantidade indisponível para '{asset_type_name}': solicitado {requested}, disponível {available}."
    )]
    QuantityUnavailable {
        asset_type_id: Uuid,
        asset_type_name: String,
        requested: i32,
        available: i64,
    },

    #[error(
        "Não é possível reduzir '{asset_type_name}': solicitado {requested}, mas apenas {allocated} unidade(s) estão alocadas."
    )]
    ReductionExceedsAllocated {
        asset_type_name: String,
        requested: i32,
        allocated: i64,
    },

    #[error(
        "Não é possível reduzir '{asset_type_name}': solicitado {requested}, mas o item possui apenas {current_quantity} unidade(s)."
    )]
    ReductionExceedsQuantity {
        asset_type_name: String,
        requested: i32,
        current_quantity: i32,
    },

    #[error("Não é possível reduzir '{asset_type_name}': o tipo de ativo não faz parte do contrato.")]
    AssetTypeNotOnContract {
        asset_type_id: Uuid,
        asset_type_name: String,
    },

    #[error("O contrato {contract_code} ({status:?}) não pode ser alterado diretamente. Use um aditivo.")]
    ImmutableActiveContract {
        contract_code: String,
        status: ContractStatus,
    },

    #[error("O aditivo {amendment_id} está {current:?} e não pode ser {action}.")]
    InvalidAmendmentState {
        amendment_id: Uuid,
        current: AmendmentStatus,
        action: &'static str,
    },

    #[error("O contrato {contract_code} está {current:?}: {reason}")]
    InvalidContractState {
        contract_code: String,
        current: ContractStatus,
        reason: String,
    },

    #[error("{0}")]
    InvalidAmendment(String),

    #[error("Já existe um contrato com o código {0}.")]
    ContractCodeAlreadyExists(String),

    #[error("O contrato já possui um item para '{asset_type_name}'.")]
    DuplicateContractItem { asset_type_name: String },

    #[error("O lote {batch_id} possui {allocations} alocação(ões) e não pode ser excluído.")]
    BatchInUse { batch_id: Uuid, allocations: i64 },

    #[error("Quantidade inválida: {0}.")]
    InvalidQuantity(i32),

    #[error("{0}")]
    InvalidInput(String),

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    /// Código estável para o front-end decidir o que mostrar.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validacao",
            AppError::ResourceNotFound(_) => "nao_encontrado",
            AppError::QuantityUnavailable { .. } => "quantidade_indisponivel",
            AppError::ReductionExceedsAllocated { .. }
            | AppError::ReductionExceedsQuantity { .. }
            | AppError::AssetTypeNotOnContract { .. } => "reducao_impossivel",
            AppError::ImmutableActiveContract { .. } => "contrato_imutavel",
            AppError::InvalidAmendmentState { .. } => "estado_aditivo_invalido",
            AppError::InvalidContractState { .. } => "estado_contrato_invalido",
            AppError::InvalidAmendment(_) => "aditivo_invalido",
            AppError::ContractCodeAlreadyExists(_) => "codigo_duplicado",
            AppError::DuplicateContractItem { .. } => "item_duplicado",
            AppError::BatchInUse { .. } => "lote_em_uso",
            AppError::InvalidQuantity(_) => "quantidade_invalida",
            AppError::InvalidInput(_) => "dados_invalidos",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "erro_interno",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let error_type = self.error_type();

        let (status, body) = match self {
            // Retorna todos os detalhes da validação.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = json!({
                    "message": "Um ou mais campos são inválidos.",
                    "error_type": error_type,
                    "details": details,
                });
                (StatusCode::BAD_REQUEST, body)
            }
            AppError::QuantityUnavailable {
                asset_type_id,
                asset_type_name,
                requested,
                available,
            } => {
                let body = json!({
                    "message": message,
                    "error_type": error_type,
                    "asset_type": { "id": asset_type_id, "name": asset_type_name },
                    "requested": requested,
                    "available": available,
                    "missing": i64::from(requested) - available,
                });
                (StatusCode::UNPROCESSABLE_ENTITY, body)
            }
            AppError::ImmutableActiveContract { contract_code, .. } => {
                let body = json!({
                    "message": message,
                    "error_type": error_type,
                    "contract_code": contract_code,
                });
                (StatusCode::UNPROCESSABLE_ENTITY, body)
            }
            AppError::ReductionExceedsAllocated { .. }
            | AppError::ReductionExceedsQuantity { .. }
            | AppError::AssetTypeNotOnContract { .. }
            | AppError::InvalidAmendment(_)
            | AppError::InvalidQuantity(_)
            | AppError::InvalidInput(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "message": message, "error_type": error_type }),
            ),
            AppError::ResourceNotFound(_) => (
                StatusCode::NOT_FOUND,
                json!({ "message": message, "error_type": error_type }),
            ),
            AppError::InvalidAmendmentState { .. }
            | AppError::InvalidContractState { .. }
            | AppError::ContractCodeAlreadyExists(_)
            | AppError::DuplicateContractItem { .. }
            | AppError::BatchInUse { .. } => (
                StatusCode::CONFLICT,
                json!({ "message": message, "error_type": error_type }),
            ),

            // DatabaseError e InternalServerError viram 500.
            // O `tracing` loga a causa real; o cliente recebe uma mensagem genérica.
            ref e @ (AppError::DatabaseError(_) | AppError::InternalServerError(_)) => {
                tracing::error!(error = ?e, "Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "message": "Ocorreu um erro inesperado.", "error_type": error_type }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

// Erro "pronto" para rejeições de extratores (cabeçalhos inválidos etc).
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn render(err: AppError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quantity_unavailable_reports_shortfall() {
        let asset_type_id = Uuid::new_v4();
        let (status, body) = render(AppError::QuantityUnavailable {
            asset_type_id,
            asset_type_name: "Betoneira 400L".into(),
            requested: 12,
            available: 7,
        })
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error_type"], "quantidade_indisponivel");
        assert_eq!(body["asset_type"]["name"], "Betoneira 400L");
        assert_eq!(body["asset_type"]["id"], asset_type_id.to_string());
        assert_eq!(body["requested"], 12);
        assert_eq!(body["available"], 7);
        assert_eq!(body["missing"], 5);
    }

    #[tokio::test]
    async fn immutable_contract_carries_code() {
        let (status, body) = render(AppError::ImmutableActiveContract {
            contract_code: "CTR-20240301-ABCD0001".into(),
            status: ContractStatus::Active,
        })
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["contract_code"], "CTR-20240301-ABCD0001");
        assert!(body["message"].as_str().unwrap().contains("aditivo"));
    }

    #[tokio::test]
    async fn every_cannot_reduce_variant_says_so() {
        let errors = vec![
            AppError::ReductionExceedsAllocated { asset_type_name: "Andaime".into(), requested: 10, allocated: 5 },
            AppError::ReductionExceedsQuantity { asset_type_name: "Andaime".into(), requested: 10, current_quantity: 5 },
            AppError::AssetTypeNotOnContract { asset_type_id: Uuid::new_v4(), asset_type_name: "Andaime".into() },
        ];
        for err in errors {
            let (status, body) = render(err).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body["error_type"], "reducao_impossivel");
            assert!(body["message"].as_str().unwrap().contains("Não é possível reduzir"));
        }
    }

    #[tokio::test]
    async fn state_conflicts_are_409() {
        let (status, _) = render(AppError::InvalidAmendmentState {
            amendment_id: Uuid::new_v4(),
            current: AmendmentStatus::Cancelled,
            action: "ativado",
        })
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let (status, body) = render(AppError::InternalServerError(anyhow::anyhow!("pool exausto"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Ocorreu um erro inesperado.");
    }
}
