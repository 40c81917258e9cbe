// src/middleware/tenancy.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

use crate::common::error::ApiError;

// Cabeçalho que identifica o locador dono dos dados da requisição
pub const LANDLORD_ID_HEADER: &str = "x-landlord-id";

/// Locador da requisição, lido do cabeçalho `X-Landlord-ID`.
#[derive(Debug, Clone, Copy)]
pub struct LandlordContext(pub Uuid);

impl<S> FromRequestParts<S> for LandlordContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts.headers.get(LANDLORD_ID_HEADER).ok_or_else(|| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "O cabeçalho X-Landlord-ID é obrigatório.".to_string(),
        })?;

        let value_str = value.to_str().map_err(|_| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "Cabeçalho X-Landlord-ID contém caracteres inválidos.".to_string(),
        })?;

        let landlord_id = Uuid::parse_str(value_str).map_err(|_| ApiError {
            status: StatusCode::BAD_REQUEST,
            message: "Cabeçalho X-Landlord-ID inválido (não é um UUID).".to_string(),
        })?;

        Ok(LandlordContext(landlord_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<LandlordContext, ApiError> {
        let mut builder = Request::builder().uri("/api/contracts");
        if let Some(value) = header {
            builder = builder.header(LANDLORD_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        LandlordContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_landlord_from_header() {
        let id = Uuid::new_v4();
        let ctx = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(ctx.0, id);
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_bad_request() {
        assert_eq!(extract(None).await.unwrap_err().status, StatusCode::BAD_REQUEST);
        assert_eq!(extract(Some("loja-1")).await.unwrap_err().status, StatusCode::BAD_REQUEST);
    }
}
