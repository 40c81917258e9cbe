// src/handlers.rs

use axum::response::IntoResponse;
use rust_decimal::Decimal;
use validator::ValidationError;

use crate::models::contracts::MAX_MONEY;

pub mod amendments;
pub mod contracts;
pub mod inventory;

// Validação compartilhada pelos payloads com valores monetários:
// sem sinal negativo e dentro de NUMERIC(14, 2)
pub(crate) fn validate_money(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.add_param("min".into(), &0.0);
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    if *val > MAX_MONEY {
        let mut err = ValidationError::new("range");
        err.add_param("max".into(), &MAX_MONEY.to_string());
        err.message = Some(format!("O valor pode ser no máximo {MAX_MONEY}.").into());
        return Err(err);
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Sistema",
    responses((status = 200, description = "Serviço no ar"))
)]
pub async fn health() -> impl IntoResponse {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_must_fit_the_column() {
        assert!(validate_money(&Decimal::new(-1, 2)).is_err());
        assert!(validate_money(&Decimal::ZERO).is_ok());
        assert!(validate_money(&MAX_MONEY).is_ok());
        assert!(validate_money(&Decimal::MAX).is_err());
    }
}
