// src/models/contracts.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::amendments::Amendment;
use crate::models::inventory::AllocationRecord;

/// Maior valor que cabe nas colunas `NUMERIC(14, 2)`.
pub const MAX_MONEY: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// Maior quantidade aceita num item ou lote.
pub const MAX_QUANTITY: i32 = 1_000_000;

/// Confere se o valor monetário cabe no banco, sem sinal negativo.
pub fn ensure_money(value: Decimal, field: &str) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AppError::InvalidInput(format!("{field}: o valor não pode ser negativo.")));
    }
    if value > MAX_MONEY {
        return Err(AppError::InvalidInput(format!("{field}: o valor excede o limite de {MAX_MONEY}.")));
    }
    Ok(())
}

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contract_status", rename_all = "SCREAMING_SNAKE_CASE")] // Banco
#[serde(rename_all = "SCREAMING_SNAKE_CASE")] // JSON
pub enum ContractStatus {
    Draft,
    Active,
    Cancelled,
    Finished,
}

// --- Contrato ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: Uuid,
    #[schema(ignore)]
    pub landlord_id: Uuid,
    /// O locatário (cliente que aluga).
    pub lessee_id: Uuid,
    #[schema(example = "CTR-20240301-1A2B3C4D")]
    pub code: String,
    pub status: ContractStatus,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[schema(example = "3750.00")]
    pub total_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Só rascunhos aceitam mudança direta de itens. Depois de ativo, só via aditivo.
    pub fn is_editable(&self) -> bool {
        self.status == ContractStatus::Draft
    }

    pub fn rental_days(&self) -> i64 {
        rental_days_between(self.start_date, self.end_date)
    }
}

/// Diárias cobradas entre as datas. Contratos de um dia só cobram uma diária.
pub fn rental_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days().max(1)
}

/// Código legível do contrato, ex.: `CTR-20240301-1A2B3C4D`.
pub fn generate_contract_code(id: Uuid, date: NaiveDate) -> String {
    let suffix: String = id.simple().to_string().chars().take(8).collect();
    format!("CTR-{}-{}", date.format("%Y%m%d"), suffix.to_uppercase())
}

// --- Item do Contrato ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractItem {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub asset_type_id: Uuid,
    #[schema(example = 10)]
    pub quantity: i32,
    #[schema(example = "12.50")]
    pub unit_daily_value: Decimal,
    #[schema(example = "3750.00")]
    pub total_item_value: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContractItem {
    /// quantidade x diária x diárias. Falha se o resultado não couber no banco.
    pub fn compute_total(quantity: i32, unit_daily_value: Decimal, rental_days: i64) -> Result<Decimal, AppError> {
        Decimal::from(quantity)
            .checked_mul(unit_daily_value)
            .and_then(|v| v.checked_mul(Decimal::from(rental_days)))
            .filter(|total| total.abs() <= MAX_MONEY)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "O total do item ({quantity} x {unit_daily_value} x {rental_days} diárias) excede o limite de {MAX_MONEY}."
                ))
            })
    }

    pub fn recompute_total(&mut self, rental_days: i64) -> Result<(), AppError> {
        self.total_item_value = Self::compute_total(self.quantity, self.unit_daily_value, rental_days)?;
        Ok(())
    }
}

// Item com as suas alocações, usado no detalhe do contrato
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractItemDetail {
    #[serde(flatten)]
    pub item: ContractItem,
    pub allocated_quantity: i32,
    pub allocations: Vec<AllocationRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetail {
    #[serde(flatten)]
    pub header: Contract,
    pub items: Vec<ContractItemDetail>,
    pub amendments: Vec<Amendment>,
}

// --- Entradas dos serviços ---

#[derive(Debug, Clone)]
pub struct NewContract {
    pub lessee_id: Uuid,
    pub code: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewContractItem {
    pub asset_type_id: Uuid,
    pub quantity: i32,
    /// `None` usa a diária padrão do tipo de ativo.
    pub unit_daily_value: Option<Decimal>,
}

// Atualização parcial: só o que vier preenchido muda
#[derive(Debug, Clone, Default)]
pub struct ContractItemChanges {
    pub quantity: Option<i32>,
    pub unit_daily_value: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rental_days_counts_nights_with_a_minimum_of_one() {
        assert_eq!(rental_days_between(date(2024, 3, 1), date(2024, 3, 31)), 30);
        assert_eq!(rental_days_between(date(2024, 3, 1), date(2024, 3, 1)), 1);
    }

    #[test]
    fn item_total_is_quantity_times_daily_value_times_days() {
        let total = ContractItem::compute_total(10, Decimal::new(1250, 2), 30).unwrap();
        assert_eq!(total, Decimal::new(375000, 2));
    }

    #[test]
    fn item_total_that_does_not_fit_is_rejected() {
        assert!(matches!(
            ContractItem::compute_total(1, Decimal::MAX, 30),
            Err(AppError::InvalidInput(_))
        ));
        // Cabe no Decimal mas não em NUMERIC(14, 2)
        assert!(ContractItem::compute_total(1_000, MAX_MONEY, 30).is_err());
        assert!(ContractItem::compute_total(1, MAX_MONEY, 1).is_ok());
    }

    #[test]
    fn money_ceiling_matches_the_column() {
        assert_eq!(MAX_MONEY, Decimal::new(99_999_999_999_999, 2));
        assert!(ensure_money(MAX_MONEY, "Diária").is_ok());
        assert!(ensure_money(MAX_MONEY + Decimal::new(1, 2), "Diária").is_err());
        assert!(ensure_money(Decimal::new(-1, 2), "Diária").is_err());
    }

    #[test]
    fn contract_code_uses_date_and_id_prefix() {
        let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
        assert_eq!(generate_contract_code(id, date(2024, 3, 1)), "CTR-20240301-1A2B3C4D");
    }
}
