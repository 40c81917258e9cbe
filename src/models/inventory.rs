// src/models/inventory.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// --- 1. Tipos de Ativo ---
// Catálogo do locador: "Andaime tubular", "Betoneira 400L"...
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssetType {
    pub id: Uuid,
    #[schema(ignore)]
    pub landlord_id: Uuid,
    #[schema(example = "Andaime tubular 1,5m")]
    pub name: String,
    /// Valor da diária usado quando o item do contrato não informa o seu.
    #[schema(example = "12.50")]
    pub default_daily_value: Decimal,
    pub created_at: DateTime<Utc>,
}

// --- 2. Lotes ---
// Um lote é uma entrada física de unidades fungíveis de um tipo de ativo.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: Uuid,
    #[schema(ignore)]
    pub landlord_id: Uuid,
    pub asset_type_id: Uuid,
    /// Sequência monotônica, desempate da ordem FIFO.
    pub seq: i64,
    #[schema(example = "NF-2024-0031")]
    pub batch_number: Option<String>,
    #[schema(example = 20)]
    pub total_quantity: i32,
    #[schema(example = 15)]
    pub available_quantity: i32,
    pub unit_cost: Option<Decimal>,
    pub acquired_at: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn allocated_quantity(&self) -> i32 {
        self.total_quantity - self.available_quantity
    }

    /// Retira até `wanted` unidades do saldo disponível e devolve quanto foi retirado.
    pub fn consume(&mut self, wanted: i32) -> i32 {
        let taken = wanted.clamp(0, self.available_quantity);
        self.available_quantity -= taken;
        taken
    }

    /// Devolve unidades ao saldo, nunca acima do total adquirido.
    /// Retorna quanto efetivamente voltou.
    pub fn restore(&mut self, amount: i32) -> i32 {
        let room = self.total_quantity - self.available_quantity;
        let restored = amount.clamp(0, room);
        self.available_quantity += restored;
        restored
    }
}

// --- 3. Registros de Alocação ---
// Liga um item de contrato a um lote. Só os motores de alocação/liberação mexem aqui.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub id: Uuid,
    pub contract_item_id: Uuid,
    pub batch_id: Uuid,
    /// Chave de ordenação: FIFO na alocação, LIFO na liberação.
    pub seq: i64,
    #[schema(example = 5)]
    pub allocated_quantity: i32,
    pub created_at: DateTime<Utc>,
}

// Entrada do serviço de estoque
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub asset_type_id: Uuid,
    pub batch_number: Option<String>,
    pub total_quantity: i32,
    pub unit_cost: Option<Decimal>,
    pub acquired_at: NaiveDate,
    pub notes: Option<String>,
}

// --- 4. Resumo de Disponibilidade ---
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySummary {
    pub asset_type_id: Uuid,
    pub total_quantity: i64,
    pub available_quantity: i64,
    pub allocated_quantity: i64,
}

impl AvailabilitySummary {
    pub fn from_batches(asset_type_id: Uuid, batches: &[Batch]) -> Self {
        let total_quantity: i64 = batches.iter().map(|b| i64::from(b.total_quantity)).sum();
        let available_quantity: i64 = batches.iter().map(|b| i64::from(b.available_quantity)).sum();
        Self {
            asset_type_id,
            total_quantity,
            available_quantity,
            allocated_quantity: total_quantity - available_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(total: i32, available: i32) -> Batch {
        let now = Utc::now();
        Batch {
            id: Uuid::new_v4(),
            landlord_id: Uuid::new_v4(),
            asset_type_id: Uuid::new_v4(),
            seq: 1,
            batch_number: None,
            total_quantity: total,
            available_quantity: available,
            unit_cost: None,
            acquired_at: now.date_naive(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn consume_never_goes_below_zero() {
        let mut b = batch(10, 4);
        assert_eq!(b.consume(6), 4);
        assert_eq!(b.available_quantity, 0);
        assert_eq!(b.allocated_quantity(), 10);
    }

    #[test]
    fn restore_is_capped_at_total() {
        let mut b = batch(10, 8);
        assert_eq!(b.restore(5), 2);
        assert_eq!(b.available_quantity, 10);
    }

    #[test]
    fn availability_sums_every_batch() {
        let asset = Uuid::new_v4();
        let summary = AvailabilitySummary::from_batches(asset, &[batch(20, 15), batch(5, 0)]);
        assert_eq!(summary.total_quantity, 25);
        assert_eq!(summary.available_quantity, 15);
        assert_eq!(summary.allocated_quantity, 10);
    }
}
