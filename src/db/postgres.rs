// src/db/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    common::{db_utils::begin_landlord_transaction, error::AppError},
    db::store::{RentalStore, Storage},
    models::{
        amendments::{
            Amendment, AmendmentEffect, AmendmentItem, AmendmentMovement, AmendmentStatus, NewAmendment, NewMovement,
        },
        contracts::{Contract, ContractItem, ContractStatus, NewContract},
        inventory::{AllocationRecord, AssetType, Batch, NewBatch},
    },
};

// =============================================================================
// Internal Row Types
// =============================================================================

// No banco o efeito é um delta com sinal; no domínio, um enum.
#[derive(Debug, sqlx::FromRow)]
struct AmendmentItemRow {
    id: Uuid,
    amendment_id: Uuid,
    asset_type_id: Uuid,
    position: i32,
    quantity_delta: i32,
    unit_value: Option<Decimal>,
    contract_item_id: Option<Uuid>,
    created_contract_item: bool,
    removed_contract_item: bool,
}

impl TryFrom<AmendmentItemRow> for AmendmentItem {
    type Error = AppError;

    fn try_from(row: AmendmentItemRow) -> Result<Self, Self::Error> {
        let effect = AmendmentEffect::from_delta(row.quantity_delta).ok_or_else(|| {
            AppError::InternalServerError(anyhow::anyhow!(
                "item de aditivo {} com delta de quantidade zero",
                row.id
            ))
        })?;
        Ok(Self {
            id: row.id,
            amendment_id: row.amendment_id,
            asset_type_id: row.asset_type_id,
            position: row.position,
            effect,
            unit_value: row.unit_value,
            contract_item_id: row.contract_item_id,
            created_contract_item: row.created_contract_item,
            removed_contract_item: row.removed_contract_item,
        })
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    type Tx = PgRentalStore;

    async fn begin(&self, landlord_id: Uuid) -> Result<Self::Tx, AppError> {
        let tx = begin_landlord_transaction(&self.pool, landlord_id).await?;
        Ok(PgRentalStore { tx })
    }
}

/// Transação Postgres aberta. Se for descartada sem `commit`, o sqlx faz ROLLBACK.
pub struct PgRentalStore {
    tx: Transaction<'static, Postgres>,
}

impl PgRentalStore {
    async fn load_amendment_items(&mut self, amendment_id: Uuid) -> Result<Vec<AmendmentItem>, AppError> {
        let rows = sqlx::query_as::<_, AmendmentItemRow>(
            "SELECT * FROM amendment_items WHERE amendment_id = $1 ORDER BY position ASC",
        )
        .bind(amendment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(AmendmentItem::try_from).collect()
    }
}

#[async_trait]
impl RentalStore for PgRentalStore {
    // =========================================================================
    //  TIPOS DE ATIVO
    // =========================================================================

    async fn insert_asset_type(
        &mut self,
        landlord_id: Uuid,
        name: &str,
        default_daily_value: Decimal,
    ) -> Result<AssetType, AppError> {
        let asset_type = sqlx::query_as::<_, AssetType>(
            r#"
            INSERT INTO asset_types (landlord_id, name, default_daily_value)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(landlord_id)
        .bind(name)
        .bind(default_daily_value)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(asset_type)
    }

    async fn get_asset_type(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Option<AssetType>, AppError> {
        let asset_type = sqlx::query_as::<_, AssetType>(
            "SELECT * FROM asset_types WHERE id = $1 AND landlord_id = $2",
        )
        .bind(asset_type_id)
        .bind(landlord_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(asset_type)
    }

    async fn list_asset_types(&mut self, landlord_id: Uuid) -> Result<Vec<AssetType>, AppError> {
        let asset_types = sqlx::query_as::<_, AssetType>(
            "SELECT * FROM asset_types WHERE landlord_id = $1 ORDER BY name ASC",
        )
        .bind(landlord_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(asset_types)
    }

    // =========================================================================
    //  LOTES
    // =========================================================================

    async fn insert_batch(&mut self, landlord_id: Uuid, batch: &NewBatch) -> Result<Batch, AppError> {
        // O saldo disponível nasce igual ao total adquirido
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            INSERT INTO batches (
                landlord_id, asset_type_id, batch_number, total_quantity,
                available_quantity, unit_cost, acquired_at, notes
            )
            VALUES ($1, $2, $3, $4, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(landlord_id)
        .bind(batch.asset_type_id)
        .bind(batch.batch_number.as_deref())
        .bind(batch.total_quantity)
        .bind(batch.unit_cost)
        .bind(batch.acquired_at)
        .bind(batch.notes.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(batch)
    }

    async fn list_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE landlord_id = $1 AND asset_type_id = $2
            ORDER BY acquired_at ASC, seq ASC
            "#,
        )
        .bind(landlord_id)
        .bind(asset_type_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(batches)
    }

    async fn lock_batch(&mut self, landlord_id: Uuid, batch_id: Uuid) -> Result<Option<Batch>, AppError> {
        let batch = sqlx::query_as::<_, Batch>(
            "SELECT * FROM batches WHERE id = $1 AND landlord_id = $2 FOR UPDATE",
        )
        .bind(batch_id)
        .bind(landlord_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(batch)
    }

    async fn lock_batches(&mut self, landlord_id: Uuid, batch_ids: &[Uuid]) -> Result<Vec<Batch>, AppError> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE landlord_id = $1 AND id = ANY($2)
            ORDER BY acquired_at ASC, seq ASC
            FOR UPDATE
            "#,
        )
        .bind(landlord_id)
        .bind(batch_ids)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(batches)
    }

    async fn lock_available_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError> {
        // FOR UPDATE: duas alocações concorrentes no mesmo lote se enfileiram aqui
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT * FROM batches
            WHERE landlord_id = $1 AND asset_type_id = $2 AND available_quantity > 0
            ORDER BY acquired_at ASC, seq ASC
            FOR UPDATE
            "#,
        )
        .bind(landlord_id)
        .bind(asset_type_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(batches)
    }

    async fn set_batch_available(&mut self, batch_id: Uuid, available_quantity: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE batches
            SET available_quantity = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(batch_id)
        .bind(available_quantity)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn count_batch_allocations(&mut self, batch_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM allocation_records WHERE batch_id = $1")
            .bind(batch_id)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(count)
    }

    async fn delete_batch(&mut self, batch_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(batch_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  ALOCAÇÕES
    // =========================================================================

    async fn insert_allocation(
        &mut self,
        contract_item_id: Uuid,
        batch_id: Uuid,
        allocated_quantity: i32,
    ) -> Result<AllocationRecord, AppError> {
        let record = sqlx::query_as::<_, AllocationRecord>(
            r#"
            INSERT INTO allocation_records (contract_item_id, batch_id, allocated_quantity)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(contract_item_id)
        .bind(batch_id)
        .bind(allocated_quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn list_allocations(&mut self, contract_item_id: Uuid) -> Result<Vec<AllocationRecord>, AppError> {
        let records = sqlx::query_as::<_, AllocationRecord>(
            r#"
            SELECT * FROM allocation_records
            WHERE contract_item_id = $1
            ORDER BY seq ASC
            FOR UPDATE
            "#,
        )
        .bind(contract_item_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn get_allocation(&mut self, allocation_id: Uuid) -> Result<Option<AllocationRecord>, AppError> {
        let record = sqlx::query_as::<_, AllocationRecord>(
            "SELECT * FROM allocation_records WHERE id = $1 FOR UPDATE",
        )
        .bind(allocation_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn set_allocation_quantity(&mut self, allocation_id: Uuid, allocated_quantity: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE allocation_records SET allocated_quantity = $2 WHERE id = $1")
            .bind(allocation_id)
            .bind(allocated_quantity)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn delete_allocation(&mut self, allocation_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM allocation_records WHERE id = $1")
            .bind(allocation_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  CONTRATOS E ITENS
    // =========================================================================

    async fn insert_contract(&mut self, landlord_id: Uuid, contract: &NewContract, code: &str) -> Result<Contract, AppError> {
        sqlx::query_as::<_, Contract>(
            r#"
            INSERT INTO contracts (landlord_id, lessee_id, code, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(landlord_id)
        .bind(contract.lessee_id)
        .bind(code)
        .bind(contract.start_date)
        .bind(contract.end_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            // Código duplicado vira erro de validação, não 500
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::ContractCodeAlreadyExists(code.to_string());
                }
            }
            e.into()
        })
    }

    async fn lock_contract(&mut self, landlord_id: Uuid, contract_id: Uuid) -> Result<Option<Contract>, AppError> {
        let contract = sqlx::query_as::<_, Contract>(
            "SELECT * FROM contracts WHERE id = $1 AND landlord_id = $2 FOR UPDATE",
        )
        .bind(contract_id)
        .bind(landlord_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(contract)
    }

    async fn set_contract_status(&mut self, contract_id: Uuid, status: ContractStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE contracts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(contract_id)
            .bind(status)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_contract_end_date(&mut self, contract_id: Uuid, end_date: NaiveDate) -> Result<(), AppError> {
        sqlx::query("UPDATE contracts SET end_date = $2, updated_at = NOW() WHERE id = $1")
            .bind(contract_id)
            .bind(end_date)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_contract_total(&mut self, contract_id: Uuid, total_value: Decimal) -> Result<(), AppError> {
        sqlx::query("UPDATE contracts SET total_value = $2, updated_at = NOW() WHERE id = $1")
            .bind(contract_id)
            .bind(total_value)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_contract_item(
        &mut self,
        contract_id: Uuid,
        asset_type_id: Uuid,
        quantity: i32,
        unit_daily_value: Decimal,
        total_item_value: Decimal,
    ) -> Result<ContractItem, AppError> {
        let item = sqlx::query_as::<_, ContractItem>(
            r#"
            INSERT INTO contract_items (
                contract_id, asset_type_id, quantity, unit_daily_value, total_item_value
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(contract_id)
        .bind(asset_type_id)
        .bind(quantity)
        .bind(unit_daily_value)
        .bind(total_item_value)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn get_contract_item(&mut self, contract_id: Uuid, item_id: Uuid) -> Result<Option<ContractItem>, AppError> {
        let item = sqlx::query_as::<_, ContractItem>(
            "SELECT * FROM contract_items WHERE id = $1 AND contract_id = $2 FOR UPDATE",
        )
        .bind(item_id)
        .bind(contract_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn find_contract_item_by_asset_type(
        &mut self,
        contract_id: Uuid,
        asset_type_id: Uuid,
    ) -> Result<Option<ContractItem>, AppError> {
        let item = sqlx::query_as::<_, ContractItem>(
            "SELECT * FROM contract_items WHERE contract_id = $1 AND asset_type_id = $2 FOR UPDATE",
        )
        .bind(contract_id)
        .bind(asset_type_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(item)
    }

    async fn list_contract_items(&mut self, contract_id: Uuid) -> Result<Vec<ContractItem>, AppError> {
        let items = sqlx::query_as::<_, ContractItem>(
            "SELECT * FROM contract_items WHERE contract_id = $1 ORDER BY created_at ASC",
        )
        .bind(contract_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(items)
    }

    async fn update_contract_item(&mut self, item: &ContractItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE contract_items
            SET quantity = $2, unit_daily_value = $3, total_item_value = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.quantity)
        .bind(item.unit_daily_value)
        .bind(item.total_item_value)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_contract_item(&mut self, item_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM contract_items WHERE id = $1")
            .bind(item_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    // =========================================================================
    //  ADITIVOS
    // =========================================================================

    async fn insert_amendment(
        &mut self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment: &NewAmendment,
    ) -> Result<Amendment, AppError> {
        let mut header = sqlx::query_as::<_, Amendment>(
            r#"
            INSERT INTO amendments (
                landlord_id, contract_id, amendment_type, effective_date,
                description, new_end_date, value_delta
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(landlord_id)
        .bind(contract_id)
        .bind(amendment.amendment_type)
        .bind(amendment.effective_date)
        .bind(amendment.description.as_deref())
        .bind(amendment.new_end_date)
        .bind(amendment.value_delta())
        .fetch_one(&mut *self.tx)
        .await?;

        for (position, item) in (0_i32..).zip(amendment.items.iter()) {
            let row = sqlx::query_as::<_, AmendmentItemRow>(
                r#"
                INSERT INTO amendment_items (amendment_id, asset_type_id, position, quantity_delta, unit_value)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
                "#,
            )
            .bind(header.id)
            .bind(item.asset_type_id)
            .bind(position)
            .bind(item.effect.quantity_delta())
            .bind(item.unit_value)
            .fetch_one(&mut *self.tx)
            .await?;

            header.items.push(AmendmentItem::try_from(row)?);
        }

        Ok(header)
    }

    async fn lock_amendment(&mut self, contract_id: Uuid, amendment_id: Uuid) -> Result<Option<Amendment>, AppError> {
        let header = sqlx::query_as::<_, Amendment>(
            "SELECT * FROM amendments WHERE id = $1 AND contract_id = $2 FOR UPDATE",
        )
        .bind(amendment_id)
        .bind(contract_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(mut amendment) = header else {
            return Ok(None);
        };
        amendment.items = self.load_amendment_items(amendment.id).await?;
        Ok(Some(amendment))
    }

    async fn list_amendments(&mut self, contract_id: Uuid) -> Result<Vec<Amendment>, AppError> {
        let mut amendments = sqlx::query_as::<_, Amendment>(
            "SELECT * FROM amendments WHERE contract_id = $1 ORDER BY created_at ASC",
        )
        .bind(contract_id)
        .fetch_all(&mut *self.tx)
        .await?;

        for amendment in amendments.iter_mut() {
            amendment.items = self.load_amendment_items(amendment.id).await?;
        }
        Ok(amendments)
    }

    async fn set_amendment_status(
        &mut self,
        amendment_id: Uuid,
        status: AmendmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let sql = match status {
            AmendmentStatus::Active => "UPDATE amendments SET status = $2, activated_at = $3 WHERE id = $1",
            AmendmentStatus::Cancelled => "UPDATE amendments SET status = $2, cancelled_at = $3 WHERE id = $1",
            AmendmentStatus::Pending => "UPDATE amendments SET status = $2, activated_at = NULL, cancelled_at = NULL WHERE id = $1 AND $3 IS NOT NULL",
        };

        sqlx::query(sql)
            .bind(amendment_id)
            .bind(status)
            .bind(at)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn set_amendment_previous_end_date(
        &mut self,
        amendment_id: Uuid,
        previous_end_date: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE amendments SET previous_end_date = $2 WHERE id = $1")
            .bind(amendment_id)
            .bind(previous_end_date)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn update_amendment_item(&mut self, item: &AmendmentItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE amendment_items
            SET unit_value = $2,
                contract_item_id = $3,
                created_contract_item = $4,
                removed_contract_item = $5
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.unit_value)
        .bind(item.contract_item_id)
        .bind(item.created_contract_item)
        .bind(item.removed_contract_item)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<AmendmentMovement, AppError> {
        let row = sqlx::query_as::<_, AmendmentMovement>(
            r#"
            INSERT INTO amendment_movements (
                amendment_id, amendment_item_id, contract_item_id, batch_id,
                allocation_record_id, kind, quantity, is_reversal
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(movement.amendment_id)
        .bind(movement.amendment_item_id)
        .bind(movement.contract_item_id)
        .bind(movement.batch_id)
        .bind(movement.allocation_record_id)
        .bind(movement.kind)
        .bind(movement.quantity)
        .bind(movement.is_reversal)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(row)
    }

    async fn list_movements(&mut self, amendment_id: Uuid) -> Result<Vec<AmendmentMovement>, AppError> {
        let rows = sqlx::query_as::<_, AmendmentMovement>(
            "SELECT * FROM amendment_movements WHERE amendment_id = $1 ORDER BY seq ASC",
        )
        .bind(amendment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
