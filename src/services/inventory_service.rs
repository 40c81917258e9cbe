// src/services/inventory_service.rs

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RentalStore, Storage},
    models::{
        contracts::{ensure_money, MAX_QUANTITY},
        inventory::{AssetType, AvailabilitySummary, Batch, NewBatch},
    },
};

#[derive(Clone)]
pub struct InventoryService<S: Storage> {
    storage: S,
}

impl<S: Storage> InventoryService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    // =========================================================================
    //  TIPOS DE ATIVO
    // =========================================================================

    pub async fn create_asset_type(
        &self,
        landlord_id: Uuid,
        name: &str,
        default_daily_value: Decimal,
    ) -> Result<AssetType, AppError> {
        ensure_money(default_daily_value, "Diária padrão")?;

        let mut tx = self.storage.begin(landlord_id).await?;
        let asset_type = tx.insert_asset_type(landlord_id, name.trim(), default_daily_value).await?;
        tx.commit().await?;

        tracing::info!(landlord_id = %landlord_id, asset_type_id = %asset_type.id, "Tipo de ativo criado");
        Ok(asset_type)
    }

    pub async fn list_asset_types(&self, landlord_id: Uuid) -> Result<Vec<AssetType>, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        let asset_types = tx.list_asset_types(landlord_id).await?;
        tx.commit().await?;
        Ok(asset_types)
    }

    // =========================================================================
    //  LOTES
    // =========================================================================

    /// Registra a entrada de um lote. O saldo disponível nasce igual ao total.
    pub async fn create_batch(&self, landlord_id: Uuid, batch: NewBatch) -> Result<Batch, AppError> {
        if batch.total_quantity < 0 || batch.total_quantity > MAX_QUANTITY {
            return Err(AppError::InvalidQuantity(batch.total_quantity));
        }
        if let Some(cost) = batch.unit_cost {
            ensure_money(cost, "Custo unitário")?;
        }

        let mut tx = self.storage.begin(landlord_id).await?;

        // 1. O tipo de ativo precisa ser do mesmo locador
        tx.get_asset_type(landlord_id, batch.asset_type_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Tipo de ativo".into()))?;

        // 2. Grava
        let created = tx.insert_batch(landlord_id, &batch).await?;
        tx.commit().await?;

        tracing::info!(
            landlord_id = %landlord_id,
            batch_id = %created.id,
            asset_type_id = %created.asset_type_id,
            total_quantity = created.total_quantity,
            "Lote registrado"
        );
        Ok(created)
    }

    /// Lotes do tipo de ativo em ordem FIFO.
    pub async fn list_batches(&self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        tx.get_asset_type(landlord_id, asset_type_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Tipo de ativo".into()))?;
        let batches = tx.list_batches(landlord_id, asset_type_id).await?;
        tx.commit().await?;
        Ok(batches)
    }

    pub async fn availability(&self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<AvailabilitySummary, AppError> {
        let batches = self.list_batches(landlord_id, asset_type_id).await?;
        Ok(AvailabilitySummary::from_batches(asset_type_id, &batches))
    }

    /// Exclui um lote que nunca foi (ou não está mais) alocado.
    pub async fn delete_batch(&self, landlord_id: Uuid, batch_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;

        let batch = tx
            .lock_batch(landlord_id, batch_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Lote".into()))?;

        let allocations = tx.count_batch_allocations(batch.id).await?;
        if allocations > 0 {
            return Err(AppError::BatchInUse { batch_id, allocations });
        }

        tx.delete_batch(batch.id).await?;
        tx.commit().await?;

        tracing::info!(landlord_id = %landlord_id, batch_id = %batch_id, "Lote excluído");
        Ok(())
    }
}
