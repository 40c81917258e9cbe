// src/services/allocation.rs
//
// Motores de alocação e liberação de estoque.
// Todas as funções rodam dentro da transação do chamador: se qualquer passo
// falhar, o chamador descarta a transação e nada do que foi feito aqui fica.

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::RentalStore,
    models::inventory::{AllocationRecord, AssetType},
};

/// Uma unidade de trabalho do motor: quanto saiu/voltou de qual lote, por qual registro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMovement {
    pub batch_id: Uuid,
    pub allocation_record_id: Uuid,
    pub quantity: i32,
}

pub fn allocated_total(records: &[AllocationRecord]) -> i64 {
    records.iter().map(|r| i64::from(r.allocated_quantity)).sum()
}

// =============================================================================
//  ALOCAÇÃO FIFO
// =============================================================================

/// Aloca `quantity` unidades do tipo de ativo ao item, lote mais antigo primeiro.
/// Tudo ou nada: se o saldo somado não cobre o pedido, nenhum lote é tocado.
pub async fn allocate<T>(
    tx: &mut T,
    landlord_id: Uuid,
    asset_type: &AssetType,
    contract_item_id: Uuid,
    quantity: i32,
) -> Result<Vec<BatchMovement>, AppError>
where
    T: RentalStore + ?Sized,
{
    if quantity < 0 {
        return Err(AppError::InvalidQuantity(quantity));
    }
    if quantity == 0 {
        return Ok(Vec::new());
    }

    // 1. Trava os lotes elegíveis (mesmo locador, mesmo tipo, saldo > 0) em ordem FIFO
    let batches = tx.lock_available_batches(landlord_id, asset_type.id).await?;

    // 2. Valida o saldo total antes de mexer em qualquer coisa
    let available: i64 = batches.iter().map(|b| i64::from(b.available_quantity)).sum();
    if available < i64::from(quantity) {
        tracing::info!(
            asset_type_id = %asset_type.id,
            requested = quantity,
            available,
            "Alocação recusada por falta de saldo"
        );
        return Err(AppError::QuantityUnavailable {
            asset_type_id: asset_type.id,
            asset_type_name: asset_type.name.clone(),
            requested: quantity,
            available,
        });
    }

    // 3. Baixa nos lotes, um registro de alocação por lote tocado
    let mut remaining = quantity;
    let mut movements = Vec::new();

    for mut batch in batches {
        if remaining == 0 {
            break;
        }

        let taken = batch.consume(remaining);
        if taken == 0 {
            continue;
        }

        tx.set_batch_available(batch.id, batch.available_quantity).await?;
        let record = tx.insert_allocation(contract_item_id, batch.id, taken).await?;

        tracing::debug!(
            batch_id = %batch.id,
            contract_item_id = %contract_item_id,
            taken,
            "Unidades alocadas do lote"
        );

        movements.push(BatchMovement {
            batch_id: batch.id,
            allocation_record_id: record.id,
            quantity: taken,
        });
        remaining -= taken;
    }

    Ok(movements)
}

/// Aloca até `quantity` unidades de um lote específico. Devolve o que conseguiu
/// (pode ser menos que o pedido, ou nada); o chamador decide o que fazer com a falta.
pub async fn allocate_from_batch<T>(
    tx: &mut T,
    landlord_id: Uuid,
    batch_id: Uuid,
    contract_item_id: Uuid,
    quantity: i32,
) -> Result<Option<BatchMovement>, AppError>
where
    T: RentalStore + ?Sized,
{
    if quantity <= 0 {
        return Ok(None);
    }

    // Lote pode ter sido excluído depois que a alocação original foi liberada
    let Some(mut batch) = tx.lock_batch(landlord_id, batch_id).await? else {
        return Ok(None);
    };

    let taken = batch.consume(quantity);
    if taken == 0 {
        return Ok(None);
    }

    tx.set_batch_available(batch.id, batch.available_quantity).await?;
    let record = tx.insert_allocation(contract_item_id, batch.id, taken).await?;

    Ok(Some(BatchMovement {
        batch_id: batch.id,
        allocation_record_id: record.id,
        quantity: taken,
    }))
}

// =============================================================================
//  LIBERAÇÃO
// =============================================================================

/// Bloqueia de uma vez, em ordem FIFO, os lotes que uma liberação vai tocar.
/// Alocação e liberação concorrentes passam a travar lotes na mesma ordem.
pub async fn lock_batches_fifo<T>(tx: &mut T, landlord_id: Uuid, mut batch_ids: Vec<Uuid>) -> Result<(), AppError>
where
    T: RentalStore + ?Sized,
{
    batch_ids.sort_unstable();
    batch_ids.dedup();
    if !batch_ids.is_empty() {
        tx.lock_batches(landlord_id, &batch_ids).await?;
    }
    Ok(())
}

// Devolve unidades ao lote, nunca acima do total adquirido.
async fn restore_batch<T>(tx: &mut T, landlord_id: Uuid, batch_id: Uuid, quantity: i32) -> Result<(), AppError>
where
    T: RentalStore + ?Sized,
{
    let mut batch = tx.lock_batch(landlord_id, batch_id).await?.ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!(
            "lote {batch_id} referenciado por alocação não existe"
        ))
    })?;

    let restored = batch.restore(quantity);
    if restored < quantity {
        tracing::warn!(
            batch_id = %batch_id,
            requested = quantity,
            restored,
            "Liberação excederia o total do lote; saldo limitado ao total"
        );
    }

    tx.set_batch_available(batch.id, batch.available_quantity).await?;
    Ok(())
}

/// Libera todas as alocações do item e apaga os registros.
pub async fn release_all<T>(tx: &mut T, landlord_id: Uuid, contract_item_id: Uuid) -> Result<Vec<BatchMovement>, AppError>
where
    T: RentalStore + ?Sized,
{
    let records = tx.list_allocations(contract_item_id).await?;
    lock_batches_fifo(tx, landlord_id, records.iter().map(|r| r.batch_id).collect()).await?;
    let mut movements = Vec::with_capacity(records.len());

    for record in records {
        restore_batch(tx, landlord_id, record.batch_id, record.allocated_quantity).await?;
        tx.delete_allocation(record.id).await?;

        movements.push(BatchMovement {
            batch_id: record.batch_id,
            allocation_record_id: record.id,
            quantity: record.allocated_quantity,
        });
    }

    if !movements.is_empty() {
        tracing::debug!(contract_item_id = %contract_item_id, records = movements.len(), "Alocações liberadas");
    }
    Ok(movements)
}

/// Libera `quantity` unidades do item, registro mais recente primeiro (LIFO).
/// Falha sem tocar em nada se o item não tem tudo isso alocado.
pub async fn release_lifo<T>(
    tx: &mut T,
    landlord_id: Uuid,
    asset_type: &AssetType,
    contract_item_id: Uuid,
    quantity: i32,
) -> Result<Vec<BatchMovement>, AppError>
where
    T: RentalStore + ?Sized,
{
    if quantity < 0 {
        return Err(AppError::InvalidQuantity(quantity));
    }
    if quantity == 0 {
        return Ok(Vec::new());
    }

    let records = tx.list_allocations(contract_item_id).await?;
    let allocated = allocated_total(&records);
    if allocated < i64::from(quantity) {
        return Err(AppError::ReductionExceedsAllocated {
            asset_type_name: asset_type.name.clone(),
            requested: quantity,
            allocated,
        });
    }
    lock_batches_fifo(tx, landlord_id, records.iter().map(|r| r.batch_id).collect()).await?;

    let mut remaining = quantity;
    let mut movements = Vec::new();

    for record in records.into_iter().rev() {
        if remaining == 0 {
            break;
        }

        let released = record.allocated_quantity.min(remaining);
        restore_batch(tx, landlord_id, record.batch_id, released).await?;

        if released == record.allocated_quantity {
            tx.delete_allocation(record.id).await?;
        } else {
            tx.set_allocation_quantity(record.id, record.allocated_quantity - released).await?;
        }

        movements.push(BatchMovement {
            batch_id: record.batch_id,
            allocation_record_id: record.id,
            quantity: released,
        });
        remaining -= released;
    }

    Ok(movements)
}

/// Libera até `quantity` unidades de um registro específico do item.
/// Devolve `None` se o registro já não existe (ou pertence a outro item).
pub async fn release_from_record<T>(
    tx: &mut T,
    landlord_id: Uuid,
    contract_item_id: Uuid,
    allocation_record_id: Uuid,
    quantity: i32,
) -> Result<Option<BatchMovement>, AppError>
where
    T: RentalStore + ?Sized,
{
    if quantity <= 0 {
        return Ok(None);
    }

    let record = match tx.get_allocation(allocation_record_id).await? {
        Some(r) if r.contract_item_id == contract_item_id => r,
        _ => return Ok(None),
    };

    let released = record.allocated_quantity.min(quantity);
    restore_batch(tx, landlord_id, record.batch_id, released).await?;

    if released == record.allocated_quantity {
        tx.delete_allocation(record.id).await?;
    } else {
        tx.set_allocation_quantity(record.id, record.allocated_quantity - released).await?;
    }

    Ok(Some(BatchMovement {
        batch_id: record.batch_id,
        allocation_record_id: record.id,
        quantity: released,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStorage, Storage};
    use crate::models::inventory::NewBatch;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    struct Fixture {
        storage: MemoryStorage,
        landlord: Uuid,
        asset_type: AssetType,
        batches: Vec<Uuid>,
    }

    // Lotes adquiridos em dias consecutivos, na ordem dada
    async fn fixture(quantities: &[i32]) -> Fixture {
        let storage = MemoryStorage::new();
        let landlord = Uuid::new_v4();
        let mut tx = storage.begin(landlord).await.unwrap();

        let asset_type = tx.insert_asset_type(landlord, "Andaime", Decimal::new(1000, 2)).await.unwrap();
        let mut batches = Vec::new();
        for (day, total) in (1..).zip(quantities) {
            let batch = tx
                .insert_batch(
                    landlord,
                    &NewBatch {
                        asset_type_id: asset_type.id,
                        batch_number: None,
                        total_quantity: *total,
                        unit_cost: None,
                        acquired_at: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
                        notes: None,
                    },
                )
                .await
                .unwrap();
            batches.push(batch.id);
        }
        tx.commit().await.unwrap();

        Fixture { storage, landlord, asset_type, batches }
    }

    async fn available(tx: &mut impl RentalStore, f: &Fixture) -> Vec<i32> {
        tx.list_batches(f.landlord, f.asset_type.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.available_quantity)
            .collect()
    }

    #[tokio::test]
    async fn fifo_takes_oldest_batches_first() {
        let f = fixture(&[5, 5, 5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();

        let moves = allocate(&mut tx, f.landlord, &f.asset_type, item, 8).await.unwrap();

        assert_eq!(moves.len(), 2);
        assert_eq!((moves[0].batch_id, moves[0].quantity), (f.batches[0], 5));
        assert_eq!((moves[1].batch_id, moves[1].quantity), (f.batches[1], 3));
        assert_eq!(available(&mut tx, &f).await, vec![0, 2, 5]);
    }

    #[tokio::test]
    async fn release_handles_records_out_of_fifo_order() {
        let f = fixture(&[5, 5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();

        // Registro mais antigo no lote mais novo: LIFO e FIFO discordam
        allocate_from_batch(&mut tx, f.landlord, f.batches[1], item, 4).await.unwrap();
        allocate_from_batch(&mut tx, f.landlord, f.batches[0], item, 3).await.unwrap();
        lock_batches_fifo(&mut tx, f.landlord, vec![f.batches[1], f.batches[0], f.batches[1]])
            .await
            .unwrap();

        let moves = release_lifo(&mut tx, f.landlord, &f.asset_type, item, 5).await.unwrap();
        assert_eq!((moves[0].batch_id, moves[0].quantity), (f.batches[0], 3));
        assert_eq!((moves[1].batch_id, moves[1].quantity), (f.batches[1], 2));
        assert_eq!(available(&mut tx, &f).await, vec![5, 3]);

        release_all(&mut tx, f.landlord, item).await.unwrap();
        assert_eq!(available(&mut tx, &f).await, vec![5, 5]);
    }

    #[tokio::test]
    async fn allocation_is_all_or_nothing() {
        let f = fixture(&[5, 5]).await;
        let mut tx = f.storage.begin(f.landlord).await.unwrap();

        let err = allocate(&mut tx, f.landlord, &f.asset_type, Uuid::new_v4(), 11).await.unwrap_err();

        match err {
            AppError::QuantityUnavailable { requested, available: have, .. } => {
                assert_eq!(requested, 11);
                assert_eq!(have, 10);
            }
            other => panic!("erro inesperado: {other:?}"),
        }
        assert_eq!(available(&mut tx, &f).await, vec![5, 5]);
    }

    #[tokio::test]
    async fn lifo_release_starts_from_newest_record() {
        let f = fixture(&[5, 5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();
        allocate(&mut tx, f.landlord, &f.asset_type, item, 10).await.unwrap();

        let moves = release_lifo(&mut tx, f.landlord, &f.asset_type, item, 3).await.unwrap();

        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].batch_id, f.batches[1]);
        let records = tx.list_allocations(item).await.unwrap();
        let left: Vec<(Uuid, i32)> = records.iter().map(|r| (r.batch_id, r.allocated_quantity)).collect();
        assert_eq!(left, vec![(f.batches[0], 5), (f.batches[1], 2)]);
        assert_eq!(available(&mut tx, &f).await, vec![0, 3]);
    }

    #[tokio::test]
    async fn lifo_release_crosses_records_and_deletes_emptied_ones() {
        let f = fixture(&[5, 5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();
        allocate(&mut tx, f.landlord, &f.asset_type, item, 10).await.unwrap();

        release_lifo(&mut tx, f.landlord, &f.asset_type, item, 7).await.unwrap();

        let records = tx.list_allocations(item).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].batch_id, records[0].allocated_quantity), (f.batches[0], 3));
    }

    #[tokio::test]
    async fn lifo_release_rejects_more_than_allocated() {
        let f = fixture(&[5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();
        allocate(&mut tx, f.landlord, &f.asset_type, item, 4).await.unwrap();

        let err = release_lifo(&mut tx, f.landlord, &f.asset_type, item, 5).await.unwrap_err();

        assert!(matches!(err, AppError::ReductionExceedsAllocated { requested: 5, allocated: 4, .. }));
        assert_eq!(allocated_total(&tx.list_allocations(item).await.unwrap()), 4);
    }

    #[tokio::test]
    async fn release_all_restores_every_batch() {
        let f = fixture(&[5, 5, 5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();
        allocate(&mut tx, f.landlord, &f.asset_type, item, 12).await.unwrap();

        let moves = release_all(&mut tx, f.landlord, item).await.unwrap();

        assert_eq!(moves.iter().map(|m| m.quantity).sum::<i32>(), 12);
        assert!(tx.list_allocations(item).await.unwrap().is_empty());
        assert_eq!(available(&mut tx, &f).await, vec![5, 5, 5]);
    }

    #[tokio::test]
    async fn release_from_record_ignores_foreign_records() {
        let f = fixture(&[5]).await;
        let item = Uuid::new_v4();
        let mut tx = f.storage.begin(f.landlord).await.unwrap();
        let moves = allocate(&mut tx, f.landlord, &f.asset_type, item, 4).await.unwrap();
        let record = moves[0].allocation_record_id;

        let none = release_from_record(&mut tx, f.landlord, Uuid::new_v4(), record, 2).await.unwrap();
        assert!(none.is_none());

        let released = release_from_record(&mut tx, f.landlord, item, record, 2).await.unwrap().unwrap();
        assert_eq!(released.quantity, 2);
        assert_eq!(available(&mut tx, &f).await, vec![3]);
    }
}
