// src/db/memory.rs
//
// Armazenamento em memória com a mesma semântica transacional do Postgres:
// `begin` segura o lock global e trabalha numa cópia; `commit` publica a cópia.
// Descartar a transação sem commit descarta a cópia (rollback).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{RentalStore, Storage},
    models::{
        amendments::{Amendment, AmendmentItem, AmendmentMovement, AmendmentStatus, NewAmendment, NewMovement},
        contracts::{Contract, ContractItem, ContractStatus, NewContract},
        inventory::{AllocationRecord, AssetType, Batch, NewBatch},
    },
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    asset_types: HashMap<Uuid, AssetType>,
    batches: HashMap<Uuid, Batch>,
    allocations: HashMap<Uuid, AllocationRecord>,
    contracts: HashMap<Uuid, Contract>,
    contract_items: HashMap<Uuid, ContractItem>,
    amendments: HashMap<Uuid, Amendment>,
    movements: Vec<AmendmentMovement>,
    next_seq: i64,
}

impl MemoryState {
    fn next_seq(&mut self) -> i64 {
        self.next_seq += 1;
        self.next_seq
    }
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    type Tx = MemoryRentalStore;

    async fn begin(&self, _landlord_id: Uuid) -> Result<Self::Tx, AppError> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryRentalStore { guard, work })
    }
}

pub struct MemoryRentalStore {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl RentalStore for MemoryRentalStore {
    // --- Tipos de ativo ---

    async fn insert_asset_type(
        &mut self,
        landlord_id: Uuid,
        name: &str,
        default_daily_value: Decimal,
    ) -> Result<AssetType, AppError> {
        let asset_type = AssetType {
            id: Uuid::new_v4(),
            landlord_id,
            name: name.to_string(),
            default_daily_value,
            created_at: Utc::now(),
        };
        self.work.asset_types.insert(asset_type.id, asset_type.clone());
        Ok(asset_type)
    }

    async fn get_asset_type(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Option<AssetType>, AppError> {
        Ok(self
            .work
            .asset_types
            .get(&asset_type_id)
            .filter(|a| a.landlord_id == landlord_id)
            .cloned())
    }

    async fn list_asset_types(&mut self, landlord_id: Uuid) -> Result<Vec<AssetType>, AppError> {
        let mut asset_types: Vec<AssetType> = self
            .work
            .asset_types
            .values()
            .filter(|a| a.landlord_id == landlord_id)
            .cloned()
            .collect();
        asset_types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(asset_types)
    }

    // --- Lotes ---

    async fn insert_batch(&mut self, landlord_id: Uuid, batch: &NewBatch) -> Result<Batch, AppError> {
        let now = Utc::now();
        let seq = self.work.next_seq();
        let batch = Batch {
            id: Uuid::new_v4(),
            landlord_id,
            asset_type_id: batch.asset_type_id,
            seq,
            batch_number: batch.batch_number.clone(),
            total_quantity: batch.total_quantity,
            available_quantity: batch.total_quantity,
            unit_cost: batch.unit_cost,
            acquired_at: batch.acquired_at,
            notes: batch.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.work.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    async fn list_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError> {
        let mut batches: Vec<Batch> = self
            .work
            .batches
            .values()
            .filter(|b| b.landlord_id == landlord_id && b.asset_type_id == asset_type_id)
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.acquired_at, b.seq));
        Ok(batches)
    }

    async fn lock_batch(&mut self, landlord_id: Uuid, batch_id: Uuid) -> Result<Option<Batch>, AppError> {
        Ok(self
            .work
            .batches
            .get(&batch_id)
            .filter(|b| b.landlord_id == landlord_id)
            .cloned())
    }

    async fn lock_batches(&mut self, landlord_id: Uuid, batch_ids: &[Uuid]) -> Result<Vec<Batch>, AppError> {
        let mut batches: Vec<Batch> = self
            .work
            .batches
            .values()
            .filter(|b| b.landlord_id == landlord_id && batch_ids.contains(&b.id))
            .cloned()
            .collect();
        batches.sort_by_key(|b| (b.acquired_at, b.seq));
        Ok(batches)
    }

    async fn lock_available_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError> {
        let mut batches = self.list_batches(landlord_id, asset_type_id).await?;
        batches.retain(|b| b.available_quantity > 0);
        Ok(batches)
    }

    async fn set_batch_available(&mut self, batch_id: Uuid, available_quantity: i32) -> Result<(), AppError> {
        if let Some(batch) = self.work.batches.get_mut(&batch_id) {
            batch.available_quantity = available_quantity;
            batch.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_batch_allocations(&mut self, batch_id: Uuid) -> Result<i64, AppError> {
        let count = self.work.allocations.values().filter(|r| r.batch_id == batch_id).count();
        Ok(count as i64)
    }

    async fn delete_batch(&mut self, batch_id: Uuid) -> Result<(), AppError> {
        self.work.batches.remove(&batch_id);
        Ok(())
    }

    // --- Alocações ---

    async fn insert_allocation(
        &mut self,
        contract_item_id: Uuid,
        batch_id: Uuid,
        allocated_quantity: i32,
    ) -> Result<AllocationRecord, AppError> {
        let seq = self.work.next_seq();
        let record = AllocationRecord {
            id: Uuid::new_v4(),
            contract_item_id,
            batch_id,
            seq,
            allocated_quantity,
            created_at: Utc::now(),
        };
        self.work.allocations.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_allocations(&mut self, contract_item_id: Uuid) -> Result<Vec<AllocationRecord>, AppError> {
        let mut records: Vec<AllocationRecord> = self
            .work
            .allocations
            .values()
            .filter(|r| r.contract_item_id == contract_item_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.seq);
        Ok(records)
    }

    async fn get_allocation(&mut self, allocation_id: Uuid) -> Result<Option<AllocationRecord>, AppError> {
        Ok(self.work.allocations.get(&allocation_id).cloned())
    }

    async fn set_allocation_quantity(&mut self, allocation_id: Uuid, allocated_quantity: i32) -> Result<(), AppError> {
        if let Some(record) = self.work.allocations.get_mut(&allocation_id) {
            record.allocated_quantity = allocated_quantity;
        }
        Ok(())
    }

    async fn delete_allocation(&mut self, allocation_id: Uuid) -> Result<(), AppError> {
        self.work.allocations.remove(&allocation_id);
        Ok(())
    }

    // --- Contratos e itens ---

    async fn insert_contract(&mut self, landlord_id: Uuid, contract: &NewContract, code: &str) -> Result<Contract, AppError> {
        let taken = self
            .work
            .contracts
            .values()
            .any(|c| c.landlord_id == landlord_id && c.code == code);
        if taken {
            return Err(AppError::ContractCodeAlreadyExists(code.to_string()));
        }

        let now = Utc::now();
        let contract = Contract {
            id: Uuid::new_v4(),
            landlord_id,
            lessee_id: contract.lessee_id,
            code: code.to_string(),
            status: ContractStatus::Draft,
            start_date: contract.start_date,
            end_date: contract.end_date,
            total_value: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        self.work.contracts.insert(contract.id, contract.clone());
        Ok(contract)
    }

    async fn lock_contract(&mut self, landlord_id: Uuid, contract_id: Uuid) -> Result<Option<Contract>, AppError> {
        Ok(self
            .work
            .contracts
            .get(&contract_id)
            .filter(|c| c.landlord_id == landlord_id)
            .cloned())
    }

    async fn set_contract_status(&mut self, contract_id: Uuid, status: ContractStatus) -> Result<(), AppError> {
        if let Some(contract) = self.work.contracts.get_mut(&contract_id) {
            contract.status = status;
            contract.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_contract_end_date(&mut self, contract_id: Uuid, end_date: NaiveDate) -> Result<(), AppError> {
        if let Some(contract) = self.work.contracts.get_mut(&contract_id) {
            contract.end_date = end_date;
            contract.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_contract_total(&mut self, contract_id: Uuid, total_value: Decimal) -> Result<(), AppError> {
        if let Some(contract) = self.work.contracts.get_mut(&contract_id) {
            contract.total_value = total_value;
            contract.updated_at = Utc::now();
        }
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
        let now = Utc::now();
        let item = ContractItem {
            id: Uuid::new_v4(),
            contract_id,
            asset_type_id,
            quantity,
            unit_daily_value,
            total_item_value,
            created_at: now,
            updated_at: now,
        };
        self.work.contract_items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn get_contract_item(&mut self, contract_id: Uuid, item_id: Uuid) -> Result<Option<ContractItem>, AppError> {
        Ok(self
            .work
            .contract_items
            .get(&item_id)
            .filter(|i| i.contract_id == contract_id)
            .cloned())
    }

    async fn find_contract_item_by_asset_type(
        &mut self,
        contract_id: Uuid,
        asset_type_id: Uuid,
    ) -> Result<Option<ContractItem>, AppError> {
        Ok(self
            .work
            .contract_items
            .values()
            .find(|i| i.contract_id == contract_id && i.asset_type_id == asset_type_id)
            .cloned())
    }

    async fn list_contract_items(&mut self, contract_id: Uuid) -> Result<Vec<ContractItem>, AppError> {
        let mut items: Vec<ContractItem> = self
            .work
            .contract_items
            .values()
            .filter(|i| i.contract_id == contract_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    async fn update_contract_item(&mut self, item: &ContractItem) -> Result<(), AppError> {
        if let Some(stored) = self.work.contract_items.get_mut(&item.id) {
            stored.quantity = item.quantity;
            stored.unit_daily_value = item.unit_daily_value;
            stored.total_item_value = item.total_item_value;
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_contract_item(&mut self, item_id: Uuid) -> Result<(), AppError> {
        // Espelha as FKs: alocações caem junto, itens de aditivo perdem a referência
        self.work.contract_items.remove(&item_id);
        self.work.allocations.retain(|_, r| r.contract_item_id != item_id);
        for amendment in self.work.amendments.values_mut() {
            for item in amendment.items.iter_mut() {
                if item.contract_item_id == Some(item_id) {
                    item.contract_item_id = None;
                }
            }
        }
        Ok(())
    }

    // --- Aditivos ---

    async fn insert_amendment(
        &mut self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment: &NewAmendment,
    ) -> Result<Amendment, AppError> {
        let id = Uuid::new_v4();
        let items = (0_i32..)
            .zip(amendment.items.iter())
            .map(|(position, item)| AmendmentItem {
                id: Uuid::new_v4(),
                amendment_id: id,
                asset_type_id: item.asset_type_id,
                position,
                effect: item.effect,
                unit_value: item.unit_value,
                contract_item_id: None,
                created_contract_item: false,
                removed_contract_item: false,
            })
            .collect();

        let amendment = Amendment {
            id,
            landlord_id,
            contract_id,
            amendment_type: amendment.amendment_type,
            status: AmendmentStatus::Pending,
            effective_date: amendment.effective_date,
            description: amendment.description.clone(),
            new_end_date: amendment.new_end_date,
            previous_end_date: None,
            value_delta: amendment.value_delta(),
            created_at: Utc::now(),
            activated_at: None,
            cancelled_at: None,
            items,
        };
        self.work.amendments.insert(amendment.id, amendment.clone());
        Ok(amendment)
    }

    async fn lock_amendment(&mut self, contract_id: Uuid, amendment_id: Uuid) -> Result<Option<Amendment>, AppError> {
        Ok(self
            .work
            .amendments
            .get(&amendment_id)
            .filter(|a| a.contract_id == contract_id)
            .cloned())
    }

    async fn list_amendments(&mut self, contract_id: Uuid) -> Result<Vec<Amendment>, AppError> {
        let mut amendments: Vec<Amendment> = self
            .work
            .amendments
            .values()
            .filter(|a| a.contract_id == contract_id)
            .cloned()
            .collect();
        amendments.sort_by_key(|a| a.created_at);
        Ok(amendments)
    }

    async fn set_amendment_status(
        &mut self,
        amendment_id: Uuid,
        status: AmendmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if let Some(amendment) = self.work.amendments.get_mut(&amendment_id) {
            amendment.status = status;
            match status {
                AmendmentStatus::Active => amendment.activated_at = Some(at),
                AmendmentStatus::Cancelled => amendment.cancelled_at = Some(at),
                AmendmentStatus::Pending => {
                    amendment.activated_at = None;
                    amendment.cancelled_at = None;
                }
            }
        }
        Ok(())
    }

    async fn set_amendment_previous_end_date(
        &mut self,
        amendment_id: Uuid,
        previous_end_date: Option<NaiveDate>,
    ) -> Result<(), AppError> {
        if let Some(amendment) = self.work.amendments.get_mut(&amendment_id) {
            amendment.previous_end_date = previous_end_date;
        }
        Ok(())
    }

    async fn update_amendment_item(&mut self, item: &AmendmentItem) -> Result<(), AppError> {
        let stored = self
            .work
            .amendments
            .get_mut(&item.amendment_id)
            .and_then(|a| a.items.iter_mut().find(|i| i.id == item.id));
        if let Some(stored) = stored {
            stored.unit_value = item.unit_value;
            stored.contract_item_id = item.contract_item_id;
            stored.created_contract_item = item.created_contract_item;
            stored.removed_contract_item = item.removed_contract_item;
        }
        Ok(())
    }

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<AmendmentMovement, AppError> {
        let seq = self.work.next_seq();
        let row = AmendmentMovement {
            id: Uuid::new_v4(),
            amendment_id: movement.amendment_id,
            amendment_item_id: movement.amendment_item_id,
            contract_item_id: movement.contract_item_id,
            batch_id: movement.batch_id,
            allocation_record_id: movement.allocation_record_id,
            kind: movement.kind,
            quantity: movement.quantity,
            is_reversal: movement.is_reversal,
            seq,
            created_at: Utc::now(),
        };
        self.work.movements.push(row.clone());
        Ok(row)
    }

    async fn list_movements(&mut self, amendment_id: Uuid) -> Result<Vec<AmendmentMovement>, AppError> {
        // `movements` já está em ordem de inserção, que é a ordem de `seq`
        Ok(self
            .work
            .movements
            .iter()
            .filter(|m| m.amendment_id == amendment_id)
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<(), AppError> {
        let MemoryRentalStore { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_batch(asset_type_id: Uuid, total: i32, acquired_at: NaiveDate) -> NewBatch {
        NewBatch {
            asset_type_id,
            batch_number: None,
            total_quantity: total,
            unit_cost: None,
            acquired_at,
            notes: None,
        }
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let storage = MemoryStorage::new();
        let landlord = Uuid::new_v4();

        let mut tx = storage.begin(landlord).await.unwrap();
        tx.insert_asset_type(landlord, "Betoneira", Decimal::new(5000, 2)).await.unwrap();
        drop(tx);

        let mut tx = storage.begin(landlord).await.unwrap();
        assert!(tx.list_asset_types(landlord).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let storage = MemoryStorage::new();
        let landlord = Uuid::new_v4();

        let mut tx = storage.begin(landlord).await.unwrap();
        tx.insert_asset_type(landlord, "Betoneira", Decimal::new(5000, 2)).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = storage.begin(landlord).await.unwrap();
        assert_eq!(tx.list_asset_types(landlord).await.unwrap().len(), 1);
        // Outro locador não enxerga nada
        assert!(tx.list_asset_types(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_come_back_in_fifo_order() {
        let storage = MemoryStorage::new();
        let landlord = Uuid::new_v4();
        let asset = Uuid::new_v4();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

        let mut tx = storage.begin(landlord).await.unwrap();
        let late = tx.insert_batch(landlord, &new_batch(asset, 5, day(20))).await.unwrap();
        let early = tx.insert_batch(landlord, &new_batch(asset, 5, day(10))).await.unwrap();
        let same_day = tx.insert_batch(landlord, &new_batch(asset, 5, day(10))).await.unwrap();

        let order: Vec<Uuid> = tx.list_batches(landlord, asset).await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(order, vec![early.id, same_day.id, late.id]);
    }

    #[tokio::test]
    async fn explicit_batch_locks_follow_fifo_order() {
        let storage = MemoryStorage::new();
        let landlord = Uuid::new_v4();
        let asset = Uuid::new_v4();
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();

        let mut tx = storage.begin(landlord).await.unwrap();
        let late = tx.insert_batch(landlord, &new_batch(asset, 5, day(20))).await.unwrap();
        let early = tx.insert_batch(landlord, &new_batch(asset, 5, day(10))).await.unwrap();
        tx.insert_batch(landlord, &new_batch(asset, 5, day(15))).await.unwrap();

        // Pedido em ordem LIFO, devolvido em FIFO e só com os lotes pedidos
        let locked = tx.lock_batches(landlord, &[late.id, early.id]).await.unwrap();
        let order: Vec<Uuid> = locked.iter().map(|b| b.id).collect();
        assert_eq!(order, vec![early.id, late.id]);
        assert!(tx.lock_batches(Uuid::new_v4(), &[late.id]).await.unwrap().is_empty());
    }
}
