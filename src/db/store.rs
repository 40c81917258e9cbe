// src/db/store.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        amendments::{Amendment, AmendmentItem, AmendmentMovement, AmendmentStatus, NewAmendment, NewMovement},
        contracts::{Contract, ContractItem, ContractStatus, NewContract},
        inventory::{AllocationRecord, AssetType, Batch, NewBatch},
    },
};

/// Fonte de transações. Cada operação de serviço abre exatamente uma.
#[async_trait]
pub trait Storage: Clone + Send + Sync + 'static {
    type Tx: RentalStore + 'static;

    /// Abre uma transação no escopo do locador.
    async fn begin(&self, landlord_id: Uuid) -> Result<Self::Tx, AppError>;
}

/// Uma transação aberta. Tudo o que for feito aqui some se `commit` não for chamado.
///
/// Os métodos `lock_*` bloqueiam as linhas lidas até o fim da transação
/// (`SELECT ... FOR UPDATE` no Postgres).
#[async_trait]
pub trait RentalStore: Send {
    // =========================================================================
    //  TIPOS DE ATIVO
    // =========================================================================

    async fn insert_asset_type(
        &mut self,
        landlord_id: Uuid,
        name: &str,
        default_daily_value: Decimal,
    ) -> Result<AssetType, AppError>;

    async fn get_asset_type(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Option<AssetType>, AppError>;

    async fn list_asset_types(&mut self, landlord_id: Uuid) -> Result<Vec<AssetType>, AppError>;

    // =========================================================================
    //  LOTES
    // =========================================================================

    async fn insert_batch(&mut self, landlord_id: Uuid, batch: &NewBatch) -> Result<Batch, AppError>;

    /// Em ordem FIFO: data de aquisição e depois sequência.
    async fn list_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError>;

    async fn lock_batch(&mut self, landlord_id: Uuid, batch_id: Uuid) -> Result<Option<Batch>, AppError>;

    /// Bloqueia os lotes informados na mesma ordem FIFO de `lock_available_batches`.
    async fn lock_batches(&mut self, landlord_id: Uuid, batch_ids: &[Uuid]) -> Result<Vec<Batch>, AppError>;

    /// Lotes com saldo (> 0), em ordem FIFO, bloqueados.
    async fn lock_available_batches(&mut self, landlord_id: Uuid, asset_type_id: Uuid) -> Result<Vec<Batch>, AppError>;

    async fn set_batch_available(&mut self, batch_id: Uuid, available_quantity: i32) -> Result<(), AppError>;

    async fn count_batch_allocations(&mut self, batch_id: Uuid) -> Result<i64, AppError>;

    async fn delete_batch(&mut self, batch_id: Uuid) -> Result<(), AppError>;

    // =========================================================================
    //  ALOCAÇÕES
    // =========================================================================

    async fn insert_allocation(
        &mut self,
        contract_item_id: Uuid,
        batch_id: Uuid,
        allocated_quantity: i32,
    ) -> Result<AllocationRecord, AppError>;

    /// Alocações do item em ordem de criação (sequência crescente), bloqueadas.
    async fn list_allocations(&mut self, contract_item_id: Uuid) -> Result<Vec<AllocationRecord>, AppError>;

    async fn get_allocation(&mut self, allocation_id: Uuid) -> Result<Option<AllocationRecord>, AppError>;

    async fn set_allocation_quantity(&mut self, allocation_id: Uuid, allocated_quantity: i32) -> Result<(), AppError>;

    async fn delete_allocation(&mut self, allocation_id: Uuid) -> Result<(), AppError>;

    // =========================================================================
    //  CONTRATOS E ITENS
    // =========================================================================

    async fn insert_contract(&mut self, landlord_id: Uuid, contract: &NewContract, code: &str) -> Result<Contract, AppError>;

    async fn lock_contract(&mut self, landlord_id: Uuid, contract_id: Uuid) -> Result<Option<Contract>, AppError>;

    async fn set_contract_status(&mut self, contract_id: Uuid, status: ContractStatus) -> Result<(), AppError>;

    async fn set_contract_end_date(&mut self, contract_id: Uuid, end_date: NaiveDate) -> Result<(), AppError>;

    async fn set_contract_total(&mut self, contract_id: Uuid, total_value: Decimal) -> Result<(), AppError>;

    async fn insert_contract_item(
        &mut self,
        contract_id: Uuid,
        asset_type_id: Uuid,
        quantity: i32,
        unit_daily_value: Decimal,
        total_item_value: Decimal,
    ) -> Result<ContractItem, AppError>;

    async fn get_contract_item(&mut self, contract_id: Uuid, item_id: Uuid) -> Result<Option<ContractItem>, AppError>;

    async fn find_contract_item_by_asset_type(
        &mut self,
        contract_id: Uuid,
        asset_type_id: Uuid,
    ) -> Result<Option<ContractItem>, AppError>;

    async fn list_contract_items(&mut self, contract_id: Uuid) -> Result<Vec<ContractItem>, AppError>;

    /// Grava quantidade, diária e total do item.
    async fn update_contract_item(&mut self, item: &ContractItem) -> Result<(), AppError>;

    async fn delete_contract_item(&mut self, item_id: Uuid) -> Result<(), AppError>;

    // =========================================================================
    //  ADITIVOS
    // =========================================================================

    async fn insert_amendment(
        &mut self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment: &NewAmendment,
    ) -> Result<Amendment, AppError>;

    /// Aditivo com os seus itens (em ordem de posição), bloqueado.
    async fn lock_amendment(&mut self, contract_id: Uuid, amendment_id: Uuid) -> Result<Option<Amendment>, AppError>;

    async fn list_amendments(&mut self, contract_id: Uuid) -> Result<Vec<Amendment>, AppError>;

    /// Muda o status e carimba `activated_at` / `cancelled_at` conforme o destino.
    async fn set_amendment_status(
        &mut self,
        amendment_id: Uuid,
        status: AmendmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn set_amendment_previous_end_date(
        &mut self,
        amendment_id: Uuid,
        previous_end_date: Option<NaiveDate>,
    ) -> Result<(), AppError>;

    /// Grava a resolução do item (item do contrato, criado/removido, diária).
    async fn update_amendment_item(&mut self, item: &AmendmentItem) -> Result<(), AppError>;

    async fn insert_movement(&mut self, movement: &NewMovement) -> Result<AmendmentMovement, AppError>;

    /// Movimentos do aditivo em ordem de sequência.
    async fn list_movements(&mut self, amendment_id: Uuid) -> Result<Vec<AmendmentMovement>, AppError>;

    async fn commit(self) -> Result<(), AppError>;
}
