// src/services/contract_service.rs

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RentalStore, Storage},
    models::{
        amendments::AmendmentStatus,
        contracts::{
            ensure_money, generate_contract_code, Contract, ContractDetail, ContractItem, ContractItemChanges,
            ContractItemDetail, ContractStatus, NewContract, NewContractItem, MAX_MONEY, MAX_QUANTITY,
        },
        inventory::AssetType,
    },
    services::allocation,
};

// =============================================================================
//  Helpers compartilhados com o motor de aditivos
// =============================================================================

pub(crate) async fn lock_contract<T>(tx: &mut T, landlord_id: Uuid, contract_id: Uuid) -> Result<Contract, AppError>
where
    T: RentalStore + ?Sized,
{
    tx.lock_contract(landlord_id, contract_id)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Contrato".into()))
}

pub(crate) async fn load_asset_type<T>(tx: &mut T, landlord_id: Uuid, asset_type_id: Uuid) -> Result<AssetType, AppError>
where
    T: RentalStore + ?Sized,
{
    tx.get_asset_type(landlord_id, asset_type_id)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Tipo de ativo".into()))
}

/// Valor do contrato = soma dos itens + deltas de valor dos aditivos ativos.
pub(crate) async fn refresh_contract_total<T>(tx: &mut T, contract_id: Uuid) -> Result<Decimal, AppError>
where
    T: RentalStore + ?Sized,
{
    let items_total: Decimal = tx
        .list_contract_items(contract_id)
        .await?
        .iter()
        .map(|i| i.total_item_value)
        .sum();

    let amendments_total: Decimal = tx
        .list_amendments(contract_id)
        .await?
        .iter()
        .filter(|a| a.status == AmendmentStatus::Active)
        .filter_map(|a| a.value_delta)
        .sum();

    let total = items_total + amendments_total;
    if total.abs() > MAX_MONEY {
        return Err(AppError::InvalidInput(format!(
            "O valor total do contrato ({total}) excede o limite de {MAX_MONEY}."
        )));
    }
    tx.set_contract_total(contract_id, total).await?;
    Ok(total)
}

pub(crate) async fn item_detail<T>(tx: &mut T, item: ContractItem) -> Result<ContractItemDetail, AppError>
where
    T: RentalStore + ?Sized,
{
    let allocations = tx.list_allocations(item.id).await?;
    let allocated_quantity = allocations.iter().map(|r| r.allocated_quantity).sum();
    Ok(ContractItemDetail { item, allocated_quantity, allocations })
}

fn ensure_editable(contract: &Contract) -> Result<(), AppError> {
    if contract.is_editable() {
        Ok(())
    } else {
        Err(AppError::ImmutableActiveContract {
            contract_code: contract.code.clone(),
            status: contract.status,
        })
    }
}

// =============================================================================
//  Serviço
// =============================================================================

#[derive(Clone)]
pub struct ContractService<S: Storage> {
    storage: S,
}

impl<S: Storage> ContractService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    // --- CONTRATO ---

    pub async fn create_contract(&self, landlord_id: Uuid, contract: NewContract) -> Result<Contract, AppError> {
        if contract.end_date < contract.start_date {
            return Err(AppError::InvalidInput(
                "A data de término não pode ser anterior à data de início.".into(),
            ));
        }

        let code = match contract.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_string(),
            _ => generate_contract_code(Uuid::new_v4(), Utc::now().date_naive()),
        };

        let mut tx = self.storage.begin(landlord_id).await?;
        let created = tx.insert_contract(landlord_id, &contract, &code).await?;
        tx.commit().await?;

        tracing::info!(landlord_id = %landlord_id, contract_id = %created.id, code = %created.code, "Contrato criado");
        Ok(created)
    }

    pub async fn get_contract(&self, landlord_id: Uuid, contract_id: Uuid) -> Result<ContractDetail, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        let header = lock_contract(&mut tx, landlord_id, contract_id).await?;

        let mut items = Vec::new();
        for item in tx.list_contract_items(contract_id).await? {
            items.push(item_detail(&mut tx, item).await?);
        }
        let amendments = tx.list_amendments(contract_id).await?;
        tx.commit().await?;

        Ok(ContractDetail { header, items, amendments })
    }

    /// Rascunho -> ativo. Exige itens, todos totalmente alocados.
    pub async fn activate_contract(&self, landlord_id: Uuid, contract_id: Uuid) -> Result<Contract, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;

        if contract.status != ContractStatus::Draft {
            return Err(AppError::InvalidContractState {
                contract_code: contract.code,
                current: contract.status,
                reason: "só contratos em rascunho podem ser ativados.".into(),
            });
        }

        let items = tx.list_contract_items(contract_id).await?;
        if items.is_empty() {
            return Err(AppError::InvalidContractState {
                contract_code: contract.code,
                current: contract.status,
                reason: "o contrato não possui itens.".into(),
            });
        }

        for item in items {
            let detail = item_detail(&mut tx, item).await?;
            if detail.allocated_quantity != detail.item.quantity {
                return Err(AppError::InvalidContractState {
                    contract_code: contract.code,
                    current: contract.status,
                    reason: format!(
                        "o item {} tem {} de {} unidade(s) alocadas.",
                        detail.item.id, detail.allocated_quantity, detail.item.quantity
                    ),
                });
            }
        }

        tx.set_contract_status(contract_id, ContractStatus::Active).await?;
        let activated = lock_contract(&mut tx, landlord_id, contract_id).await?;
        tx.commit().await?;

        tracing::info!(contract_id = %contract_id, code = %activated.code, "Contrato ativado");
        Ok(activated)
    }

    pub async fn cancel_contract(&self, landlord_id: Uuid, contract_id: Uuid) -> Result<Contract, AppError> {
        self.close_contract(landlord_id, contract_id, ContractStatus::Cancelled).await
    }

    pub async fn finish_contract(&self, landlord_id: Uuid, contract_id: Uuid) -> Result<Contract, AppError> {
        self.close_contract(landlord_id, contract_id, ContractStatus::Finished).await
    }

    // Encerra o contrato devolvendo todo o estoque alocado
    async fn close_contract(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        target: ContractStatus,
    ) -> Result<Contract, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;

        let allowed = match target {
            ContractStatus::Cancelled => matches!(contract.status, ContractStatus::Draft | ContractStatus::Active),
            ContractStatus::Finished => contract.status == ContractStatus::Active,
            ContractStatus::Draft | ContractStatus::Active => false,
        };
        if !allowed {
            return Err(AppError::InvalidContractState {
                contract_code: contract.code,
                current: contract.status,
                reason: format!("não pode passar para {target:?}."),
            });
        }

        let mut released = 0;
        for item in tx.list_contract_items(contract_id).await? {
            let moves = allocation::release_all(&mut tx, landlord_id, item.id).await?;
            released += moves.iter().map(|m| m.quantity).sum::<i32>();
        }

        tx.set_contract_status(contract_id, target).await?;
        let closed = lock_contract(&mut tx, landlord_id, contract_id).await?;
        tx.commit().await?;

        tracing::info!(contract_id = %contract_id, status = ?target, released, "Contrato encerrado");
        Ok(closed)
    }

    // --- ITENS ---

    /// Adiciona um item ao rascunho e aloca a quantidade em FIFO.
    pub async fn add_item(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        new_item: NewContractItem,
    ) -> Result<ContractItemDetail, AppError> {
        if new_item.quantity <= 0 || new_item.quantity > MAX_QUANTITY {
            return Err(AppError::InvalidQuantity(new_item.quantity));
        }
        if let Some(value) = new_item.unit_daily_value {
            ensure_money(value, "Diária")?;
        }

        let mut tx = self.storage.begin(landlord_id).await?;

        // 1. Contrato editável
        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_editable(&contract)?;

        // 2. Tipo de ativo, no máximo um item por tipo
        let asset_type = load_asset_type(&mut tx, landlord_id, new_item.asset_type_id).await?;
        if tx.find_contract_item_by_asset_type(contract_id, asset_type.id).await?.is_some() {
            return Err(AppError::DuplicateContractItem { asset_type_name: asset_type.name });
        }

        // 3. Grava o item com o total calculado
        let unit_daily_value = new_item.unit_daily_value.unwrap_or(asset_type.default_daily_value);
        let total = ContractItem::compute_total(new_item.quantity, unit_daily_value, contract.rental_days())?;
        let item = tx
            .insert_contract_item(contract_id, asset_type.id, new_item.quantity, unit_daily_value, total)
            .await?;

        // 4. Aloca (tudo ou nada) e atualiza o total do contrato
        allocation::allocate(&mut tx, landlord_id, &asset_type, item.id, item.quantity).await?;
        refresh_contract_total(&mut tx, contract_id).await?;

        let detail = item_detail(&mut tx, item).await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract_id,
            item_id = %detail.item.id,
            quantity = detail.item.quantity,
            "Item adicionado ao contrato"
        );
        Ok(detail)
    }

    /// Atualização parcial. Aumento aloca a diferença; redução libera em LIFO.
    pub async fn update_item(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        item_id: Uuid,
        changes: ContractItemChanges,
    ) -> Result<ContractItemDetail, AppError> {
        if let Some(q) = changes.quantity.filter(|q| *q <= 0 || *q > MAX_QUANTITY) {
            return Err(AppError::InvalidQuantity(q));
        }
        if let Some(value) = changes.unit_daily_value {
            ensure_money(value, "Diária")?;
        }

        let mut tx = self.storage.begin(landlord_id).await?;

        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_editable(&contract)?;

        let mut item = tx
            .get_contract_item(contract_id, item_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Item do contrato".into()))?;
        let asset_type = load_asset_type(&mut tx, landlord_id, item.asset_type_id).await?;

        // Quantidade: o motor acompanha a diferença
        let new_quantity = changes.quantity.unwrap_or(item.quantity);
        let delta = new_quantity - item.quantity;
        if delta > 0 {
            allocation::allocate(&mut tx, landlord_id, &asset_type, item.id, delta).await?;
        } else if delta < 0 {
            allocation::release_lifo(&mut tx, landlord_id, &asset_type, item.id, -delta).await?;
        }

        item.quantity = new_quantity;
        if let Some(value) = changes.unit_daily_value {
            item.unit_daily_value = value;
        }
        item.recompute_total(contract.rental_days())?;
        tx.update_contract_item(&item).await?;
        refresh_contract_total(&mut tx, contract_id).await?;

        let detail = item_detail(&mut tx, item).await?;
        tx.commit().await?;

        tracing::info!(contract_id = %contract_id, item_id = %item_id, delta, "Item do contrato atualizado");
        Ok(detail)
    }

    /// Remove o item devolvendo antes todas as suas alocações.
    pub async fn remove_item(&self, landlord_id: Uuid, contract_id: Uuid, item_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;

        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_editable(&contract)?;

        let item = tx
            .get_contract_item(contract_id, item_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Item do contrato".into()))?;

        allocation::release_all(&mut tx, landlord_id, item.id).await?;
        tx.delete_contract_item(item.id).await?;
        refresh_contract_total(&mut tx, contract_id).await?;
        tx.commit().await?;

        tracing::info!(contract_id = %contract_id, item_id = %item_id, "Item removido do contrato");
        Ok(())
    }
}
