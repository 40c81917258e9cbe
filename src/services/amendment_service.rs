// src/services/amendment_service.rs
//
// Máquina de estados dos aditivos: PENDING -> ACTIVE -> CANCELLED.
// A ativação grava cada alocação/liberação em `amendment_movements`;
// o cancelamento desfaz exatamente o que está nesse livro.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{RentalStore, Storage},
    models::{
        amendments::{
            Amendment, AmendmentEffect, AmendmentItem, AmendmentMovement, AmendmentStatus, AmendmentType,
            MovementKind, NewAmendment, NewMovement,
        },
        contracts::{rental_days_between, Contract, ContractItem, ContractStatus, MAX_QUANTITY},
    },
    services::{
        allocation::{self, BatchMovement},
        contract_service::{load_asset_type, lock_contract, refresh_contract_total},
    },
};

fn ensure_contract_active(contract: &Contract) -> Result<(), AppError> {
    if contract.status == ContractStatus::Active {
        Ok(())
    } else {
        Err(AppError::InvalidContractState {
            contract_code: contract.code.clone(),
            current: contract.status,
            reason: "aditivos só se aplicam a contratos ativos.".into(),
        })
    }
}

async fn lock_amendment<T>(tx: &mut T, contract_id: Uuid, amendment_id: Uuid) -> Result<Amendment, AppError>
where
    T: RentalStore + ?Sized,
{
    tx.lock_amendment(contract_id, amendment_id)
        .await?
        .ok_or_else(|| AppError::ResourceNotFound("Aditivo".into()))
}

// Grava no livro um lote de movimentos do motor
async fn log_movements<T>(
    tx: &mut T,
    item: &AmendmentItem,
    contract_item_id: Uuid,
    kind: MovementKind,
    is_reversal: bool,
    moves: &[BatchMovement],
) -> Result<(), AppError>
where
    T: RentalStore + ?Sized,
{
    for m in moves {
        tx.insert_movement(&NewMovement {
            amendment_id: item.amendment_id,
            amendment_item_id: item.id,
            contract_item_id,
            batch_id: m.batch_id,
            allocation_record_id: Some(m.allocation_record_id),
            kind,
            quantity: m.quantity,
            is_reversal,
        })
        .await?;
    }
    Ok(())
}

// Grava a nova quantidade do item, ou o apaga quando ela chega a zero.
// Devolve `true` se o item foi apagado.
async fn store_item_quantity<T>(tx: &mut T, item: &mut ContractItem, rental_days: i64) -> Result<bool, AppError>
where
    T: RentalStore + ?Sized,
{
    if item.quantity == 0 {
        tx.delete_contract_item(item.id).await?;
        return Ok(true);
    }
    item.recompute_total(rental_days)?;
    tx.update_contract_item(item).await?;
    Ok(false)
}

async fn recompute_item_totals<T>(tx: &mut T, contract_id: Uuid, rental_days: i64) -> Result<(), AppError>
where
    T: RentalStore + ?Sized,
{
    for mut item in tx.list_contract_items(contract_id).await? {
        item.recompute_total(rental_days)?;
        tx.update_contract_item(&item).await?;
    }
    Ok(())
}

// Soma ao item sem estourar o limite de quantidade
fn grown_quantity(current: i32, added: i32) -> Result<i32, AppError> {
    current
        .checked_add(added)
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or(AppError::InvalidQuantity(added))
}

#[derive(Clone)]
pub struct AmendmentService<S: Storage> {
    storage: S,
}

impl<S: Storage> AmendmentService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Registra o aditivo como PENDING. Nada muda no contrato até a ativação.
    pub async fn create_amendment(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment: NewAmendment,
    ) -> Result<Amendment, AppError> {
        amendment.validate_composition()?;

        let mut tx = self.storage.begin(landlord_id).await?;
        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_contract_active(&contract)?;

        if let Some(new_end) = amendment.new_end_date {
            if new_end < contract.start_date {
                return Err(AppError::InvalidInput(
                    "A nova data de término não pode ser anterior ao início do contrato.".into(),
                ));
            }
        }

        // Os tipos de ativo precisam existir para o locador
        for item in &amendment.items {
            load_asset_type(&mut tx, landlord_id, item.asset_type_id).await?;
        }

        let created = tx.insert_amendment(landlord_id, contract_id, &amendment).await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract_id,
            amendment_id = %created.id,
            amendment_type = ?created.amendment_type,
            "Aditivo registrado"
        );
        Ok(created)
    }

    pub async fn list_amendments(&self, landlord_id: Uuid, contract_id: Uuid) -> Result<Vec<Amendment>, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;
        lock_contract(&mut tx, landlord_id, contract_id).await?;
        let amendments = tx.list_amendments(contract_id).await?;
        tx.commit().await?;
        Ok(amendments)
    }

    // =========================================================================
    //  ATIVAÇÃO
    // =========================================================================

    /// Aplica todos os itens numa única transação. Qualquer falha desfaz tudo
    /// e o aditivo continua PENDING.
    pub async fn activate_amendment(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment_id: Uuid,
    ) -> Result<Amendment, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;

        // 1. Trava contrato e aditivo, nessa ordem
        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_contract_active(&contract)?;
        let amendment = lock_amendment(&mut tx, contract_id, amendment_id).await?;

        if !amendment.status.can_transition_to(AmendmentStatus::Active) {
            return Err(AppError::InvalidAmendmentState {
                amendment_id,
                current: amendment.status,
                action: "ativado",
            });
        }

        // 2. Efeitos
        match amendment.amendment_type {
            AmendmentType::Increase | AmendmentType::Reduction => {
                for mut item in amendment.items {
                    let effect = item.effect;
                    match effect {
                        AmendmentEffect::Increase { quantity } => {
                            Self::apply_increase(&mut tx, landlord_id, &contract, &mut item, quantity).await?
                        }
                        AmendmentEffect::Reduction { quantity } => {
                            Self::apply_reduction(&mut tx, landlord_id, &contract, &mut item, quantity).await?
                        }
                    }
                    tx.update_amendment_item(&item).await?;
                }
            }
            AmendmentType::TermChange => {
                let new_end = amendment.new_end_date.ok_or_else(|| {
                    AppError::InvalidAmendment("Aditivo de prazo sem a nova data de término.".into())
                })?;
                tx.set_amendment_previous_end_date(amendment_id, Some(contract.end_date)).await?;
                tx.set_contract_end_date(contract_id, new_end).await?;
                recompute_item_totals(&mut tx, contract_id, rental_days_between(contract.start_date, new_end)).await?;
            }
            // Só entram no total através do `value_delta`
            AmendmentType::ValueAdjustment | AmendmentType::Refund => {}
        }

        // 3. Estado e total
        tx.set_amendment_status(amendment_id, AmendmentStatus::Active, Utc::now()).await?;
        let total = refresh_contract_total(&mut tx, contract_id).await?;

        let activated = lock_amendment(&mut tx, contract_id, amendment_id).await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract_id,
            amendment_id = %amendment_id,
            total = %total,
            "Aditivo ativado"
        );
        Ok(activated)
    }

    async fn apply_increase(
        tx: &mut S::Tx,
        landlord_id: Uuid,
        contract: &Contract,
        item: &mut AmendmentItem,
        quantity: i32,
    ) -> Result<(), AppError> {
        let asset_type = load_asset_type(tx, landlord_id, item.asset_type_id).await?;

        // 1. Resolve o item do contrato: soma ao existente ou cria um novo
        let contract_item = match tx.find_contract_item_by_asset_type(contract.id, asset_type.id).await? {
            Some(mut existing) => {
                existing.quantity = grown_quantity(existing.quantity, quantity)?;
                existing.recompute_total(contract.rental_days())?;
                tx.update_contract_item(&existing).await?;
                existing
            }
            None => {
                let unit = item.unit_value.unwrap_or(asset_type.default_daily_value);
                let total = ContractItem::compute_total(quantity, unit, contract.rental_days())?;
                item.created_contract_item = true;
                item.unit_value = Some(unit);
                tx.insert_contract_item(contract.id, asset_type.id, quantity, unit, total).await?
            }
        };
        item.contract_item_id = Some(contract_item.id);

        // 2. Aloca o delta e registra no livro
        let moves = allocation::allocate(tx, landlord_id, &asset_type, contract_item.id, quantity).await?;
        log_movements(tx, item, contract_item.id, MovementKind::Allocated, false, &moves).await?;

        tracing::debug!(contract_item_id = %contract_item.id, quantity, "Acréscimo aplicado");
        Ok(())
    }

    async fn apply_reduction(
        tx: &mut S::Tx,
        landlord_id: Uuid,
        contract: &Contract,
        item: &mut AmendmentItem,
        quantity: i32,
    ) -> Result<(), AppError> {
        let asset_type = load_asset_type(tx, landlord_id, item.asset_type_id).await?;

        // 1. O tipo de ativo precisa estar no contrato com quantidade suficiente
        let mut contract_item = tx
            .find_contract_item_by_asset_type(contract.id, asset_type.id)
            .await?
            .ok_or_else(|| AppError::AssetTypeNotOnContract {
                asset_type_id: asset_type.id,
                asset_type_name: asset_type.name.clone(),
            })?;

        if quantity > contract_item.quantity {
            return Err(AppError::ReductionExceedsQuantity {
                asset_type_name: asset_type.name,
                requested: quantity,
                current_quantity: contract_item.quantity,
            });
        }

        // 2. Libera em LIFO e registra no livro
        let moves = allocation::release_lifo(tx, landlord_id, &asset_type, contract_item.id, quantity).await?;
        log_movements(tx, item, contract_item.id, MovementKind::Released, false, &moves).await?;

        // 3. Diária guardada para o caso do item sumir e o cancelamento recriá-lo
        item.unit_value = Some(contract_item.unit_daily_value);
        contract_item.quantity -= quantity;
        let removed = store_item_quantity(tx, &mut contract_item, contract.rental_days()).await?;

        item.removed_contract_item = removed;
        item.contract_item_id = if removed { None } else { Some(contract_item.id) };

        tracing::debug!(contract_item_id = %contract_item.id, quantity, removed, "Redução aplicada");
        Ok(())
    }

    // =========================================================================
    //  CANCELAMENTO
    // =========================================================================

    /// Desfaz os efeitos de um aditivo ativo, em ordem inversa à da ativação.
    pub async fn cancel_amendment(
        &self,
        landlord_id: Uuid,
        contract_id: Uuid,
        amendment_id: Uuid,
    ) -> Result<Amendment, AppError> {
        let mut tx = self.storage.begin(landlord_id).await?;

        let contract = lock_contract(&mut tx, landlord_id, contract_id).await?;
        ensure_contract_active(&contract)?;
        let amendment = lock_amendment(&mut tx, contract_id, amendment_id).await?;

        if !amendment.status.can_transition_to(AmendmentStatus::Cancelled) {
            return Err(AppError::InvalidAmendmentState {
                amendment_id,
                current: amendment.status,
                action: "cancelado",
            });
        }

        match amendment.amendment_type {
            AmendmentType::Increase | AmendmentType::Reduction => {
                let ledger: Vec<AmendmentMovement> = tx
                    .list_movements(amendment_id)
                    .await?
                    .into_iter()
                    .filter(|m| !m.is_reversal)
                    .collect();

                for mut item in amendment.items.into_iter().rev() {
                    let own: Vec<&AmendmentMovement> =
                        ledger.iter().filter(|m| m.amendment_item_id == item.id).collect();

                    let effect = item.effect;
                    match effect {
                        AmendmentEffect::Increase { quantity } => {
                            Self::revert_increase(&mut tx, landlord_id, &contract, &mut item, quantity, &own).await?
                        }
                        AmendmentEffect::Reduction { quantity } => {
                            Self::revert_reduction(&mut tx, landlord_id, &contract, &mut item, quantity, &own).await?
                        }
                    }
                    tx.update_amendment_item(&item).await?;
                }
            }
            AmendmentType::TermChange => {
                // Só o aditivo de prazo ativado por último pode ser desfeito
                let newer_active = tx.list_amendments(contract_id).await?.iter().any(|a| {
                    a.id != amendment_id
                        && a.amendment_type == AmendmentType::TermChange
                        && a.status == AmendmentStatus::Active
                        && a.activated_at > amendment.activated_at
                });
                let superseded = newer_active || amendment.new_end_date != Some(contract.end_date);
                if superseded {
                    return Err(AppError::InvalidAmendmentState {
                        amendment_id,
                        current: amendment.status,
                        action: "cancelado enquanto houver um aditivo de prazo mais recente ativo",
                    });
                }

                let previous = amendment.previous_end_date.ok_or_else(|| {
                    AppError::InternalServerError(anyhow::anyhow!(
                        "aditivo de prazo {amendment_id} ativo sem data anterior registrada"
                    ))
                })?;
                tx.set_contract_end_date(contract_id, previous).await?;
                recompute_item_totals(&mut tx, contract_id, rental_days_between(contract.start_date, previous)).await?;
            }
            AmendmentType::ValueAdjustment | AmendmentType::Refund => {}
        }

        tx.set_amendment_status(amendment_id, AmendmentStatus::Cancelled, Utc::now()).await?;
        let total = refresh_contract_total(&mut tx, contract_id).await?;

        let cancelled = lock_amendment(&mut tx, contract_id, amendment_id).await?;
        tx.commit().await?;

        tracing::info!(
            contract_id = %contract_id,
            amendment_id = %amendment_id,
            total = %total,
            "Aditivo cancelado"
        );
        Ok(cancelled)
    }

    async fn revert_increase(
        tx: &mut S::Tx,
        landlord_id: Uuid,
        contract: &Contract,
        item: &mut AmendmentItem,
        quantity: i32,
        ledger: &[&AmendmentMovement],
    ) -> Result<(), AppError> {
        let asset_type = load_asset_type(tx, landlord_id, item.asset_type_id).await?;

        // 1. O item precisa ainda ter as unidades que o acréscimo colocou
        let current = tx.find_contract_item_by_asset_type(contract.id, asset_type.id).await?;
        let current_quantity = current.as_ref().map_or(0, |c| c.quantity);
        let mut contract_item = match current {
            Some(c) if c.quantity >= quantity => c,
            _ => {
                return Err(AppError::ReductionExceedsQuantity {
                    asset_type_name: asset_type.name,
                    requested: quantity,
                    current_quantity,
                })
            }
        };

        // 2. Libera dos registros exatos que a ativação criou, mais novos primeiro.
        // Os lotes do livro e do item são travados antes, em ordem FIFO.
        let mut touched: Vec<Uuid> = ledger.iter().map(|m| m.batch_id).collect();
        touched.extend(tx.list_allocations(contract_item.id).await?.iter().map(|r| r.batch_id));
        allocation::lock_batches_fifo(tx, landlord_id, touched).await?;

        let mut remaining = quantity;
        for m in ledger.iter().rev().filter(|m| m.kind == MovementKind::Allocated) {
            if remaining == 0 {
                break;
            }
            let Some(record_id) = m.allocation_record_id else { continue };
            let wanted = m.quantity.min(remaining);
            if let Some(released) =
                allocation::release_from_record(tx, landlord_id, contract_item.id, record_id, wanted).await?
            {
                log_movements(tx, item, contract_item.id, MovementKind::Released, true, &[released]).await?;
                remaining -= released.quantity;
            }
        }

        // 3. O que os registros já não tinham sai em LIFO
        if remaining > 0 {
            tracing::warn!(
                amendment_id = %item.amendment_id,
                remaining,
                "Registros do acréscimo foram alterados; liberando o restante em LIFO"
            );
            let moves = allocation::release_lifo(tx, landlord_id, &asset_type, contract_item.id, remaining).await?;
            log_movements(tx, item, contract_item.id, MovementKind::Released, true, &moves).await?;
        }

        // 4. Quantidade de volta; item criado pelo acréscimo some ao chegar a zero
        contract_item.quantity -= quantity;
        if contract_item.quantity == 0 {
            allocation::release_all(tx, landlord_id, contract_item.id).await?;
        }
        let removed = store_item_quantity(tx, &mut contract_item, contract.rental_days()).await?;
        item.contract_item_id = if removed { None } else { Some(contract_item.id) };
        Ok(())
    }

    async fn revert_reduction(
        tx: &mut S::Tx,
        landlord_id: Uuid,
        contract: &Contract,
        item: &mut AmendmentItem,
        quantity: i32,
        ledger: &[&AmendmentMovement],
    ) -> Result<(), AppError> {
        let asset_type = load_asset_type(tx, landlord_id, item.asset_type_id).await?;

        // 1. Restaura a quantidade (recriando o item se a redução o apagou)
        let contract_item = match tx.find_contract_item_by_asset_type(contract.id, asset_type.id).await? {
            Some(mut existing) => {
                existing.quantity = grown_quantity(existing.quantity, quantity)?;
                existing.recompute_total(contract.rental_days())?;
                tx.update_contract_item(&existing).await?;
                existing
            }
            None => {
                let unit = item.unit_value.unwrap_or(asset_type.default_daily_value);
                let total = ContractItem::compute_total(quantity, unit, contract.rental_days())?;
                tx.insert_contract_item(contract.id, asset_type.id, quantity, unit, total).await?
            }
        };
        item.contract_item_id = Some(contract_item.id);
        item.removed_contract_item = false;

        // 2. Realoca dos mesmos lotes de onde a redução liberou.
        // Todos os lotes do tipo ficam travados antes, em ordem FIFO.
        let all_batches = tx.list_batches(landlord_id, asset_type.id).await?.iter().map(|b| b.id).collect();
        allocation::lock_batches_fifo(tx, landlord_id, all_batches).await?;

        let mut remaining = quantity;
        for m in ledger.iter().rev().filter(|m| m.kind == MovementKind::Released) {
            if remaining == 0 {
                break;
            }
            let wanted = m.quantity.min(remaining);
            if let Some(taken) =
                allocation::allocate_from_batch(tx, landlord_id, m.batch_id, contract_item.id, wanted).await?
            {
                log_movements(tx, item, contract_item.id, MovementKind::Allocated, true, &[taken]).await?;
                remaining -= taken.quantity;
            }
        }

        // 3. Se outro contrato ocupou esses lotes, completa em FIFO
        if remaining > 0 {
            tracing::warn!(
                amendment_id = %item.amendment_id,
                remaining,
                "Lotes originais sem saldo; completando a realocação em FIFO"
            );
            let moves = allocation::allocate(tx, landlord_id, &asset_type, contract_item.id, remaining).await?;
            log_movements(tx, item, contract_item.id, MovementKind::Allocated, true, &moves).await?;
        }

        Ok(())
    }
}
