// tests/contract_items.rs
mod common;

use common::{date, setup};
use locacao::{
    common::error::AppError,
    models::contracts::{ContractItemChanges, ContractStatus, NewContractItem},
};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_adding_item_allocates_fifo_and_totals_contract() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    let old = h.batch(&andaime, 5, date(2024, 1, 1)).await;
    let new = h.batch(&andaime, 5, date(2024, 2, 1)).await;
    let contract = h.draft_contract().await;

    let item = h.add_item(&contract, &andaime, 7).await;

    assert_eq!(item.allocated_quantity, 7);
    assert_eq!(item.allocations[0].batch_id, old.id);
    assert_eq!(item.allocations[0].allocated_quantity, 5);
    assert_eq!(item.allocations[1].batch_id, new.id);
    assert_eq!(item.allocations[1].allocated_quantity, 2);
    // 7 unidades x R$ 10 x 30 diárias
    assert_eq!(item.item.total_item_value, Decimal::new(2100, 0));

    let detail = h.contracts.get_contract(h.landlord, contract.id).await.unwrap();
    assert_eq!(detail.header.total_value, Decimal::new(2100, 0));
    assert_eq!(h.available(&andaime).await, 3);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_nothing_behind() {
    let h = setup();
    let betoneira = h.asset_type("Betoneira", 50).await;
    h.batch(&betoneira, 3, date(2024, 1, 1)).await;
    let contract = h.draft_contract().await;

    let err = h
        .contracts
        .add_item(
            h.landlord,
            contract.id,
            NewContractItem { asset_type_id: betoneira.id, quantity: 4, unit_daily_value: None },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::QuantityUnavailable { requested: 4, available: 3, .. }));
    assert_eq!(h.available(&betoneira).await, 3);
    assert!(h.item_state(&contract, &betoneira).await.is_none());
}

#[tokio::test]
async fn test_same_asset_type_twice_is_rejected() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    h.batch(&andaime, 10, date(2024, 1, 1)).await;
    let contract = h.draft_contract().await;
    h.add_item(&contract, &andaime, 2).await;

    let err = h
        .contracts
        .add_item(
            h.landlord,
            contract.id,
            NewContractItem { asset_type_id: andaime.id, quantity: 1, unit_daily_value: None },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DuplicateContractItem { .. }));
    assert_eq!(h.available(&andaime).await, 8);
}

#[tokio::test]
async fn test_update_quantity_up_and_down() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    let first = h.batch(&andaime, 5, date(2024, 1, 1)).await;
    let second = h.batch(&andaime, 5, date(2024, 1, 2)).await;
    let contract = h.draft_contract().await;
    let item = h.add_item(&contract, &andaime, 4).await;

    let grown = h
        .contracts
        .update_item(
            h.landlord,
            contract.id,
            item.item.id,
            ContractItemChanges { quantity: Some(8), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(grown.allocated_quantity, 8);
    assert_eq!(h.available(&andaime).await, 2);

    // Redução libera do registro mais novo (lote 2) primeiro
    let shrunk = h
        .contracts
        .update_item(
            h.landlord,
            contract.id,
            item.item.id,
            ContractItemChanges { quantity: Some(3), unit_daily_value: Some(Decimal::new(12, 0)) },
        )
        .await
        .unwrap();
    assert_eq!(shrunk.allocated_quantity, 3);
    let left: Vec<_> = shrunk.allocations.iter().map(|r| (r.batch_id, r.allocated_quantity)).collect();
    assert_eq!(left, vec![(first.id, 3)]);
    let batches = h.inventory.list_batches(h.landlord, andaime.id).await.unwrap();
    assert_eq!(batches.iter().find(|b| b.id == second.id).unwrap().available_quantity, 5);
    assert_eq!(shrunk.item.total_item_value, Decimal::new(3 * 12 * 30, 0));
    assert_eq!(h.available(&andaime).await, 7);
}

#[tokio::test]
async fn test_remove_item_releases_its_allocations() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    h.batch(&andaime, 10, date(2024, 1, 1)).await;
    let contract = h.draft_contract().await;
    let item = h.add_item(&contract, &andaime, 6).await;

    h.contracts.remove_item(h.landlord, contract.id, item.item.id).await.unwrap();

    assert_eq!(h.available(&andaime).await, 10);
    let detail = h.contracts.get_contract(h.landlord, contract.id).await.unwrap();
    assert!(detail.items.is_empty());
    assert_eq!(detail.header.total_value, Decimal::ZERO);
}

#[tokio::test]
async fn test_active_contract_items_are_immutable() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    h.batch(&andaime, 10, date(2024, 1, 1)).await;
    let contract = h.active_contract_with(&andaime, 4).await;
    let detail = h.contracts.get_contract(h.landlord, contract.id).await.unwrap();
    let item_id = detail.items[0].item.id;

    let add = h
        .contracts
        .add_item(
            h.landlord,
            contract.id,
            NewContractItem { asset_type_id: andaime.id, quantity: 1, unit_daily_value: None },
        )
        .await
        .unwrap_err();
    let update = h
        .contracts
        .update_item(h.landlord, contract.id, item_id, ContractItemChanges { quantity: Some(5), ..Default::default() })
        .await
        .unwrap_err();
    let remove = h.contracts.remove_item(h.landlord, contract.id, item_id).await.unwrap_err();

    for err in [add, update, remove] {
        match err {
            AppError::ImmutableActiveContract { contract_code, status } => {
                assert_eq!(contract_code, contract.code);
                assert_eq!(status, ContractStatus::Active);
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }
    assert_eq!(h.available(&andaime).await, 6);
}

#[tokio::test]
async fn test_contract_lifecycle_returns_stock() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    h.batch(&andaime, 10, date(2024, 1, 1)).await;

    let empty = h.draft_contract().await;
    let err = h.contracts.activate_contract(h.landlord, empty.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidContractState { .. }));

    let contract = h.active_contract_with(&andaime, 6).await;
    assert_eq!(contract.status, ContractStatus::Active);
    assert_eq!(h.available(&andaime).await, 4);

    let finished = h.contracts.finish_contract(h.landlord, contract.id).await.unwrap();
    assert_eq!(finished.status, ContractStatus::Finished);
    assert_eq!(h.available(&andaime).await, 10);

    let err = h.contracts.cancel_contract(h.landlord, contract.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidContractState { .. }));
}

#[tokio::test]
async fn test_allocated_batch_cannot_be_deleted() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    let batch = h.batch(&andaime, 10, date(2024, 1, 1)).await;
    let contract = h.draft_contract().await;
    h.add_item(&contract, &andaime, 1).await;

    let err = h.inventory.delete_batch(h.landlord, batch.id).await.unwrap_err();
    assert!(matches!(err, AppError::BatchInUse { allocations: 1, .. }));

    h.contracts.cancel_contract(h.landlord, contract.id).await.unwrap();
    h.inventory.delete_batch(h.landlord, batch.id).await.unwrap();
    assert!(h.inventory.list_batches(h.landlord, andaime.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_landlords_do_not_see_each_other() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    let contract = h.draft_contract().await;
    let stranger = uuid::Uuid::new_v4();

    let err = h.contracts.get_contract(stranger, contract.id).await.unwrap_err();
    assert!(matches!(err, AppError::ResourceNotFound(_)));
    let err = h.inventory.availability(stranger, andaime.id).await.unwrap_err();
    assert!(matches!(err, AppError::ResourceNotFound(_)));
}

#[tokio::test]
async fn test_daily_value_that_overflows_the_total_is_rejected() {
    let h = setup();
    let andaime = h.asset_type("Andaime", 10).await;
    h.batch(&andaime, 10, date(2024, 1, 1)).await;
    let contract = h.draft_contract().await;

    let err = h
        .contracts
        .add_item(
            h.landlord,
            contract.id,
            NewContractItem { asset_type_id: andaime.id, quantity: 1, unit_daily_value: Some(Decimal::MAX) },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(h.item_state(&contract, &andaime).await.is_none());

    // Diária válida, mas o total de 30 diárias não cabe
    let item = h.add_item(&contract, &andaime, 2).await;
    let err = h
        .contracts
        .update_item(
            h.landlord,
            contract.id,
            item.item.id,
            ContractItemChanges { unit_daily_value: Some(Decimal::new(99_999_999_999_999, 2)), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let detail = h.contracts.get_contract(h.landlord, contract.id).await.unwrap();
    assert_eq!(detail.items[0].item.unit_daily_value, Decimal::new(10, 0));
    assert_eq!(detail.header.total_value, Decimal::new(600, 0));
    assert_eq!(h.available(&andaime).await, 8);
}
