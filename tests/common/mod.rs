// tests/common/mod.rs
#![allow(dead_code)]

use chrono::NaiveDate;
use locacao::{
    db::MemoryStorage,
    models::{
        contracts::{Contract, ContractItemDetail, NewContract, NewContractItem},
        inventory::{AssetType, Batch, NewBatch},
    },
    services::{AmendmentService, ContractService, InventoryService},
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub struct Harness {
    pub landlord: Uuid,
    pub inventory: InventoryService<MemoryStorage>,
    pub contracts: ContractService<MemoryStorage>,
    pub amendments: AmendmentService<MemoryStorage>,
}

pub fn setup() -> Harness {
    let storage = MemoryStorage::new();
    Harness {
        landlord: Uuid::new_v4(),
        inventory: InventoryService::new(storage.clone()),
        contracts: ContractService::new(storage.clone()),
        amendments: AmendmentService::new(storage),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

impl Harness {
    pub async fn asset_type(&self, name: &str, daily: i64) -> AssetType {
        self.inventory
            .create_asset_type(self.landlord, name, Decimal::new(daily, 0))
            .await
            .unwrap()
    }

    pub async fn batch(&self, asset_type: &AssetType, total: i32, acquired_at: NaiveDate) -> Batch {
        self.inventory
            .create_batch(
                self.landlord,
                NewBatch {
                    asset_type_id: asset_type.id,
                    batch_number: None,
                    total_quantity: total,
                    unit_cost: None,
                    acquired_at,
                    notes: None,
                },
            )
            .await
            .unwrap()
    }

    /// Contrato de 1 a 31 de março (30 diárias), ainda em rascunho.
    pub async fn draft_contract(&self) -> Contract {
        self.contracts
            .create_contract(
                self.landlord,
                NewContract {
                    lessee_id: Uuid::new_v4(),
                    code: None,
                    start_date: date(2024, 3, 1),
                    end_date: date(2024, 3, 31),
                },
            )
            .await
            .unwrap()
    }

    pub async fn add_item(&self, contract: &Contract, asset_type: &AssetType, quantity: i32) -> ContractItemDetail {
        self.contracts
            .add_item(
                self.landlord,
                contract.id,
                NewContractItem { asset_type_id: asset_type.id, quantity, unit_daily_value: None },
            )
            .await
            .unwrap()
    }

    /// Contrato ativo com um item do tipo dado.
    pub async fn active_contract_with(&self, asset_type: &AssetType, quantity: i32) -> Contract {
        let contract = self.draft_contract().await;
        self.add_item(&contract, asset_type, quantity).await;
        self.contracts.activate_contract(self.landlord, contract.id).await.unwrap()
    }

    pub async fn available(&self, asset_type: &AssetType) -> i64 {
        self.inventory
            .availability(self.landlord, asset_type.id)
            .await
            .unwrap()
            .available_quantity
    }

    /// (quantidade do item, unidades alocadas) do tipo de ativo no contrato.
    pub async fn item_state(&self, contract: &Contract, asset_type: &AssetType) -> Option<(i32, i32)> {
        let detail = self.contracts.get_contract(self.landlord, contract.id).await.unwrap();
        detail
            .items
            .iter()
            .find(|i| i.item.asset_type_id == asset_type.id)
            .map(|i| (i.item.quantity, i.allocated_quantity))
    }
}
