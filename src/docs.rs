// src/docs.rs

use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,

        // --- ESTOQUE ---
        handlers::inventory::create_asset_type,
        handlers::inventory::list_asset_types,
        handlers::inventory::get_availability,
        handlers::inventory::list_batches,
        handlers::inventory::create_batch,
        handlers::inventory::delete_batch,

        // --- CONTRATOS ---
        handlers::contracts::create_contract,
        handlers::contracts::get_contract,
        handlers::contracts::activate_contract,
        handlers::contracts::cancel_contract,
        handlers::contracts::finish_contract,
        handlers::contracts::add_item,
        handlers::contracts::update_item,
        handlers::contracts::remove_item,

        // --- ADITIVOS ---
        handlers::amendments::create_amendment,
        handlers::amendments::list_amendments,
        handlers::amendments::activate_amendment,
        handlers::amendments::cancel_amendment,
    ),
    components(
        schemas(
            // --- Estoque ---
            models::inventory::AssetType,
            models::inventory::Batch,
            models::inventory::AllocationRecord,
            models::inventory::AvailabilitySummary,

            // --- Contratos ---
            models::contracts::ContractStatus,
            models::contracts::Contract,
            models::contracts::ContractItem,
            models::contracts::ContractItemDetail,
            models::contracts::ContractDetail,

            // --- Aditivos ---
            models::amendments::AmendmentType,
            models::amendments::AmendmentStatus,
            models::amendments::AmendmentEffect,
            models::amendments::AmendmentItem,
            models::amendments::Amendment,
            models::amendments::MovementKind,
            models::amendments::AmendmentMovement,

            // --- Payloads ---
            handlers::inventory::CreateAssetTypePayload,
            handlers::inventory::CreateBatchPayload,
            handlers::contracts::CreateContractPayload,
            handlers::contracts::AddContractItemPayload,
            handlers::contracts::UpdateContractItemPayload,
            handlers::amendments::AmendmentItemPayload,
            handlers::amendments::CreateAmendmentPayload,
        )
    ),
    tags(
        (name = "Sistema", description = "Saúde do serviço"),
        (name = "Estoque", description = "Tipos de ativo, lotes e disponibilidade"),
        (name = "Contratos", description = "Contratos de locação e seus itens"),
        (name = "Aditivos", description = "Alterações de contratos ativos")
    )
)]
pub struct ApiDoc;
