// src/models/amendments.rs

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::contracts::{ensure_money, MAX_QUANTITY};

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "amendment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmendmentType {
    Increase,        // Vira "INCREASE"
    Reduction,       // Vira "REDUCTION"
    TermChange,      // Vira "TERM_CHANGE"
    ValueAdjustment, // Vira "VALUE_ADJUSTMENT"
    Refund,          // Vira "REFUND"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "amendment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmendmentStatus {
    Pending,
    Active,
    Cancelled,
}

impl AmendmentStatus {
    /// Únicas transições: PENDING -> ACTIVE (uma vez) e ACTIVE -> CANCELLED.
    pub fn can_transition_to(self, next: AmendmentStatus) -> bool {
        matches!(
            (self, next),
            (AmendmentStatus::Pending, AmendmentStatus::Active)
                | (AmendmentStatus::Active, AmendmentStatus::Cancelled)
        )
    }
}

// Efeito de um item do aditivo sobre o contrato.
// No banco é um delta com sinal (positivo = acréscimo, negativo = redução).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AmendmentEffect {
    Increase { quantity: i32 },
    Reduction { quantity: i32 },
}

impl AmendmentEffect {
    /// `None` para delta zero, que não descreve efeito nenhum.
    pub fn from_delta(delta: i32) -> Option<Self> {
        match delta {
            0 => None,
            d if d > 0 => Some(AmendmentEffect::Increase { quantity: d }),
            d => Some(AmendmentEffect::Reduction { quantity: d.checked_neg()? }),
        }
    }

    pub fn quantity_delta(&self) -> i32 {
        match *self {
            AmendmentEffect::Increase { quantity } => quantity,
            AmendmentEffect::Reduction { quantity } => -quantity,
        }
    }

    pub fn quantity(&self) -> i32 {
        match *self {
            AmendmentEffect::Increase { quantity } | AmendmentEffect::Reduction { quantity } => quantity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AmendmentItem {
    pub id: Uuid,
    pub amendment_id: Uuid,
    pub asset_type_id: Uuid,
    pub position: i32,
    pub effect: AmendmentEffect,
    /// Diária para itens criados pelo aditivo. Numa redução, guarda a diária do item reduzido.
    pub unit_value: Option<Decimal>,
    /// Item do contrato resolvido na ativação.
    pub contract_item_id: Option<Uuid>,
    pub created_contract_item: bool,
    pub removed_contract_item: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Amendment {
    pub id: Uuid,
    #[schema(ignore)]
    pub landlord_id: Uuid,
    pub contract_id: Uuid,
    pub amendment_type: AmendmentType,
    pub status: AmendmentStatus,
    pub effective_date: NaiveDate,
    pub description: Option<String>,
    pub new_end_date: Option<NaiveDate>,
    pub previous_end_date: Option<NaiveDate>,
    /// Soma ao valor do contrato enquanto ativo (reajuste ou estorno).
    pub value_delta: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub items: Vec<AmendmentItem>,
}

// --- Livro de movimentos do aditivo ---
// O que a ativação alocou/liberou, para o cancelamento desfazer exatamente isso.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "amendment_movement_kind", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Allocated,
    Released,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AmendmentMovement {
    pub id: Uuid,
    pub amendment_id: Uuid,
    pub amendment_item_id: Uuid,
    pub contract_item_id: Uuid,
    pub batch_id: Uuid,
    pub allocation_record_id: Option<Uuid>,
    pub kind: MovementKind,
    pub quantity: i32,
    /// Movimentos gravados pelo cancelamento não são desfeitos de novo.
    pub is_reversal: bool,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMovement {
    pub amendment_id: Uuid,
    pub amendment_item_id: Uuid,
    pub contract_item_id: Uuid,
    pub batch_id: Uuid,
    pub allocation_record_id: Option<Uuid>,
    pub kind: MovementKind,
    pub quantity: i32,
    pub is_reversal: bool,
}

// --- Entradas do serviço ---

#[derive(Debug, Clone)]
pub struct NewAmendmentItem {
    pub asset_type_id: Uuid,
    pub effect: AmendmentEffect,
    pub unit_value: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct NewAmendment {
    pub amendment_type: AmendmentType,
    pub effective_date: NaiveDate,
    pub description: Option<String>,
    pub items: Vec<NewAmendmentItem>,
    pub new_end_date: Option<NaiveDate>,
    /// Reajuste: delta com sinal. Estorno: valor positivo a devolver.
    pub value: Option<Decimal>,
}

impl NewAmendment {
    /// Confere se os itens e campos combinam com o tipo do aditivo.
    pub fn validate_composition(&self) -> Result<(), AppError> {
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.effect.quantity() <= 0 {
                return Err(AppError::InvalidAmendment(
                    "A quantidade de cada item do aditivo deve ser maior que zero.".into(),
                ));
            }
            if item.effect.quantity() > MAX_QUANTITY {
                return Err(AppError::InvalidAmendment(format!(
                    "A quantidade de cada item do aditivo pode ser no máximo {MAX_QUANTITY}."
                )));
            }
            if !seen.insert(item.asset_type_id) {
                return Err(AppError::InvalidAmendment(
                    "O mesmo tipo de ativo aparece mais de uma vez no aditivo.".into(),
                ));
            }
            if let Some(value) = item.unit_value {
                ensure_money(value, "Valor unitário")?;
            }
        }
        if let Some(value) = self.value {
            ensure_money(value.abs(), "Valor do aditivo")?;
        }

        match self.amendment_type {
            AmendmentType::Increase => self.require_items(|e| matches!(e, AmendmentEffect::Increase { .. }), "acréscimo"),
            AmendmentType::Reduction => self.require_items(|e| matches!(e, AmendmentEffect::Reduction { .. }), "redução"),
            AmendmentType::TermChange => {
                self.forbid_items()?;
                if self.new_end_date.is_none() {
                    return Err(AppError::InvalidAmendment(
                        "Aditivo de prazo exige a nova data de término.".into(),
                    ));
                }
                Ok(())
            }
            AmendmentType::ValueAdjustment => {
                self.forbid_items()?;
                match self.value {
                    Some(v) if !v.is_zero() => Ok(()),
                    _ => Err(AppError::InvalidAmendment(
                        "Aditivo de reajuste exige um valor diferente de zero.".into(),
                    )),
                }
            }
            AmendmentType::Refund => {
                self.forbid_items()?;
                match self.value {
                    Some(v) if v > Decimal::ZERO => Ok(()),
                    _ => Err(AppError::InvalidAmendment(
                        "Aditivo de estorno exige um valor positivo.".into(),
                    )),
                }
            }
        }
    }

    /// Quanto o aditivo soma ao valor do contrato quando ativo.
    pub fn value_delta(&self) -> Option<Decimal> {
        match self.amendment_type {
            AmendmentType::ValueAdjustment => self.value,
            AmendmentType::Refund => self.value.map(|v| -v),
            _ => None,
        }
    }

    fn require_items(&self, accepts: impl Fn(&AmendmentEffect) -> bool, label: &str) -> Result<(), AppError> {
        if self.items.is_empty() {
            return Err(AppError::InvalidAmendment(format!(
                "Aditivo de {label} precisa de pelo menos um item."
            )));
        }
        if !self.items.iter().all(|i| accepts(&i.effect)) {
            return Err(AppError::InvalidAmendment(format!(
                "Todos os itens de um aditivo de {label} devem ter o mesmo sentido."
            )));
        }
        Ok(())
    }

    fn forbid_items(&self) -> Result<(), AppError> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidAmendment(
                "Este tipo de aditivo não aceita itens de quantidade.".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amendment(kind: AmendmentType, items: Vec<NewAmendmentItem>) -> NewAmendment {
        NewAmendment {
            amendment_type: kind,
            effective_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            description: None,
            items,
            new_end_date: None,
            value: None,
        }
    }

    fn item(effect: AmendmentEffect) -> NewAmendmentItem {
        NewAmendmentItem { asset_type_id: Uuid::new_v4(), effect, unit_value: None }
    }

    #[test]
    fn signed_delta_maps_to_tagged_effect() {
        assert_eq!(AmendmentEffect::from_delta(4), Some(AmendmentEffect::Increase { quantity: 4 }));
        assert_eq!(AmendmentEffect::from_delta(-3), Some(AmendmentEffect::Reduction { quantity: 3 }));
        assert_eq!(AmendmentEffect::from_delta(0), None);
        assert_eq!(AmendmentEffect::Reduction { quantity: 3 }.quantity_delta(), -3);
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        use AmendmentStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Cancelled));
        assert!(!Active.can_transition_to(Active));
        assert!(!Cancelled.can_transition_to(Active));
    }

    #[test]
    fn reduction_amendment_rejects_increase_items() {
        let a = amendment(
            AmendmentType::Reduction,
            vec![item(AmendmentEffect::Reduction { quantity: 2 }), item(AmendmentEffect::Increase { quantity: 1 })],
        );
        assert!(matches!(a.validate_composition(), Err(AppError::InvalidAmendment(_))));
    }

    #[test]
    fn duplicated_asset_type_is_rejected() {
        let asset = Uuid::new_v4();
        let mut a = amendment(AmendmentType::Increase, vec![]);
        for _ in 0..2 {
            a.items.push(NewAmendmentItem {
                asset_type_id: asset,
                effect: AmendmentEffect::Increase { quantity: 1 },
                unit_value: None,
            });
        }
        assert!(matches!(a.validate_composition(), Err(AppError::InvalidAmendment(_))));
    }

    #[test]
    fn refund_is_stored_as_negative_delta() {
        let mut a = amendment(AmendmentType::Refund, vec![]);
        a.value = Some(Decimal::new(15000, 2));
        assert!(a.validate_composition().is_ok());
        assert_eq!(a.value_delta(), Some(Decimal::new(-15000, 2)));
    }

    #[test]
    fn oversized_quantities_and_values_are_rejected() {
        let a = amendment(AmendmentType::Increase, vec![item(AmendmentEffect::Increase { quantity: i32::MAX })]);
        assert!(matches!(a.validate_composition(), Err(AppError::InvalidAmendment(_))));

        let mut priced = item(AmendmentEffect::Increase { quantity: 1 });
        priced.unit_value = Some(Decimal::MAX);
        let a = amendment(AmendmentType::Increase, vec![priced]);
        assert!(matches!(a.validate_composition(), Err(AppError::InvalidInput(_))));

        let mut a = amendment(AmendmentType::ValueAdjustment, vec![]);
        a.value = Some(Decimal::MIN);
        assert!(matches!(a.validate_composition(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn term_change_needs_new_end_date() {
        let a = amendment(AmendmentType::TermChange, vec![]);
        assert!(a.validate_composition().is_err());
    }
}
