use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
/// Abre uma transação e define a variável RLS do locador (a "chave").
/// O `true` do set_config limita o valor à transação corrente.
pub(crate) async fn begin_landlord_transaction(
    pool: &PgPool,
    landlord_id: Uuid,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // 1. Inicia a transação
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut tx = pool.begin().await?;

    // 2. Define o locador
    sqlx::query("SELECT set_config('app.landlord_id', $1, true)")
        .bind(landlord_id.to_string())
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
