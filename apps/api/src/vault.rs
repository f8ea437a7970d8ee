//! Surrogate credential vault.
//!
//! Job boards force account creation before an application can be submitted.
//! The agent never reuses the applicant's real passwords for that; it mints
//! one strong surrogate password, persists it, and hands the same value to
//! every session so later logins on the same board keep working.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;

const PASSWORD_LEN: usize = 16;
const SYMBOLS: &str = "!@#$%^&*";

#[derive(Debug, Clone, Serialize)]
pub struct SurrogateCredential {
    pub password: String,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    password: String,
    created_at: DateTime<Utc>,
}

/// Stores exactly one surrogate credential, minted on first access.
#[derive(Clone)]
pub struct CredentialVault {
    pool: SqlitePool,
}

impl CredentialVault {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the stored credential, generating and persisting one if the
    /// vault is empty. Every caller afterwards sees the same password.
    pub async fn get_or_create(&self) -> Result<SurrogateCredential, sqlx::Error> {
        if let Some(existing) = self.load().await? {
            return Ok(existing);
        }

        let password = generate_password();
        sqlx::query(
            "INSERT OR IGNORE INTO surrogate_credential (id, password, created_at) VALUES (1, ?, ?)",
        )
        .bind(&password)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!("Surrogate credential minted");

        // Re-read: a concurrent writer may have won the insert.
        match self.load().await? {
            Some(credential) => Ok(credential),
            None => Err(sqlx::Error::RowNotFound),
        }
    }

    async fn load(&self) -> Result<Option<SurrogateCredential>, sqlx::Error> {
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT password, created_at FROM surrogate_credential WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| SurrogateCredential {
            password: r.password,
            created_at: r.created_at,
        }))
    }
}

/// Generates a 16-character password satisfying the site-registration policy:
/// at least one lowercase, one uppercase, three digits, and one symbol.
pub fn generate_password() -> String {
    let alphabet: Vec<char> = ('a'..='z')
        .chain('A'..='Z')
        .chain('0'..='9')
        .chain(SYMBOLS.chars())
        .collect();

    let mut rng = OsRng;
    loop {
        let candidate: String = (0..PASSWORD_LEN)
            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
            .collect();
        if satisfies_policy(&candidate) {
            return candidate;
        }
    }
}

fn satisfies_policy(candidate: &str) -> bool {
    let lower = candidate.chars().any(|c| c.is_ascii_lowercase());
    let upper = candidate.chars().any(|c| c.is_ascii_uppercase());
    let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();
    let symbol = candidate.chars().any(|c| SYMBOLS.contains(c));
    lower && upper && digits >= 3 && symbol
}

/// GET /api/v1/vault/surrogate
pub async fn handle_get_surrogate(
    State(state): State<AppState>,
) -> Result<Json<SurrogateCredential>, AppError> {
    let credential = state.vault.get_or_create().await?;
    Ok(Json(credential))
}
