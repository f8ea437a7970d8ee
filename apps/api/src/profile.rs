//! Applicant profile storage.
//!
//! A single-row store: the service applies on behalf of one person, and every
//! session reads the same profile. Contact fields and the base resume are
//! required; demographic fields are optional and are never auto-filled into
//! forms, they exist so an operator can answer voluntary-disclosure questions
//! during a manual intervention.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub resume_text: String,
    pub gender: Option<String>,
    pub race: Option<String>,
    pub veteran_status: Option<String>,
}

#[derive(Clone)]
pub struct ProfileStore {
    pool: SqlitePool,
}

impl ProfileStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> Result<Option<ApplicantProfile>, sqlx::Error> {
        sqlx::query_as::<_, ApplicantProfile>(
            r#"
            SELECT full_name, email, phone, resume_text, gender, race, veteran_status
            FROM applicant_profile WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn save(&self, profile: &ApplicantProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO applicant_profile
                (id, full_name, email, phone, resume_text, gender, race, veteran_status, updated_at)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                email = excluded.email,
                phone = excluded.phone,
                resume_text = excluded.resume_text,
                gender = excluded.gender,
                race = excluded.race,
                veteran_status = excluded.veteran_status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.phone)
        .bind(&profile.resume_text)
        .bind(&profile.gender)
        .bind(&profile.race)
        .bind(&profile.veteran_status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// PUT /api/v1/profile
pub async fn handle_put_profile(
    State(state): State<AppState>,
    Json(profile): Json<ApplicantProfile>,
) -> Result<Json<serde_json::Value>, AppError> {
    for (field, value) in [
        ("full_name", &profile.full_name),
        ("email", &profile.email),
        ("phone", &profile.phone),
        ("resume_text", &profile.resume_text),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }

    state.profiles.save(&profile).await?;
    Ok(Json(json!({ "status": "saved" })))
}

/// GET /api/v1/profile
pub async fn handle_get_profile(
    State(state): State<AppState>,
) -> Result<Json<ApplicantProfile>, AppError> {
    match state.profiles.load().await? {
        Some(profile) => Ok(Json(profile)),
        None => Err(AppError::NotFound(
            "No applicant profile has been saved".to_string(),
        )),
    }
}
