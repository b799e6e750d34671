// ABOUTME: Database operations for calendar_integrations rows
// ABOUTME: Token triple persistence with AAD-bound encryption at rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{AccountKind, CalendarIntegration, TokenSet};

fn aad_context(user_ulid: &str) -> String {
    format!("{user_ulid}|calendar_integrations")
}

impl Database {
    /// Insert a calendar integration row, encrypting any stored tokens
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the insert fails (including a
    /// uniqueness violation on `user_ulid`).
    pub async fn create_calendar_integration(
        &self,
        integration: &CalendarIntegration,
    ) -> AppResult<()> {
        let aad = aad_context(&integration.user_ulid);
        let encrypted_access = integration
            .cal_access_token
            .as_deref()
            .map(|t| self.encrypt_with_aad(t, &aad))
            .transpose()?;
        let encrypted_refresh = integration
            .cal_refresh_token
            .as_deref()
            .map(|t| self.encrypt_with_aad(t, &aad))
            .transpose()?;

        sqlx::query(
            r"
            INSERT INTO calendar_integrations (
                ulid, user_ulid, account_kind, cal_managed_user_id,
                cal_access_token, cal_refresh_token, cal_access_token_expires_at,
                google_calendar_connected, office365_calendar_connected,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(&integration.ulid)
        .bind(&integration.user_ulid)
        .bind(integration.account_kind.as_str())
        .bind(integration.cal_managed_user_id)
        .bind(encrypted_access.as_deref())
        .bind(encrypted_refresh.as_deref())
        .bind(integration.cal_access_token_expires_at)
        .bind(integration.google_calendar_connected)
        .bind(integration.office365_calendar_connected)
        .bind(integration.created_at)
        .bind(integration.updated_at)
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to create calendar integration: {e}")))?;

        Ok(())
    }

    /// Get the calendar integration for a user
    ///
    /// # Errors
    ///
    /// Returns an error if the query or token decryption fails.
    pub async fn get_calendar_integration_by_user(
        &self,
        user_ulid: &str,
    ) -> AppResult<Option<CalendarIntegration>> {
        let row = sqlx::query(
            r"
            SELECT ulid, user_ulid, account_kind, cal_managed_user_id,
                   cal_access_token, cal_refresh_token, cal_access_token_expires_at,
                   google_calendar_connected, office365_calendar_connected,
                   created_at, updated_at
            FROM calendar_integrations
            WHERE user_ulid = $1
            ",
        )
        .bind(user_ulid)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to query calendar integration: {e}")))?;

        row.map_or_else(
            || Ok(None),
            |row| Ok(Some(self.row_to_calendar_integration(&row)?)),
        )
    }

    /// Persist a refreshed token triple for a user's integration
    ///
    /// The refresh token in the [`TokenSet`] already carries the previous
    /// value forward when the remote response omitted a rotation.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the update fails, or if no
    /// integration row exists for the user.
    pub async fn update_integration_tokens(
        &self,
        user_ulid: &str,
        tokens: &TokenSet,
    ) -> AppResult<()> {
        let aad = aad_context(user_ulid);
        let encrypted_access = self.encrypt_with_aad(&tokens.access_token, &aad)?;
        let encrypted_refresh = self.encrypt_with_aad(&tokens.refresh_token, &aad)?;

        let result = sqlx::query(
            r"
            UPDATE calendar_integrations
            SET cal_access_token = $2,
                cal_refresh_token = $3,
                cal_access_token_expires_at = $4,
                updated_at = $5
            WHERE user_ulid = $1
            ",
        )
        .bind(user_ulid)
        .bind(&encrypted_access)
        .bind(&encrypted_refresh)
        .bind(tokens.expires_at)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to persist refreshed tokens: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!(
                "No calendar integration for user {user_ulid}"
            )));
        }
        Ok(())
    }

    /// Update the derived connection flags after a successful calendar fetch
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_calendar_connection_flags(
        &self,
        user_ulid: &str,
        google: bool,
        office365: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE calendar_integrations
            SET google_calendar_connected = $2,
                office365_calendar_connected = $3,
                updated_at = $4
            WHERE user_ulid = $1
            ",
        )
        .bind(user_ulid)
        .bind(google)
        .bind(office365)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to update connection flags: {e}")))?;

        Ok(())
    }

    /// Disconnect a user's Cal.com account: clear tokens and flags, keep the row
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn disconnect_calendar_integration(&self, user_ulid: &str) -> AppResult<()> {
        sqlx::query(
            r"
            UPDATE calendar_integrations
            SET cal_access_token = NULL,
                cal_refresh_token = NULL,
                cal_access_token_expires_at = NULL,
                google_calendar_connected = 0,
                office365_calendar_connected = 0,
                updated_at = $2
            WHERE user_ulid = $1
            ",
        )
        .bind(user_ulid)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|e| AppError::database(format!("Failed to disconnect integration: {e}")))?;

        Ok(())
    }

    fn row_to_calendar_integration(&self, row: &SqliteRow) -> AppResult<CalendarIntegration> {
        let user_ulid: String = row.get("user_ulid");
        let aad = aad_context(&user_ulid);

        let encrypted_access: Option<String> = row.get("cal_access_token");
        let cal_access_token = encrypted_access
            .as_deref()
            .map(|t| self.decrypt_with_aad(t, &aad))
            .transpose()?;

        let encrypted_refresh: Option<String> = row.get("cal_refresh_token");
        let cal_refresh_token = encrypted_refresh
            .as_deref()
            .map(|t| self.decrypt_with_aad(t, &aad))
            .transpose()?;

        let kind_str: String = row.get("account_kind");
        let account_kind = AccountKind::from_str_value(&kind_str).ok_or_else(|| {
            AppError::database(format!("Unknown account_kind '{kind_str}' for {user_ulid}"))
        })?;

        Ok(CalendarIntegration {
            ulid: row.get("ulid"),
            user_ulid,
            account_kind,
            cal_managed_user_id: row.get("cal_managed_user_id"),
            cal_access_token,
            cal_refresh_token,
            cal_access_token_expires_at: row.get("cal_access_token_expires_at"),
            google_calendar_connected: row.get("google_calendar_connected"),
            office365_calendar_connected: row.get("office365_calendar_connected"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
