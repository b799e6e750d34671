// ABOUTME: Account-kind specific Cal.com token refresh protocols
// ABOUTME: Managed force-refresh and standard OAuth grant behind one trait
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use super::extract_error_message;
use super::types::{CalEnvelope, ManagedTokenData, OAuthTokenResponse};
use crate::config::CalConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{AccountKind, CalendarIntegration};

/// Fallback access-token lifetime when the remote response omits an expiry
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Raw outcome of one refresh call, before the previous refresh token is
/// carried forward
#[derive(Debug)]
pub struct RefreshedTokens {
    /// New access token
    pub access_token: String,
    /// Rotated refresh token, when the remote rotated it
    pub refresh_token: Option<String>,
    /// Computed absolute expiry
    pub expires_at: DateTime<Utc>,
}

/// One of the two account-linkage refresh protocols
///
/// Both implementations normalize their endpoint's response shape into
/// [`RefreshedTokens`]; the caller is responsible for retaining the previous
/// refresh token when `refresh_token` comes back `None`.
#[async_trait]
pub trait AccountRefresher: Send + Sync {
    /// Execute the refresh against Cal.com
    async fn refresh(
        &self,
        http: &reqwest::Client,
        config: &CalConfig,
        integration: &CalendarIntegration,
    ) -> AppResult<RefreshedTokens>;
}

/// Select the refresher for an integration's account kind
#[must_use]
pub fn refresher_for(kind: AccountKind) -> &'static dyn AccountRefresher {
    match kind {
        AccountKind::Managed => &ManagedAccountRefresher,
        AccountKind::Oauth => &OAuthAccountRefresher,
    }
}

/// Refreshes platform-provisioned managed users via the force-refresh
/// endpoint, authenticated with platform client credentials
pub struct ManagedAccountRefresher;

#[async_trait]
impl AccountRefresher for ManagedAccountRefresher {
    async fn refresh(
        &self,
        http: &reqwest::Client,
        config: &CalConfig,
        integration: &CalendarIntegration,
    ) -> AppResult<RefreshedTokens> {
        let (client_id, client_secret) = config.credentials()?;
        let managed_user_id = integration.cal_managed_user_id.ok_or_else(|| {
            AppError::not_found(format!(
                "No managed user id stored for user {}",
                integration.user_ulid
            ))
        })?;

        let url = format!(
            "{}/v2/oauth-clients/{client_id}/users/{managed_user_id}/force-refresh",
            config.api_base
        );
        let response = http
            .post(&url)
            .header("x-cal-client-id", client_id)
            .header("x-cal-secret-key", client_secret)
            .send()
            .await
            .map_err(|e| AppError::external_service("Cal.com", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "Cal.com",
                format!(
                    "Managed token refresh failed with HTTP {status}: {}",
                    extract_error_message(&body)
                ),
            ));
        }

        let envelope: CalEnvelope<ManagedTokenData> = response
            .json()
            .await
            .map_err(|e| AppError::external_service("Cal.com", format!("JSON parse error: {e}")))?;

        let access_token = envelope.data.access_token.ok_or_else(|| {
            AppError::external_service(
                "Cal.com",
                "Managed refresh response missing data.accessToken",
            )
        })?;

        let expires_at = envelope
            .data
            .access_token_expires_at
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        Ok(RefreshedTokens {
            access_token,
            refresh_token: envelope.data.refresh_token,
            expires_at,
        })
    }
}

/// Refreshes standard OAuth-connected accounts via the generic token endpoint
/// with `grant_type=refresh_token`
pub struct OAuthAccountRefresher;

#[async_trait]
impl AccountRefresher for OAuthAccountRefresher {
    async fn refresh(
        &self,
        http: &reqwest::Client,
        config: &CalConfig,
        integration: &CalendarIntegration,
    ) -> AppResult<RefreshedTokens> {
        let (client_id, client_secret) = config.credentials()?;
        let refresh_token = integration.cal_refresh_token.as_deref().ok_or_else(|| {
            AppError::not_found(format!(
                "No refresh token stored for user {}",
                integration.user_ulid
            ))
        })?;

        let url = format!("{}/v2/oauth/token", config.api_base);
        let response = http
            .post(&url)
            .json(&json!({
                "client_id": client_id,
                "client_secret": client_secret,
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await
            .map_err(|e| AppError::external_service("Cal.com", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "Cal.com",
                format!(
                    "OAuth token refresh failed with HTTP {status}: {}",
                    extract_error_message(&body)
                ),
            ));
        }

        let payload: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_service("Cal.com", format!("JSON parse error: {e}")))?;

        let access_token = payload.access_token.ok_or_else(|| {
            AppError::external_service("Cal.com", "Token response missing access_token")
        })?;

        let lifetime = payload.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(RefreshedTokens {
            access_token,
            refresh_token: payload.refresh_token,
            expires_at: Utc::now() + Duration::seconds(lifetime),
        })
    }
}
