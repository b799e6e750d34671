// ABOUTME: Core database management with embedded migrations for SQLite
// ABOUTME: Handles schema setup and AES-256-GCM encryption of Cal.com tokens at rest
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keystone Coaching

/// Cal.com event type mirror rows
pub mod cal_event_types;
/// Calendar integration rows and token persistence
pub mod calendar_integrations;

use base64::engine::general_purpose;
use base64::Engine;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;

use crate::errors::{AppError, AppResult};

/// Generate a fresh 32-byte encryption key
///
/// # Errors
///
/// Returns an error if the system RNG fails.
pub fn generate_encryption_key() -> AppResult<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut key = vec![0u8; 32];
    rng.fill(&mut key)
        .map_err(|e| AppError::internal(format!("Failed to generate encryption key: {e}")))?;
    Ok(key)
}

/// Database connection pool with token encryption support
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    encryption_key: Vec<u8>,
}

impl Database {
    /// Open the database, creating the file if needed, and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The encryption key is not exactly 32 bytes
    /// - The database URL is invalid or the pool cannot connect
    /// - A migration fails
    pub async fn new(database_url: &str, encryption_key: Vec<u8>) -> AppResult<Self> {
        if encryption_key.len() != 32 {
            return Err(AppError::config(format!(
                "Encryption key must be 32 bytes, got {}",
                encryption_key.len()
            )));
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid database URL: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self {
            pool,
            encryption_key,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// Run all pending migrations embedded at compile time
    ///
    /// # Errors
    ///
    /// Returns an error if any migration fails.
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        info!("Database migrations completed");
        Ok(())
    }

    pub(crate) const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Encrypt a token using AES-256-GCM with AAD binding
    ///
    /// The AAD context ties the ciphertext to its owning row so a value copied
    /// between rows fails to decrypt.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn encrypt_with_aad(&self, data: &str, aad_context: &str) -> AppResult<String> {
        let rng = SystemRandom::new();

        let mut nonce_bytes = [0u8; 12];
        rng.fill(&mut nonce_bytes)
            .map_err(|e| AppError::internal(format!("Failed to generate nonce: {e}")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.encryption_key)
            .map_err(|e| AppError::internal(format!("Failed to create encryption key: {e}")))?;
        let key = LessSafeKey::new(unbound_key);

        let mut data_bytes = data.as_bytes().to_vec();
        key.seal_in_place_append_tag(nonce, Aad::from(aad_context.as_bytes()), &mut data_bytes)
            .map_err(|e| AppError::internal(format!("Failed to encrypt data: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(data_bytes);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt a token encrypted with [`Self::encrypt_with_aad`]
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is malformed or the AAD context does
    /// not match.
    pub fn decrypt_with_aad(&self, encrypted_data: &str, aad_context: &str) -> AppResult<String> {
        let combined = general_purpose::STANDARD
            .decode(encrypted_data)
            .map_err(|e| AppError::internal(format!("Failed to decode base64: {e}")))?;

        if combined.len() < 12 {
            return Err(AppError::internal("Invalid encrypted data: too short"));
        }

        let (nonce_bytes, encrypted_bytes) = combined.split_at(12);
        let nonce = Nonce::assume_unique_for_key(
            nonce_bytes
                .try_into()
                .map_err(|e| AppError::internal(format!("Invalid nonce size: {e}")))?,
        );

        let unbound_key = UnboundKey::new(&AES_256_GCM, &self.encryption_key)
            .map_err(|e| AppError::internal(format!("Failed to create decryption key: {e}")))?;
        let key = LessSafeKey::new(unbound_key);

        let mut decrypted_data = encrypted_bytes.to_vec();
        let decrypted = key
            .open_in_place(nonce, Aad::from(aad_context.as_bytes()), &mut decrypted_data)
            .map_err(|e| AppError::internal(format!("Failed to decrypt data: {e}")))?;

        String::from_utf8(decrypted.to_vec())
            .map_err(|e| AppError::internal(format!("Decrypted data is not valid UTF-8: {e}")))
    }
}
