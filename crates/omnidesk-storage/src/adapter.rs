// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the LedgerStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use omnidesk_config::model::StorageConfig;
use omnidesk_core::types::{
    ChannelAccount, Interaction, InteractionQuery, InteractionUpdate, Message, NewInteraction,
    NewMessage, NewReporter, Platform, Reporter, Thread,
};
use omnidesk_core::{AdapterType, HealthStatus, LedgerStore, OmniError, PluginAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed interaction ledger.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is lazily opened by
/// [`SqliteLedger::initialize`].
pub struct SqliteLedger {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteLedger {
    /// Create a ledger for the configured path; nothing is opened yet.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig::default(),
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// Open the database file and run migrations.
    pub async fn initialize(&self) -> Result<(), OmniError> {
        let db = Database::open(&self.config.database_path).await?;
        self.db.set(db).map_err(|_| OmniError::Storage {
            source: "ledger already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite ledger initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, OmniError> {
        self.db.get().ok_or_else(|| OmniError::Storage {
            source: "ledger not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteLedger {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ledger
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let ping = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await;
        Ok(match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteLedger {
    // --- Reporters ---

    async fn find_reporter_by_meta_id(&self, meta_id: &str) -> Result<Option<Reporter>, OmniError> {
        queries::reporters::find_by_meta_id(self.db()?, meta_id).await
    }

    async fn find_reporter_by_email(&self, email: &str) -> Result<Option<Reporter>, OmniError> {
        queries::reporters::find_by_email(self.db()?, email).await
    }

    async fn get_reporter(&self, id: i64) -> Result<Option<Reporter>, OmniError> {
        queries::reporters::get(self.db()?, id).await
    }

    async fn create_reporter(&self, reporter: &NewReporter) -> Result<Reporter, OmniError> {
        queries::reporters::create(self.db()?, reporter).await
    }

    // --- Interactions ---

    async fn find_ongoing_by_reporter(
        &self,
        reporter_id: i64,
        platform: Platform,
    ) -> Result<Option<Interaction>, OmniError> {
        queries::interactions::find_ongoing_by_reporter(self.db()?, reporter_id, platform).await
    }

    async fn find_ongoing_by_mention_media(
        &self,
        media_id: &str,
    ) -> Result<Option<Interaction>, OmniError> {
        queries::interactions::find_ongoing_by_mention_media(self.db()?, media_id).await
    }

    async fn find_ongoing_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Interaction>, OmniError> {
        queries::interactions::find_ongoing_by_conversation(self.db()?, conversation_id).await
    }

    async fn get_interaction(&self, id: i64) -> Result<Option<Interaction>, OmniError> {
        queries::interactions::get(self.db()?, id).await
    }

    async fn create_interaction(
        &self,
        interaction: &NewInteraction,
    ) -> Result<Interaction, OmniError> {
        queries::interactions::create(self.db()?, interaction).await
    }

    async fn update_interaction(
        &self,
        id: i64,
        update: &InteractionUpdate,
    ) -> Result<Option<Interaction>, OmniError> {
        queries::interactions::update(self.db()?, id, update).await
    }

    async fn list_interactions(
        &self,
        query: &InteractionQuery,
    ) -> Result<(Vec<Interaction>, i64), OmniError> {
        queries::interactions::list(self.db()?, query).await
    }

    // --- Messages ---

    async fn find_message_by_meta_id(&self, meta_id: &str) -> Result<Option<Message>, OmniError> {
        queries::messages::find_by_meta_id(self.db()?, meta_id).await
    }

    async fn create_message(&self, message: &NewMessage) -> Result<Message, OmniError> {
        queries::messages::create(self.db()?, message).await
    }

    async fn list_messages(&self, interaction_id: i64) -> Result<Vec<Message>, OmniError> {
        queries::messages::list_for_interaction(self.db()?, interaction_id).await
    }

    async fn latest_message(&self, interaction_id: i64) -> Result<Option<Message>, OmniError> {
        queries::messages::latest(self.db()?, interaction_id, false).await
    }

    async fn latest_external_message(
        &self,
        interaction_id: i64,
    ) -> Result<Option<Message>, OmniError> {
        queries::messages::latest(self.db()?, interaction_id, true).await
    }

    // --- Threads ---

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>, OmniError> {
        queries::threads::get(self.db()?, id).await
    }

    async fn create_thread(&self, thread: &Thread) -> Result<Thread, OmniError> {
        queries::threads::create(self.db()?, thread).await
    }

    // --- Channel accounts ---

    async fn get_channel_account(&self, id: i64) -> Result<Option<ChannelAccount>, OmniError> {
        queries::channel_accounts::get(self.db()?, id).await
    }

    async fn create_channel_account(
        &self,
        account: &ChannelAccount,
    ) -> Result<ChannelAccount, OmniError> {
        queries::channel_accounts::create(self.db()?, account).await
    }
}
