// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine testing.
//!
//! `TestHarness` assembles an [`Engine`] with a mock gateway, a recording CRM
//! and notifier, and either the in-memory ledger or a temp SQLite database.

use std::sync::Arc;

use omnidesk_config::model::StorageConfig;
use omnidesk_core::types::ChannelAccount;
use omnidesk_core::{LedgerStore, OmniError};
use omnidesk_engine::{Actor, Engine};
use omnidesk_storage::SqliteLedger;

use crate::memory_ledger::MemoryLedger;
use crate::mock_channel::MockGateway;
use crate::recording::{RecordingCrm, RecordingNotifier};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    sqlite: bool,
    account: Option<ChannelAccount>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite: false,
            account: None,
        }
    }

    /// Back the engine with a temp SQLite file instead of [`MemoryLedger`].
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    /// Seed a channel account; its id is available as [`TestHarness::actor`].
    pub fn with_account(mut self, account: ChannelAccount) -> Self {
        self.account = Some(account);
        self
    }

    /// Build the test harness, creating all required collaborators.
    pub async fn build(self) -> Result<TestHarness, OmniError> {
        let mut temp_dir = None;
        let memory = Arc::new(MemoryLedger::new());
        let ledger: Arc<dyn LedgerStore> = if self.sqlite {
            let dir =
                tempfile::TempDir::new().map_err(|e| OmniError::Storage { source: e.into() })?;
            let ledger = SqliteLedger::new(StorageConfig {
                database_path: dir.path().join("test.db").to_string_lossy().to_string(),
                wal_mode: true,
            });
            ledger.initialize().await?;
            temp_dir = Some(dir);
            Arc::new(ledger)
        } else {
            memory.clone()
        };

        let account = match &self.account {
            Some(account) => Some(ledger.create_channel_account(account).await?),
            None => None,
        };

        let gateway = Arc::new(MockGateway::new());
        let crm = Arc::new(RecordingCrm::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = Engine::new(
            ledger.clone(),
            gateway.clone(),
            crm.clone(),
            notifier.clone(),
        );

        Ok(TestHarness {
            engine,
            ledger,
            memory,
            gateway,
            crm,
            notifier,
            account,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine environment with mock collaborators.
pub struct TestHarness {
    pub engine: Engine,
    /// The ledger the engine writes to.
    pub ledger: Arc<dyn LedgerStore>,
    /// The in-memory ledger; unused by the engine when built with SQLite.
    pub memory: Arc<MemoryLedger>,
    pub gateway: Arc<MockGateway>,
    pub crm: Arc<RecordingCrm>,
    pub notifier: Arc<RecordingNotifier>,
    /// The seeded channel account, with its assigned id.
    pub account: Option<ChannelAccount>,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// An in-memory harness with defaults.
    pub async fn new() -> Result<Self, OmniError> {
        Self::builder().build().await
    }

    /// An acting agent holding the seeded channel account.
    pub fn actor(&self, agent_id: &str) -> Actor {
        Actor {
            agent_id: Some(agent_id.to_string()),
            channel_account_id: self.account.as_ref().map(|a| a.id),
        }
    }

    /// A fully configured channel account for page `page-1`, Instagram `ig-1`
    /// and WhatsApp business `waba-1` (number `num-1`).
    pub fn sample_account() -> ChannelAccount {
        ChannelAccount {
            id: 0,
            name: "support".to_string(),
            facebook_page_id: Some("page-1".to_string()),
            instagram_id: Some("ig-1".to_string()),
            whatsapp_number_id: Some("num-1".to_string()),
            whatsapp_business_id: Some("waba-1".to_string()),
            facebook_access_token: Some("fb-token".to_string()),
            instagram_access_token: Some("ig-token".to_string()),
            whatsapp_access_token: Some("wa-token".to_string()),
            is_live_chat_active: true,
        }
    }
}
