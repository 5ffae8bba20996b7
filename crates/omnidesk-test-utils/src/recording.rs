// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording CRM and notifier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use omnidesk_core::traits::adapter::PluginAdapter;
use omnidesk_core::types::{AdapterType, ClosedInteractionReport, HealthStatus, Message};
use omnidesk_core::{CrmSink, MessageNotifier, OmniError};

/// CRM sink that records every hand-off and can be told to fail.
#[derive(Default)]
pub struct RecordingCrm {
    submitted: tokio::sync::Mutex<Vec<ClosedInteractionReport>>,
    fail: AtomicBool,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl RecordingCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent hand-offs fail with `OmniError::Crm`.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Block hand-offs until the returned guard is dropped.
    pub async fn hold(&self) -> tokio::sync::OwnedMutexGuard<()> {
        self.gate.clone().lock_owned().await
    }

    pub async fn submitted(&self) -> Vec<ClosedInteractionReport> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingCrm {
    fn name(&self) -> &str {
        "recording-crm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crm
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        Ok(())
    }
}

#[async_trait]
impl CrmSink for RecordingCrm {
    async fn submit_closed_interaction(
        &self,
        report: &ClosedInteractionReport,
    ) -> Result<(), OmniError> {
        drop(self.gate.lock().await);
        if self.fail.load(Ordering::SeqCst) {
            return Err(OmniError::Crm {
                message: "crm unavailable".to_string(),
            });
        }
        self.submitted.lock().await.push(report.clone());
        Ok(())
    }
}

/// Notifier that keeps every fanned-out message in order.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<Message>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl MessageNotifier for RecordingNotifier {
    fn notify(&self, messages: &[Message]) {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(messages);
    }
}
