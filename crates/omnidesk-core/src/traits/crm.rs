// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM hand-off trait used by the close saga.

use async_trait::async_trait;

use crate::error::OmniError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ClosedInteractionReport;

/// Downstream CRM that must acknowledge every closed interaction.
#[async_trait]
pub trait CrmSink: PluginAdapter {
    /// Deliver a closed interaction; any error triggers compensation.
    async fn submit_closed_interaction(
        &self,
        report: &ClosedInteractionReport,
    ) -> Result<(), OmniError>;
}
