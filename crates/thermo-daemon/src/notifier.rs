//! Local mail notifications

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use thermo_core::config::NotificationConfig;
use thermo_core::{Result, Severity, ThermoError};
use thermo_rl::Notifier;

use crate::{command, metrics};

/// Sends through `mail -s <subject> <recipient>` with the body on stdin
#[derive(Debug, Clone)]
pub struct MailNotifier {
    enabled: bool,
    recipient: String,
    timeout: Duration,
}

impl MailNotifier {
    pub fn new(config: &NotificationConfig, timeout: Duration) -> Self {
        Self {
            enabled: config.enabled,
            recipient: config.recipient.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(&self, severity: Severity, subject: &str, body: &str) -> Result<()> {
        if !self.enabled {
            debug!("Notifications disabled, dropping {:?}", subject);
            return Ok(());
        }

        let result = command::run(
            "mail",
            &["-s", subject, &self.recipient],
            Some(body),
            self.timeout,
        )
        .await;

        metrics::record_notification(severity, result.is_ok());
        match result {
            Ok(_) => {
                info!("Notification sent to {}: {:?}", self.recipient, subject);
                Ok(())
            }
            Err(e) => Err(ThermoError::Notification(e.to_string())),
        }
    }
}
