//! Startup orchestration.
//!
//! # Responsibilities
//! - Choose backend and mail implementations from configuration
//! - Fail fast: any startup error is fatal

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::backend::{BackendError, HostedBackend, MemoryBackend};
use crate::config::{ApiConfig, BackendMode};
use crate::http::Services;
use crate::mail::{HttpMailer, LogMailer, MailError, MailTransport};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize backend client: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to initialize mailer: {0}")]
    Mail(#[from] MailError),
}

/// Build the external collaborators named by `config`.
pub fn build_services(config: &ApiConfig) -> Result<Services, StartupError> {
    let backend_timeout = Duration::from_secs(config.timeouts.backend_secs);

    let mail: Arc<dyn MailTransport> = if config.mail.api_key.is_empty() {
        tracing::warn!("No mail API key configured, emails will only be logged");
        Arc::new(LogMailer)
    } else {
        Arc::new(HttpMailer::new(&config.mail, backend_timeout)?)
    };

    let services = match config.backend.mode {
        BackendMode::Hosted => {
            let hosted = Arc::new(HostedBackend::new(&config.backend, backend_timeout)?);
            tracing::info!(url = %config.backend.url, "Using hosted backend");
            Services {
                identity: hosted.clone(),
                members: hosted.clone(),
                invitations: hosted,
                mail,
            }
        }
        BackendMode::Memory => {
            tracing::warn!("Using in-memory backend; data is lost on restart");
            let memory = Arc::new(MemoryBackend::new());
            Services {
                identity: memory.clone(),
                members: memory.clone(),
                invitations: memory,
                mail,
            }
        }
    };
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_memory_services() {
        assert!(build_services(&ApiConfig::default()).is_ok());
    }

    #[test]
    fn test_hosted_services() {
        let mut config = ApiConfig::default();
        config.backend.mode = BackendMode::Hosted;
        config.backend.anon_key = "anon".to_string();
        config.backend.service_key = "service".to_string();
        config.mail.api_key = "key".to_string();
        assert!(build_services(&config).is_ok());
    }
}
