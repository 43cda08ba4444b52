//! Process engine seam: where decoded records end up.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::constants::headers;
use crate::messaging::BrokerRecord;

/// Rejections reported by the process engine for one delivery
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Deployment not found: {deployment_id}")]
    DeploymentNotFound { deployment_id: String },

    #[error("Signal {signal_name} rejected by deployment {deployment_id}: {reason}")]
    Rejected {
        deployment_id: String,
        signal_name: String,
        reason: String,
    },

    #[error("Process engine unavailable: {message}")]
    Unavailable { message: String },
}

impl EngineError {
    pub fn deployment_not_found(deployment_id: impl Into<String>) -> Self {
        Self::DeploymentNotFound {
            deployment_id: deployment_id.into(),
        }
    }

    pub fn rejected(
        deployment_id: impl Into<String>,
        signal_name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Rejected {
            deployment_id: deployment_id.into(),
            signal_name: signal_name.into(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// User name and password taken from record headers
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity a single delivery runs as
///
/// Read from the [`headers::USER`], [`headers::PASSWORD`] and [`headers::ASSERTION`]
/// headers of the record. Credentials need both user and password; the assertion
/// token stands on its own. The engine logs the caller in before the signal and
/// out after it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub credentials: Option<Credentials>,
    pub assertion: Option<String>,
}

impl CallerIdentity {
    /// Identity carried by `record`, or `None` when it has no usable headers
    pub fn from_record(record: &BrokerRecord) -> Option<Self> {
        let user = record.header_str(headers::USER);
        let password = record.header_str(headers::PASSWORD);
        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some(Credentials {
                user: user.to_string(),
                password: password.to_string(),
            }),
            _ => {
                debug!(
                    topic = %record.topic,
                    offset = record.offset,
                    user = ?user,
                    "User name and/or password missing from record headers"
                );
                None
            }
        };
        let assertion = record.header_str(headers::ASSERTION).map(str::to_string);

        if credentials.is_none() && assertion.is_none() {
            return None;
        }
        Some(Self {
            credentials,
            assertion,
        })
    }

    pub fn user(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.user.as_str())
    }
}

impl fmt::Debug for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallerIdentity")
            .field("credentials", &self.credentials)
            .field("assertion", &self.assertion.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Delivers a signal to every process instance of a deployment waiting on it
///
/// Message descriptors arrive through the same call with their name prefixed by
/// [`crate::constants::MESSAGE_SIGNAL_PREFIX`]. `caller` is the identity the record
/// carried, if any.
#[async_trait]
pub trait ProcessSignaller: Send + Sync + 'static {
    async fn signal_event(
        &self,
        deployment_id: &str,
        signal_name: &str,
        payload: Value,
        caller: Option<&CallerIdentity>,
    ) -> Result<(), EngineError>;
}
