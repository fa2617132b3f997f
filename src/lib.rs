use controllers::{CleanupError, StatusSyncError, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kube Error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Cleanup error: {0}")]
    CleanupError(#[from] CleanupError),

    #[error("Status sync error: {0}")]
    StatusSyncError(#[from] StatusSyncError),

    #[error("Metrics registry error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Settings error: {0}")]
    SettingsError(#[from] ::config::ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::KubeError(_) => "kubeerror",
            Error::StoreError(_) => "storeerror",
            Error::CleanupError(_) => "cleanuperror",
            Error::StatusSyncError(_) => "statussyncerror",
            Error::MetricsError(_) => "metricserror",
            Error::SettingsError(_) => "settingserror",
        }
        .to_string()
    }
}

/// Expose all controller components used by main
pub mod controller;
pub use crate::controller::*;
pub mod api;
pub mod config;
pub use crate::config::Settings;
pub mod controllers;

/// Log and trace integrations
pub mod telemetry;

/// Metrics
mod metrics;
pub use metrics::{Diagnostics, Metrics};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_errors_have_their_own_metric_label() {
        let error: Error = ::config::ConfigError::NotFound("concurrency".into()).into();
        assert!(matches!(error, Error::SettingsError(_)));
        assert_eq!(error.metric_label(), "settingserror");
    }
}
