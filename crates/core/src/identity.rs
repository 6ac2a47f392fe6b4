use crate::models::DeviceIdentifier;
use sqlx::SqlitePool;

pub trait DeviceIdentityProvider: Send + Sync {
    /// Same value for the lifetime of the installation.
    fn device_identifier(&self) -> DeviceIdentifier;
}

#[derive(Debug, Clone)]
pub struct FixedIdentity(DeviceIdentifier);

impl FixedIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(DeviceIdentifier::new(id))
    }
}

impl DeviceIdentityProvider for FixedIdentity {
    fn device_identifier(&self) -> DeviceIdentifier {
        self.0.clone()
    }
}

/// Identifier persisted in the local database, created on first launch.
#[derive(Debug, Clone)]
pub struct InstallationIdentity {
    id: DeviceIdentifier,
}

impl InstallationIdentity {
    pub async fn load(pool: &SqlitePool) -> anyhow::Result<Self> {
        let id = storage::installation::device_id(pool).await?;
        Ok(Self {
            id: DeviceIdentifier::new(id),
        })
    }
}

impl DeviceIdentityProvider for InstallationIdentity {
    fn device_identifier(&self) -> DeviceIdentifier {
        self.id.clone()
    }
}
