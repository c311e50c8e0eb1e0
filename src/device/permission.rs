use std::collections::HashMap;
use async_trait::async_trait;
use log::warn;

use crate::device::types::{Capability, REQUIRED_CAPABILITIES};
use crate::error::SessionError;

pub type GrantMap = HashMap<Capability, bool>;

#[async_trait]
pub trait PermissionGate: Send + Sync + 'static {
    /// Issues one combined request for all `capabilities`.
    async fn request_permissions(&self, capabilities: &[Capability]) -> GrantMap;
}

/// Desktop bluetooth stacks have no runtime grant step (macOS prompts by itself on first use,
/// using the usage description in the embedded Info.plist), so everything is granted.
#[derive(Debug, Default, Clone)]
pub struct PlatformPermissions;

#[async_trait]
impl PermissionGate for PlatformPermissions {
    async fn request_permissions(&self, capabilities: &[Capability]) -> GrantMap {
        capabilities.iter().map(|capability| (*capability, true)).collect()
    }
}

/// Succeeds only if both scanning and connecting are granted.
pub async fn ensure_permissions<P: PermissionGate + ?Sized>(gate: &P) -> Result<(), SessionError> {
    let result = gate.request_permissions(&REQUIRED_CAPABILITIES).await;

    let granted = REQUIRED_CAPABILITIES
        .iter()
        .all(|capability| result.get(capability).copied().unwrap_or(false));

    if !granted {
        warn!("Bluetooth permissions not granted: {:?}", result);
        return Err(SessionError::PermissionDenied);
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    struct Grants(Vec<(Capability, bool)>);

    #[async_trait]
    impl PermissionGate for Grants {
        async fn request_permissions(&self, _capabilities: &[Capability]) -> GrantMap {
            self.0.iter().copied().collect()
        }
    }

    #[tokio::test]
    async fn platform_grants_everything() {
        assert!(ensure_permissions(&PlatformPermissions).await.is_ok());
    }

    #[tokio::test]
    async fn both_capabilities_are_required() {
        let only_scan = Grants(vec![(Capability::Scan, true), (Capability::Connect, false)]);
        assert!(matches!(ensure_permissions(&only_scan).await, Err(SessionError::PermissionDenied)));

        let missing = Grants(vec![(Capability::Connect, true)]);
        assert!(matches!(ensure_permissions(&missing).await, Err(SessionError::PermissionDenied)));

        let both = Grants(vec![(Capability::Scan, true), (Capability::Connect, true)]);
        assert!(ensure_permissions(&both).await.is_ok());
    }
}
