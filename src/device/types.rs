use uuid::Uuid;

use crate::device::constants::NO_NAME;

/// A peripheral reported by a scan, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        DiscoveredDevice {
            id: id.into(),
            name: name.map(str::to_string),
        }
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => NO_NAME,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
    pub is_notifiable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

/// One notification delivery. `value` is the payload in its wire encoding (base64).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub characteristic: Uuid,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Scan,
    Connect,
}

pub const REQUIRED_CAPABILITIES: [Capability; 2] = [Capability::Scan, Capability::Connect];
