use indexmap::IndexMap;

use crate::device::types::{DiscoveredDevice, ValueRecord};
use crate::session::codec::decode_payload;

/// Everything the presentation layer renders. Snapshots are never mutated in place; every
/// change goes through [`reduce`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub scanning: bool,
    // generation of the latest scan, reports of older scans are ignored
    pub scan_id: u64,
    // in order of first discovery
    pub devices: IndexMap<String, DiscoveredDevice>,
    pub target_id: String,
    pub connected_device_id: Option<String>,
    // newline terminated records
    pub data: String,
}

impl SessionState {
    pub fn is_connected_device(&self, id: &str) -> bool {
        self.connected_device_id.as_deref() == Some(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    ScanStarted { scan_id: u64 },
    DeviceDiscovered { scan_id: u64, device: DiscoveredDevice },
    /// The scan window elapsed or the scan failed.
    ScanEnded { scan_id: u64 },
    TargetChanged(String),
    Connected { device_id: String },
    Notification(ValueRecord),
}

pub fn reduce(mut state: SessionState, event: SessionEvent) -> SessionState {
    match event {
        SessionEvent::ScanStarted { scan_id } => {
            SessionState {
                scanning: true,
                scan_id,
                devices: IndexMap::new(),
                target_id: state.target_id,
                connected_device_id: None,
                data: String::new(),
            }
        },
        SessionEvent::DeviceDiscovered { scan_id, device } => {
            if state.scanning && scan_id == state.scan_id && !device.id.is_empty() {
                state.devices.insert(device.id.clone(), device);
            }
            state
        },
        SessionEvent::ScanEnded { scan_id } => {
            if scan_id == state.scan_id {
                state.scanning = false;
            }
            state
        },
        SessionEvent::TargetChanged(target_id) => {
            state.target_id = target_id;
            state
        },
        SessionEvent::Connected { device_id } => {
            state.connected_device_id = Some(device_id);
            state
        },
        SessionEvent::Notification(record) => {
            if let Some(text) = record.value.as_deref().and_then(decode_payload) {
                state.data.push_str(&text);
                state.data.push('\n');
            }
            state
        },
    }
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;

    fn apply(state: SessionState, events: Vec<SessionEvent>) -> SessionState {
        events.into_iter().fold(state, reduce)
    }

    fn discovered(scan_id: u64, id: &str, name: Option<&str>) -> SessionEvent {
        SessionEvent::DeviceDiscovered { scan_id, device: DiscoveredDevice::new(id, name) }
    }

    fn notification(value: Option<&str>) -> SessionEvent {
        SessionEvent::Notification(ValueRecord {
            characteristic: Uuid::nil(),
            value: value.map(str::to_string),
        })
    }

    #[test]
    fn starting_state() {
        let state = SessionState::default();
        assert!(!state.scanning);
        assert!(state.devices.is_empty());
        assert_eq!(state.connected_device_id, None);
        assert_eq!(state.data, "");
    }

    #[test]
    fn duplicate_reports_keep_latest_name() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::ScanStarted { scan_id: 1 },
            discovered(1, "11:22", Some("Foo")),
            discovered(1, "11:22", Some("Foo2")),
            discovered(1, "33:44", None),
        ]);

        assert_eq!(state.devices.len(), 2);
        assert_eq!(state.devices["11:22"].display_name(), "Foo2");
        assert_eq!(state.devices["33:44"].display_name(), "(No Name)");
        let order: Vec<&str> = state.devices.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["11:22", "33:44"]);
    }

    #[test]
    fn reports_without_id_are_ignored() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::ScanStarted { scan_id: 1 },
            discovered(1, "", Some("Ghost")),
        ]);
        assert!(state.devices.is_empty());
    }

    #[test]
    fn new_scan_resets_session_but_keeps_target() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::ScanStarted { scan_id: 1 },
            discovered(1, "11:22", Some("Foo")),
            SessionEvent::ScanEnded { scan_id: 1 },
            SessionEvent::TargetChanged("11:22".to_string()),
            SessionEvent::Connected { device_id: "11:22".to_string() },
            notification(Some("SGVsbG8=")),
            SessionEvent::ScanStarted { scan_id: 2 },
        ]);

        assert!(state.scanning);
        assert_eq!(state.scan_id, 2);
        assert!(state.devices.is_empty());
        assert_eq!(state.connected_device_id, None);
        assert_eq!(state.data, "");
        assert_eq!(state.target_id, "11:22");

        // resetting an already empty session gives the same result
        let again = reduce(state.clone(), SessionEvent::ScanStarted { scan_id: 2 });
        assert_eq!(again, state);
    }

    #[test]
    fn stale_scan_events_are_ignored() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::ScanStarted { scan_id: 1 },
            SessionEvent::ScanEnded { scan_id: 1 },
            SessionEvent::ScanStarted { scan_id: 2 },
            discovered(1, "11:22", Some("Old")),
            SessionEvent::ScanEnded { scan_id: 1 },
        ]);

        assert!(state.scanning);
        assert!(state.devices.is_empty());
    }

    #[test]
    fn reports_after_scan_end_are_ignored() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::ScanStarted { scan_id: 1 },
            SessionEvent::ScanEnded { scan_id: 1 },
            discovered(1, "11:22", Some("Late")),
        ]);

        assert!(!state.scanning);
        assert!(state.devices.is_empty());
    }

    #[test]
    fn notifications_append_records_in_order() {
        let state = apply(SessionState::default(), vec![
            SessionEvent::Connected { device_id: "11:22".to_string() },
            notification(Some("SGVsbG8=")),
            notification(Some("V29ybGQ=")),
        ]);

        assert!(state.is_connected_device("11:22"));
        assert_eq!(state.data, "Hello\nWorld\n");
    }

    #[test]
    fn empty_or_invalid_payloads_leave_log_unchanged() {
        let state = apply(SessionState::default(), vec![
            notification(Some("SGVsbG8=")),
            notification(None),
            notification(Some("%%%")),
        ]);

        assert_eq!(state.data, "Hello\n");
    }
}
