use std::sync::Arc;
use iced::{window, Event};

use crate::config::types::Config;
use crate::device::btle::BtleBackend;
use crate::session::controller::SessionController;
use crate::session::state::SessionState;

pub type Controller = SessionController<BtleBackend>;

#[derive(Debug, Clone)]
pub enum Message {
    EventOccurred(Event),
    ConfigLoadComplete((Config, Option<String>)), // config, error message
    ControllerReady(Result<Arc<Controller>, String>),
    SessionUpdate(SessionState),
    ScanPress,
    ScanStarted(Option<String>), // notice to display
    TargetInput(String),
    DeviceSelected(String),
    ConnectPress,
    ConnectComplete(Option<String>), // notice to display
    NoticeConfirmed,
    ReleaseComplete(window::Id),
}

/// The session as the window shows it: the latest state published by the controller, except
/// for the target field, which belongs to the user while they type.
#[derive(Debug, Default)]
pub struct SessionView {
    state: SessionState,
    // a scan was requested and the controller has not answered yet
    scan_pending: bool,
}

impl SessionView {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn target_id(&self) -> &str {
        &self.state.target_id
    }

    pub fn set_target(&mut self, target_id: String) {
        self.state.target_id = target_id;
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_pending || self.state.scanning
    }

    /// Applies a published state. Snapshots from an older scan than the one shown are stale
    /// and ignored.
    pub fn apply(&mut self, published: SessionState) {
        if published.scan_id < self.state.scan_id {
            return;
        }

        let target_id = std::mem::take(&mut self.state.target_id);
        self.state = published;
        self.state.target_id = target_id;
    }

    /// Returns false if a scan is already running or requested.
    pub fn request_scan(&mut self) -> bool {
        if self.is_scanning() {
            return false;
        }
        self.scan_pending = true;
        true
    }

    /// The controller answered the scan request, `current` is its state at that point.
    pub fn scan_answered(&mut self, current: SessionState) {
        self.scan_pending = false;
        self.apply(current);
    }
}
