use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::spawn;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::device::backend::{BleBackend, BleConnection, NotificationStream, ScanStream};
use crate::device::permission::{ensure_permissions, PermissionGate, PlatformPermissions};
use crate::error::{DeviceError, SessionError};
use crate::session::state::{reduce, SessionEvent, SessionState};

type StateSender = Arc<watch::Sender<SessionState>>;

fn dispatch(state: &StateSender, event: SessionEvent) {
    state.send_modify(move |current| {
        let previous = std::mem::take(current);
        *current = reduce(previous, event);
    });
}

enum ScanOutcome {
    Elapsed,
    Failed(DeviceError),
    Released,
}

/// Drives one scan session: forwards reports into the state until the window elapses or the
/// backend reports an error, then ends the scan and stops discovery.
fn scan_task<B: BleBackend>(
    backend: Arc<B>,
    state: StateSender,
    cancel: CancellationToken,
    scan_id: u64,
    deadline: Instant,
    mut scan: ScanStream,
) -> JoinHandle<()> {
    spawn(async move {
        let window = sleep_until(deadline);
        tokio::pin!(window);

        let outcome = 'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop ScanOutcome::Released;
                },
                _ = &mut window => {
                    break 'mainloop ScanOutcome::Elapsed;
                },
                report = scan.next() => match report {
                    Some(Ok(device)) => {
                        dispatch(&state, SessionEvent::DeviceDiscovered { scan_id, device });
                    },
                    Some(Err(err)) => {
                        break 'mainloop ScanOutcome::Failed(err);
                    },
                    None => {
                        // no more reports, but the window still decides when scanning ends
                        tokio::select! {
                            _ = cancel.cancelled() => break 'mainloop ScanOutcome::Released,
                            _ = &mut window => break 'mainloop ScanOutcome::Elapsed,
                        }
                    },
                },
            }
        };

        // the window is over even if the radio takes a while to stop
        dispatch(&state, SessionEvent::ScanEnded { scan_id });

        match outcome {
            ScanOutcome::Elapsed => {
                if let Err(err) = backend.stop_scan().await {
                    warn!("Failed to stop scan: {}", err);
                }
                info!("Scan complete");
            },
            ScanOutcome::Failed(source) => {
                error!("{}", SessionError::ScanTransport { source });
                if let Err(err) = backend.stop_scan().await {
                    debug!("Failed to stop failed scan: {}", err);
                }
            },
            ScanOutcome::Released => {
                debug!("Scan abandoned, bluetooth released");
            },
        }
    })
}

fn forward_notifications<C: BleConnection>(
    connection: Arc<C>,
    state: StateSender,
    cancel: CancellationToken,
    mut notifications: NotificationStream,
) -> JoinHandle<()> {
    spawn(async move {
        // the subscription lives as long as this task
        let _connection = connection;

        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                delivery = notifications.next() => match delivery {
                    Some(Ok(record)) => dispatch(&state, SessionEvent::Notification(record)),
                    Some(Err(source)) => debug!("{}", SessionError::NotificationDelivery { source }),
                    None => break 'mainloop,
                },
            }
        }
    })
}

/// Owns the bluetooth backend for the lifetime of the process and keeps the session state
/// that the presentation layer renders.
pub struct SessionController<B: BleBackend, P: PermissionGate = PlatformPermissions> {
    backend: Arc<B>,
    permissions: P,
    state: StateSender,
    scan_duration: Duration,
    last_scan_id: AtomicU64,
    // cancelled by shutdown()
    cancel: CancellationToken,
}

impl<B: BleBackend, P: PermissionGate> SessionController<B, P> {
    pub fn new(backend: Arc<B>, permissions: P, scan_duration: Duration) -> Self {
        let (state, _) = watch::channel(SessionState::default());

        SessionController {
            backend,
            permissions,
            state: Arc::new(state),
            scan_duration,
            last_scan_id: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Every state change is published to the returned receiver.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn set_target(&self, target_id: String) {
        dispatch(&self.state, SessionEvent::TargetChanged(target_id));
    }

    /// Resets the session and scans for the configured window. Returns once discovery is
    /// running; the returned handle completes when the scan has ended.
    pub async fn scan_devices(&self) -> Result<JoinHandle<()>, SessionError> {
        ensure_permissions(&self.permissions).await?;

        let scan_id = self.last_scan_id.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + self.scan_duration;

        info!("Scanning for nearby BLE devices...");
        let scan = match self.backend.start_scan().await {
            Ok(scan) => scan,
            Err(err) if err.is_permission_denied() => {
                warn!("Scanning not allowed: {}", err);
                return Err(SessionError::PermissionDenied);
            },
            Err(source) => {
                let err = SessionError::ScanTransport { source };
                error!("{}", err);
                dispatch(&self.state, SessionEvent::ScanStarted { scan_id });
                dispatch(&self.state, SessionEvent::ScanEnded { scan_id });
                return Err(err);
            },
        };

        dispatch(&self.state, SessionEvent::ScanStarted { scan_id });

        Ok(scan_task(
            self.backend.clone(),
            self.state.clone(),
            self.cancel.clone(),
            scan_id,
            deadline,
            scan,
        ))
    }

    /// Connects to `target_id`, discovers its services and subscribes to every notifiable
    /// characteristic. Returns the id of the connected device.
    pub async fn connect_to_device(&self, target_id: &str) -> Result<String, SessionError> {
        ensure_permissions(&self.permissions).await?;

        let connection = self.backend.connect(target_id).await
            .map_err(|source| SessionError::ConnectionFailure { source })?;
        connection.discover_services().await
            .map_err(|source| SessionError::ConnectionFailure { source })?;

        let device_id = connection.id();
        dispatch(&self.state, SessionEvent::Connected { device_id: device_id.clone() });
        info!("Connected to device: {}", device_id);

        let connection = Arc::new(connection);
        // a notification only names its characteristic uuid, so each uuid is monitored once
        let mut monitored = HashSet::new();
        for service in connection.services() {
            for characteristic in service.characteristics.iter().filter(|c| c.is_notifiable) {
                if !monitored.insert(characteristic.uuid) {
                    debug!("Characteristic {:?} is already monitored", characteristic.uuid);
                    continue;
                }

                match connection.monitor(characteristic).await {
                    Ok(notifications) => {
                        info!("Subscribed to characteristic {:?} {:?}", service.uuid, characteristic.uuid);
                        forward_notifications(
                            connection.clone(),
                            self.state.clone(),
                            self.cancel.clone(),
                            notifications,
                        );
                    },
                    Err(err) => {
                        warn!("Failed to subscribe to characteristic {:?} {:?}: {}", service.uuid, characteristic.uuid, err);
                    },
                }
            }
        }

        Ok(device_id)
    }

    /// Releases the bluetooth backend. The controller must not be used afterwards.
    pub async fn shutdown(&self) {
        info!("Releasing bluetooth");
        self.cancel.cancel();
        self.backend.release().await;
    }
}

impl<B: BleBackend, P: PermissionGate> fmt::Debug for SessionController<B, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &*self.state.borrow())
            .field("scan_duration", &self.scan_duration)
            .finish_non_exhaustive()
    }
}
