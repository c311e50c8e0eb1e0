use std::any::TypeId;
use std::convert::Infallible;
use std::sync::Arc;
use futures::channel::mpsc::Sender;
use futures::SinkExt;
use iced::{Alignment, Application, Command, Element, Length, Settings, Size, Subscription, window};
use iced::event::{self, Event};
use iced::font::{Font, Weight};
use iced::subscription;
use iced::theme::{self, Theme};
use iced::widget::{Column, button, column, container, horizontal_rule, scrollable, text, text_input};
use log::{error, info};
use tokio::sync::watch;

use crate::config::io::ConfigIO;
use crate::config::types::Config;
use crate::device::btle::BtleBackend;
use crate::device::permission::PlatformPermissions;
use crate::error::AppRunError;
use crate::gui::executor::AppExecutor;
use crate::gui::style::DeviceEntryStyleSheet;
use crate::gui::types::{Controller, Message, SessionView};
use crate::session::controller::SessionController;
use crate::session::state::SessionState;

const BOLD: Font = Font {
    weight: Weight::Bold,
    ..Font::DEFAULT
};

async fn watch_session(mut receiver: watch::Receiver<SessionState>, mut output: Sender<SessionState>) -> Infallible {
    loop {
        if receiver.changed().await.is_err() {
            // the controller is gone, nothing will change anymore
            return futures::future::pending::<Infallible>().await;
        }

        let state = receiver.borrow_and_update().clone();
        if let Err(err) = output.send(state).await {
            error!("Failed to forward session state: {}", err);
        }
    }
}

fn session_subscription(controller: &Controller) -> Subscription<SessionState> {
    struct SessionWatch;

    let receiver = controller.subscribe();

    subscription::channel(
        TypeId::of::<SessionWatch>(),
        64,
        move |output| watch_session(receiver, output),
    )
}

pub struct ApplicationFlags {
    config_io: ConfigIO,
}

pub struct MyApplication {
    // messages that the user must click away
    notices: Vec<String>,

    config_io: ConfigIO,

    // created once the config has been loaded, lives until the window is closed
    controller: Option<Arc<Controller>>,

    session: SessionView,
}

impl MyApplication {
    fn load_config(&self) -> Command<Message> {
        let config_io = self.config_io.clone();

        let fut = async move {
            match config_io.read().await {
                Ok(config) => (config, None),
                Err(err) => {
                    error!("Failed to load config: {:?}", &err);
                    (Config::default(), Some(format!("Failed to load config: {}", &err)))
                }
            }
        };

        Command::perform(fut, Message::ConfigLoadComplete)
    }

    fn create_controller(&self, config: Config) -> Command<Message> {
        let fut = async move {
            match BtleBackend::new(config.adapter.as_deref()).await {
                Ok(backend) => Ok(Arc::new(SessionController::new(
                    Arc::new(backend),
                    PlatformPermissions,
                    config.scan_duration(),
                ))),
                Err(err) => {
                    error!("Failed to initialize bluetooth: {:?}", &err);
                    Err(format!("Bluetooth is not available: {}", &err))
                },
            }
        };

        Command::perform(fut, Message::ControllerReady)
    }

    fn scan_devices(&self) -> Command<Message> {
        let Some(controller) = self.controller.clone() else {
            return Command::none();
        };

        let fut = async move {
            match controller.scan_devices().await {
                // the scan runs on, its progress arrives through the session subscription
                Ok(_scan) => None,
                Err(err) => err.notice(),
            }
        };

        Command::perform(fut, Message::ScanStarted)
    }

    fn connect_to_device(&self) -> Command<Message> {
        let Some(controller) = self.controller.clone() else {
            return Command::none();
        };
        let target_id = self.session.target_id().to_string();

        let fut = async move {
            match controller.connect_to_device(&target_id).await {
                Ok(_) => None,
                Err(err) => {
                    error!("Connection error: {}", err);
                    err.notice()
                },
            }
        };

        Command::perform(fut, Message::ConnectComplete)
    }

    fn set_target(&mut self, target_id: String) {
        self.session.set_target(target_id.clone());
        if let Some(controller) = &self.controller {
            controller.set_target(target_id);
        }
    }

    fn release(&mut self, id: window::Id) -> Command<Message> {
        match self.controller.take() {
            None => window::close(id),
            Some(controller) => Command::perform(
                async move {
                    controller.shutdown().await;
                    id
                },
                Message::ReleaseComplete,
            ),
        }
    }

    fn notice_view(&self, notice: &str) -> Element<Message> {
        container(
            column![
                text(notice),

                button(text("Okay"))
                    .on_press(Message::NoticeConfirmed),

            ].align_items(Alignment::Center).spacing(20),
        )
        .width(Length::Fill)
        .padding(20)
        .into()
    }
}

impl Application for MyApplication {
    type Executor = AppExecutor;
    type Message = Message;
    type Theme = Theme;
    type Flags = ApplicationFlags;

    fn new(flags: ApplicationFlags) -> (MyApplication, Command<Self::Message>) {
        let app = MyApplication {
            notices: Vec::new(),
            config_io: flags.config_io,
            controller: None,
            session: SessionView::default(),
        };

        let command = app.load_config();
        (app, command)
    }

    fn title(&self) -> String {
        String::from(concat!("BLE Monitor ", env!("CARGO_PKG_VERSION")))
    }

    fn update(&mut self, message: Message) -> Command<Self::Message> {
        match message {
            Message::ConfigLoadComplete((config, error_message)) => {
                info!("Config load complete");
                if let Some(error_message) = error_message {
                    self.notices.push(error_message);
                }
                return self.create_controller(config);
            },
            Message::ControllerReady(Ok(controller)) => {
                info!("Bluetooth ready");
                self.session.apply(controller.state());
                let target_id = self.session.target_id().to_string();
                self.controller = Some(controller);
                self.set_target(target_id);
            },
            Message::ControllerReady(Err(error_message)) => {
                self.notices.push(error_message);
            },
            Message::SessionUpdate(state) => {
                self.session.apply(state);
            },
            Message::ScanPress => {
                if self.controller.is_some() && self.session.request_scan() {
                    return self.scan_devices();
                }
            },
            Message::ConnectPress => {
                return self.connect_to_device();
            },
            Message::ScanStarted(notice) => {
                if let Some(controller) = &self.controller {
                    self.session.scan_answered(controller.state());
                }
                if let Some(notice) = notice {
                    self.notices.push(notice);
                }
            },
            Message::ConnectComplete(notice) => {
                if let Some(notice) = notice {
                    self.notices.push(notice);
                }
            },
            Message::TargetInput(target_id) | Message::DeviceSelected(target_id) => {
                self.set_target(target_id);
            },
            Message::NoticeConfirmed => {
                if !self.notices.is_empty() {
                    self.notices.remove(0);
                }
            },
            Message::EventOccurred(Event::Window(id, window::Event::CloseRequested)) => {
                info!("Close requested");
                return self.release(id);
            },
            Message::ReleaseComplete(id) => {
                return window::close(id);
            },
            Message::EventOccurred(_) => {},
        }

        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let mut subscriptions = vec![event::listen().map(Message::EventOccurred)];

        if let Some(controller) = &self.controller {
            subscriptions.push(session_subscription(controller).map(Message::SessionUpdate));
        }

        Subscription::batch(subscriptions)
    }

    fn view(&self) -> Element<Message> {
        if let Some(notice) = self.notices.first() {
            return self.notice_view(notice);
        }

        let ready = self.controller.is_some();
        let scanning = self.session.is_scanning();
        let session = self.session.state();

        let mut scan_button = button(text(if scanning { "Scanning..." } else { "Scan Devices" }));
        if ready && !scanning {
            scan_button = scan_button.on_press(Message::ScanPress);
        }

        let busy_indicator = if scanning {
            text("Scanning for nearby BLE devices…")
        } else if !ready {
            text("Waiting for bluetooth…")
        } else {
            text("")
        };

        let device_list = Column::with_children(
            session.devices.values().map(|device| {
                button(
                    column![
                        text(device.display_name()).font(BOLD),
                        text(&device.id).size(14),
                    ].spacing(2),
                )
                    .width(Length::Fill)
                    .padding(10)
                    .style(theme::Button::Custom(Box::new(DeviceEntryStyleSheet {
                        connected: session.is_connected_device(&device.id),
                    })))
                    .on_press(Message::DeviceSelected(device.id.clone()))
                    .into()
            })
        ).spacing(5);

        let mut connect_button = button(text("Connect to Device"));
        if ready {
            connect_button = connect_button.on_press(Message::ConnectPress);
        }

        let data = if session.data.is_empty() { "No data yet." } else { session.data.as_str() };

        scrollable(
            container(
                column![
                    text("Nearby BLE Devices").size(24).font(BOLD),
                    scan_button,
                    busy_indicator,
                    device_list,

                    horizontal_rule(10),

                    text("Device Address to Connect:").font(BOLD),
                    text_input("Paste or tap to autofill from list", &session.target_id)
                        .on_input(Message::TargetInput)
                        .padding(10),
                    connect_button,

                    horizontal_rule(10),

                    text("Received Data:").font(BOLD),
                    text(data),
                ]
                    .spacing(10)
                    .width(Length::Fill),
            )
            .width(Length::Fill)
            .padding(20),
        )
        .into()
    }
}

pub fn run_application() -> Result<(), AppRunError> {
    let config_io = ConfigIO::new_sync()?;
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let flags = ApplicationFlags { config_io };
    let mut settings = Settings::with_flags(flags);

    // handle exits ourselves (Event::CloseRequested), so that bluetooth is released first
    settings.id = Some("ble-monitor".to_string());
    settings.window.exit_on_close_request = false;
    settings.window.size = Size::new(480.0, 760.0);

    // this function will call process::exit() unless there was a startup error
    MyApplication::run(settings)?;
    Ok(())
}
