use std::future::Future;
use std::io::Write;
use futures::StreamExt;
use futures::channel::mpsc::{channel, Receiver};
use log::{error, info, warn};
use tokio::runtime::{Builder, Handle};
use tokio::time::{sleep, sleep_until, Duration, Instant};

use crate::config::io::ConfigIO;
use crate::config::types::LinkConfig;
use crate::device::bridge::ChannelSink;
use crate::device::btle::BtleConnector;
use crate::device::connector::PeripheralConnector;
use crate::device::constants::{RECONNECT_DELAY, SHUTDOWN_GRACE};
use crate::device::link::PrinterLink;
use crate::device::types::{ConnectState, Event};
use crate::error::{AppRunError, ConfigError};
use crate::host::options::HostOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    Continue,
    Reconnect,
    Stop,
}

/// Drives one printer link on behalf of the command line: connects, sends the
/// payload once connected and decides what to do when a session ends. Retrying is
/// the host's business; the link itself never retries.
pub struct PrintHost<C: PeripheralConnector + 'static> {
    link: PrinterLink<C>,
    peripheral: String,
    payload: Option<Vec<u8>>,
    reconnect: bool,
}

impl<C: PeripheralConnector + 'static> PrintHost<C> {
    pub fn new(link: PrinterLink<C>, peripheral: String, payload: Option<Vec<u8>>, reconnect: bool) -> Self {
        PrintHost { link, peripheral, payload, reconnect }
    }

    pub fn link(&self) -> &PrinterLink<C> {
        &self.link
    }

    pub fn connect(&self) -> Result<u64, AppRunError> {
        Ok(self.link.connect(&self.peripheral)?)
    }

    pub fn on_event(&mut self, event: &Event) -> HostAction {
        let state = match event {
            Event::StateChanged { state } => *state,
            Event::DataReceived { .. } => return HostAction::Continue,
            Event::Error { kind, message } => {
                warn!("Printer reported {}: {}", kind, message);
                return HostAction::Continue;
            },
        };

        match state {
            ConnectState::Connected => {
                if let Some(payload) = &self.payload {
                    info!("Sending {} bytes to printer", payload.len());
                    match self.link.write(payload) {
                        Ok(()) => self.payload = None,
                        // kept for the next session
                        Err(err) => error!("Failed to send payload: {}", err),
                    }
                }
                HostAction::Continue
            },
            state if state.is_terminal() || state == ConnectState::Disconnected => {
                if self.reconnect { HostAction::Reconnect } else { HostAction::Stop }
            },
            _ => HostAction::Continue,
        }
    }

    /// Prints events as JSON lines to `out` until `stop` resolves, the event stream
    /// ends, or a session ends without `reconnect`.
    pub async fn run<W, F>(&mut self, mut events: Receiver<Event>, out: &mut W, stop: F) -> Result<(), AppRunError>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut reconnect_at: Option<Instant> = None;

        'mainloop: loop {
            tokio::select! {
                _ = &mut stop => {
                    break 'mainloop;
                },
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    reconnect_at = None;
                    self.connect()?;
                },
                event = events.next() => {
                    let event = match event {
                        Some(event) => event,
                        None => break 'mainloop,
                    };

                    writeln!(out, "{}", serde_json::to_string(&event)?)?;
                    out.flush()?;

                    match self.on_event(&event) {
                        HostAction::Continue => {},
                        HostAction::Stop => break 'mainloop,
                        HostAction::Reconnect => {
                            info!("Reconnecting in {} ms", RECONNECT_DELAY);
                            reconnect_at = Some(Instant::now() + Duration::from_millis(RECONNECT_DELAY));
                        },
                    }
                },
            }
        }

        self.link.shutdown();
        Ok(())
    }
}

async fn load_config(config_io: &ConfigIO) -> Result<LinkConfig, ConfigError> {
    match config_io.read().await {
        Ok(config) => Ok(config),
        Err(err) if err.is_file_not_found_error() => {
            info!("Config file not found, using defaults");
            Ok(LinkConfig::default())
        },
        Err(err) => Err(err),
    }
}

async fn run_host(options: HostOptions) -> Result<(), AppRunError> {
    let config_io = match &options.config {
        Some(path) => ConfigIO::open_sync(path)?,
        None => ConfigIO::new_sync()?,
    };

    // only one instance may drive the printer at a time
    let mut locker = config_io.locker()?;
    let _guard = locker.lock()?;

    let config = load_config(&config_io).await?;

    let payload = match &options.send {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };

    let link = PrinterLink::new(BtleConnector::new(Handle::current(), config.clone()));
    let (sender, events) = channel::<Event>(config.event_channel_capacity);
    link.attach_sink(ChannelSink::new(sender));

    let mut host = PrintHost::new(link, options.peripheral.clone(), payload, options.reconnect);
    host.connect()?;

    let timeout = options.timeout;
    let stop = async move {
        let run_for = async {
            match timeout {
                Some(seconds) => sleep(Duration::from_secs(seconds)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = run_for => info!("Run time elapsed"),
            result = tokio::signal::ctrl_c() => {
                if let Err(err) = result {
                    warn!("Failed to listen for ctrl-c: {:?}", err);
                }
            },
        }
    };

    let mut stdout = std::io::stdout();
    let result = host.run(events, &mut stdout, stop).await;

    // give the bluetooth task a moment to disconnect before the runtime goes away
    sleep(Duration::from_millis(SHUTDOWN_GRACE)).await;
    result
}

pub fn run_application(options: HostOptions) -> Result<(), AppRunError> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run_host(options))
}
