use std::collections::BTreeSet;
use std::future::Future;
use futures::StreamExt;
use futures::channel::mpsc::{channel, Receiver, Sender};
use btleplug::api::{Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::time::{interval, sleep, timeout, Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::types::LinkConfig;
use crate::device::connector::{PeripheralConnector, SessionReporter};
use crate::device::constants::{IS_CONNECTED_DEADLINE, SCAN_POLL_DELAY};
use crate::device::types::{ConnectOutcome, ConnectRequest, ErrorKind};
use crate::error::ConnectorError;

#[derive(Debug)]
enum SessionCommand {
    Write(Vec<u8>),
}

struct BtleSession {
    sequence: u64,
    cancel: CancellationToken,
    commands: Sender<SessionCommand>,
    reporter: SessionReporter,
}

/// The connected printer and the characteristics the session talks to.
struct PrinterPeripheral {
    peripheral: Peripheral,
    write_char: Characteristic,
    notify_char: Option<Characteristic>,
}

/// `PeripheralConnector` on top of btleplug. Each session runs in its own task on
/// `runtime`, which scans for the printer, connects, then forwards notifications and
/// writes until the session is cancelled or the printer goes away.
pub struct BtleConnector {
    runtime: Handle,
    config: LinkConfig,
    session: Option<BtleSession>,
}

impl BtleConnector {
    pub fn new(runtime: Handle, config: LinkConfig) -> Self {
        BtleConnector { runtime, config, session: None }
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Cancelling bluetooth session {}", session.sequence);
            session.cancel.cancel();
        }
    }
}

impl PeripheralConnector for BtleConnector {
    fn connect(&mut self, request: ConnectRequest, reporter: SessionReporter) {
        self.stop_session();

        let cancel = CancellationToken::new();
        let (commands, command_receiver) = channel::<SessionCommand>(16);

        self.session = Some(BtleSession {
            sequence: request.sequence,
            cancel: cancel.clone(),
            commands,
            reporter: reporter.clone(),
        });

        let config = self.config.clone();
        self.runtime.spawn(async move {
            run_session(config, request, reporter, cancel, command_receiver).await
        });
    }

    fn disconnect(&mut self) {
        self.stop_session();
    }

    fn write(&mut self, sequence: u64, data: Vec<u8>) {
        let session = match self.session.as_mut() {
            Some(session) if session.sequence == sequence => session,
            _ => {
                warn!("Write for session {} without a running bluetooth session", sequence);
                return;
            },
        };

        if let Err(err) = session.commands.try_send(SessionCommand::Write(data)) {
            warn!("Failed to queue write: {:?}", err);
            // the link is locked while we are called; report from another task
            let reporter = session.reporter.clone();
            self.runtime.spawn(async move {
                reporter.error(ErrorKind::WriteFailed, "write queue is full or closed");
            });
        }
    }
}

impl Drop for BtleConnector {
    fn drop(&mut self) {
        self.stop_session();
    }
}

fn matches_peripheral_id(wanted: &str, address: &str, local_name: Option<&str>) -> bool {
    address.eq_ignore_ascii_case(wanted) || local_name == Some(wanted)
}

async fn start_scanning(manager: &Manager) -> Result<Vec<Adapter>, ConnectorError> {
    let adapters = manager.adapters().await?;
    if adapters.is_empty() {
        return Err(ConnectorError::NoAdapter);
    }

    for adapter in &adapters {
        info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        // printers often do not advertise their service, so no service filter here
        adapter.start_scan(ScanFilter::default()).await?;
    }

    Ok(adapters)
}

async fn stop_scanning(adapters: &Vec<Adapter>) {
    for adapter in adapters {
        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scanning: {:?}", err);
        }
    }
}

async fn find_peripheral(adapters: &Vec<Adapter>, peripheral_id: &str) -> Option<Peripheral> {
    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {
                    debug!("Peripheral has no properties");
                },
                Ok(Some(properties)) => {
                    let address = properties.address.to_string();
                    if matches_peripheral_id(peripheral_id, &address, properties.local_name.as_deref()) {
                        info!(
                            "Using peripheral {} {:?} {}",
                            properties.address,
                            properties.address_type,
                            properties.local_name.unwrap_or(String::from("NONE")),
                        );
                        return Some(peripheral);
                    }
                },
            }
        }
    }

    None
}

#[derive(Debug, PartialEq, Eq)]
enum ScanEnd<T> {
    Found(T),
    Expired,
    Cancelled,
}

/// Calls `find` every `SCAN_POLL_DELAY` until it yields something, `deadline` passes
/// or `cancel` fires.
async fn poll_for<T, F, Fut>(deadline: Instant, cancel: &CancellationToken, mut find: F) -> ScanEnd<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    loop {
        if cancel.is_cancelled() {
            return ScanEnd::Cancelled;
        }
        if let Some(found) = find().await {
            return ScanEnd::Found(found);
        }
        if Instant::now() >= deadline {
            return ScanEnd::Expired;
        }

        tokio::select! {
            _ = cancel.cancelled() => return ScanEnd::Cancelled,
            _ = sleep(Duration::from_millis(SCAN_POLL_DELAY)) => {},
        }
    }
}

/// `Ok(None)` when the session was cancelled while scanning.
async fn scan_for_printer(
    config: &LinkConfig,
    peripheral_id: &str,
    cancel: &CancellationToken,
) -> Result<Option<Peripheral>, ConnectorError> {
    let manager = Manager::new().await?;
    let adapters = start_scanning(&manager).await?;
    let deadline = Instant::now() + config.scan_deadline();

    let adapters_ref = &adapters;
    let end = poll_for(deadline, cancel, move || find_peripheral(adapters_ref, peripheral_id)).await;

    // every way out of the scan, cancellation included, stops the adapters
    stop_scanning(&adapters).await;

    match end {
        ScanEnd::Found(peripheral) => Ok(Some(peripheral)),
        ScanEnd::Cancelled => Ok(None),
        ScanEnd::Expired => Err(ConnectorError::PeripheralNotFound(peripheral_id.to_string())),
    }
}

fn pick_characteristic(characteristics: &BTreeSet<Characteristic>, config: &LinkConfig, uuid: uuid::Uuid) -> Option<Characteristic> {
    characteristics
        .iter()
        .find(|characteristic| characteristic.uuid == uuid && characteristic.service_uuid == config.service_uuid)
        .or_else(|| characteristics.iter().find(|characteristic| characteristic.uuid == uuid))
        .cloned()
}

async fn connect_printer(peripheral: Peripheral, config: &LinkConfig) -> Result<PrinterPeripheral, ConnectorError> {
    info!("Connecting to printer...");
    peripheral.connect().await?;

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;

    let characteristics = peripheral.characteristics();
    let write_char = pick_characteristic(&characteristics, config, config.write_characteristic_uuid)
        .ok_or(ConnectorError::MissingCharacteristic)?;

    let notify_char = match config.notify_characteristic_uuid {
        Some(uuid) => pick_characteristic(&characteristics, config, uuid),
        None => None,
    };

    match &notify_char {
        Some(characteristic) => {
            info!("Subscribing to characteristic {:?} {:?}", characteristic.service_uuid, characteristic.uuid);
            peripheral.subscribe(characteristic).await?;
        },
        None => info!("Printer has no notify characteristic; inbound data is not available"),
    }

    Ok(PrinterPeripheral { peripheral, write_char, notify_char })
}

async fn write_to_printer(printer: &PrinterPeripheral, config: &LinkConfig, data: &[u8]) -> Result<(), String> {
    let write_type = if printer.write_char.properties.contains(CharPropFlags::WRITE) {
        WriteType::WithResponse
    } else {
        WriteType::WithoutResponse
    };

    for chunk in data.chunks(config.write_chunk_size()) {
        let fut = printer.peripheral.write(&printer.write_char, chunk, write_type);

        tokio::select! {
            _ = sleep(config.write_deadline()) => {
                return Err("Sending to write characteristic took too long".to_string());
            }
            result = fut => {
                if let Err(err) = result {
                    return Err(format!("Failed to send to write characteristic: {}", err));
                }
            }
        };
    }

    Ok(())
}

// false when the printer should be considered gone
async fn check_connected(peripheral: &Peripheral) -> bool {
    tokio::select! {
        _ = sleep(Duration::from_millis(IS_CONNECTED_DEADLINE)) => {
            warn!("Checking for connection status took too long");
            false
        }
        result = peripheral.is_connected() => match result {
            Err(err) => {
                warn!("Error checking for connection state: {:?}", err);
                false
            },
            Ok(connected) => connected,
        }
    }
}

async fn serve_printer(
    printer: &PrinterPeripheral,
    config: &LinkConfig,
    reporter: &SessionReporter,
    cancel: &CancellationToken,
    commands: &mut Receiver<SessionCommand>,
) {
    let mut notifications = match printer.peripheral.notifications().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!("Failed to open notification stream: {:?}", err);
            reporter.connection_lost();
            return;
        },
    };
    let notify_uuid = printer.notify_char.as_ref().map(|characteristic| characteristic.uuid);
    let mut poll = interval(config.poll_delay());

    'mainloop: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break 'mainloop;
            },
            Some(notification) = notifications.next() => {
                if Some(notification.uuid) == notify_uuid {
                    reporter.data(notification.value);
                }
            },
            Some(command) = commands.next() => {
                match command {
                    SessionCommand::Write(data) => {
                        if let Err(message) = write_to_printer(printer, config, &data).await {
                            warn!("{}", message);
                            reporter.error(ErrorKind::WriteFailed, message);
                        }
                    },
                }
            },
            _ = poll.tick() => {
                if !check_connected(&printer.peripheral).await {
                    warn!("Connection lost");
                    reporter.connection_lost();
                    return;
                }
            },
        }
    }
}

async fn run_session(
    config: LinkConfig,
    request: ConnectRequest,
    reporter: SessionReporter,
    cancel: CancellationToken,
    mut commands: Receiver<SessionCommand>,
) {
    let peripheral = match scan_for_printer(&config, &request.peripheral_id, &cancel).await {
        Ok(Some(peripheral)) => peripheral,
        Ok(None) => {
            debug!("Bluetooth session {} cancelled while scanning", request.sequence);
            return;
        },
        Err(err) => {
            warn!("Finding printer failed: {:?}", err);
            reporter.resolve(ConnectOutcome::failure(err.kind(), err.to_string()));
            return;
        },
    };

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            let _ = peripheral.disconnect().await;
            return;
        },
        result = timeout(config.connect_deadline(), connect_printer(peripheral.clone(), &config)) => result,
    };

    let printer = match connected {
        Err(_) => {
            warn!("Connecting to printer took too long");
            let _ = peripheral.disconnect().await;
            reporter.resolve(ConnectOutcome::Timeout);
            return;
        },
        Ok(Err(err)) => {
            warn!("Connecting to printer failed: {:?}", err);
            let _ = peripheral.disconnect().await;
            reporter.resolve(ConnectOutcome::failure(err.kind(), err.to_string()));
            return;
        },
        Ok(Ok(printer)) => printer,
    };

    info!("Printer ready");
    reporter.resolve(ConnectOutcome::Success);

    serve_printer(&printer, &config, &reporter, &cancel, &mut commands).await;

    if let Err(err) = printer.peripheral.disconnect().await {
        warn!("Failed to disconnect from printer: {:?}", err);
    }
    info!("Bluetooth session {} stopped", request.sequence);
}
