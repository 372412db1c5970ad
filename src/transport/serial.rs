//! USB/UART transport for Meshtastic radios using the wired stream protocol.

use bytes::Bytes;
use log::{debug, info, trace, warn};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

use super::framing::{encode_frame, StreamFramer};
use super::{
    ConnectFailure, DeviceId, DiscoveredDevice, LinkChannel, Transport, TransportError,
    TransportEvent,
};
use crate::logutil::hex_snippet;

/// Serial link. The device id is the port name (`/dev/ttyUSB0`, `COM3`).
pub struct SerialTransport {
    default_port: String,
    baud_rate: u32,
    events: UnboundedSender<TransportEvent>,
    port: Option<Box<dyn SerialPort>>,
    stop: Arc<AtomicBool>,
}

impl SerialTransport {
    pub fn new(
        default_port: impl Into<String>,
        baud_rate: u32,
        events: UnboundedSender<TransportEvent>,
    ) -> Self {
        Self {
            default_port: default_port.into(),
            baud_rate,
            events,
            port: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    fn open(&self, port_name: &str) -> Result<Box<dyn SerialPort>, TransportError> {
        let mut builder =
            serialport::new(port_name, self.baud_rate).timeout(Duration::from_millis(500));
        // Some USB serial adapters need explicit settings
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder.open()?;
        // Toggle DTR/RTS to wake ESP32 based boards
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        // Clear any buffered startup text
        let mut purge_buf = [0u8; 512];
        if let Ok(available) = port.bytes_to_read() {
            if available > 0 {
                let _ = port.read(&mut purge_buf);
            }
        }
        Ok(port)
    }

    fn spawn_reader(&self, mut reader: Box<dyn SerialPort>) {
        let events = self.events.clone();
        let stop = self.stop.clone();
        tokio::task::spawn_blocking(move || {
            let mut framer = StreamFramer::new();
            let mut buffer = [0u8; 1024];
            while !stop.load(Ordering::Relaxed) {
                match reader.read(&mut buffer) {
                    Ok(0) => continue,
                    Ok(n) => {
                        trace!("RAW {} bytes: {}", n, hex_snippet(&buffer[..n], 64));
                        for frame in framer.push(&buffer[..n]) {
                            let event = TransportEvent::Frame {
                                channel: LinkChannel::FromRadio,
                                bytes: Bytes::from(frame),
                            };
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        if !stop.load(Ordering::Relaxed) {
                            warn!("Serial read failed: {}", e);
                            let _ = events.send(TransportEvent::Disconnected(Some(e.to_string())));
                        }
                        return;
                    }
                }
            }
            debug!("Serial reader stopped");
        });
    }
}

impl Transport for SerialTransport {
    fn start_scan(&mut self) {
        let mut seen_default = false;
        match serialport::available_ports() {
            Ok(ports) => {
                for p in ports {
                    seen_default |= p.port_name == self.default_port;
                    let _ = self.events.send(TransportEvent::Discovered(DiscoveredDevice {
                        id: DeviceId(p.port_name.clone()),
                        name: p.port_name,
                        rssi: None,
                    }));
                }
            }
            Err(e) => debug!("Serial port enumeration failed: {}", e),
        }
        if !seen_default {
            let _ = self.events.send(TransportEvent::Discovered(DiscoveredDevice {
                id: DeviceId(self.default_port.clone()),
                name: self.default_port.clone(),
                rssi: None,
            }));
        }
    }

    fn stop_scan(&mut self) {}

    fn connect(&mut self, device: &DeviceId) {
        self.disconnect_quietly();
        info!("Opening serial port {} at {} baud", device, self.baud_rate);
        let opened = self
            .open(&device.0)
            .and_then(|port| Ok((port.try_clone()?, port)));
        match opened {
            Ok((reader, writer)) => {
                self.stop = Arc::new(AtomicBool::new(false));
                self.spawn_reader(reader);
                self.port = Some(writer);
                let _ = self.events.send(TransportEvent::Connected(device.clone()));
                let _ = self.events.send(TransportEvent::ChannelsResolved);
            }
            Err(e) => {
                let _ = self.events.send(TransportEvent::ConnectFailed {
                    device: device.clone(),
                    cause: ConnectFailure::Other(e.to_string()),
                });
            }
        }
    }

    fn disconnect(&mut self) {
        if self.disconnect_quietly() {
            let _ = self.events.send(TransportEvent::Disconnected(None));
        }
    }

    fn write(&mut self, channel: LinkChannel, bytes: &[u8]) -> Result<(), TransportError> {
        if channel != LinkChannel::ToRadio {
            return Err(TransportError::WriteFailed(format!(
                "channel {:?} is not writable",
                channel
            )));
        }
        let port = self.port.as_mut().ok_or(TransportError::NotConnected)?;
        let frame = encode_frame(bytes)?;
        port.write_all(&frame)?;
        port.flush()?;
        debug!("Sent ToRadio LEN frame ({} bytes payload)", bytes.len());
        Ok(())
    }

    // The wired protocol streams every frame unprompted.
    fn subscribe(&mut self, _channel: LinkChannel) {}

    fn request_read(&mut self, _channel: LinkChannel) {}

    fn channels_resolved(&self) -> bool {
        self.port.is_some()
    }
}

impl SerialTransport {
    /// Close the port without emitting an event; returns whether one was open.
    fn disconnect_quietly(&mut self) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        self.port.take().is_some()
    }
}
