//! Serial transport for the kick-pad controller.
//!
//! `serialport` is blocking, so reads run on a dedicated thread that forwards raw chunks to the
//! async side through a bounded channel. Writes are rare (sensitivity changes) and go through
//! `spawn_blocking`.

use std::{
    io::{ErrorKind, Read, Write},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::packet::ControlPacket;

const READ_TIMEOUT: Duration = Duration::from_millis(50);
const READ_BUFFER_LEN: usize = 256;
const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// Failures raised by the serial transport.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The port could not be opened or configured.
    #[error("failed to open serial port `{path}`")]
    Open {
        /// Port path that was requested.
        path: String,
        /// Driver error.
        #[source]
        source: serialport::Error,
    },
    /// Duplicating the port handle for the writer failed.
    #[error("failed to clone serial port handle")]
    Clone {
        /// Driver error.
        #[source]
        source: serialport::Error,
    },
    /// Reading from the port failed; the link is gone.
    #[error("serial read failed")]
    Read {
        /// I/O error from the port.
        #[source]
        source: std::io::Error,
    },
    /// Writing a control packet failed.
    #[error("serial write failed")]
    Write {
        /// I/O error from the port.
        #[source]
        source: std::io::Error,
    },
    /// No device is currently connected.
    #[error("no serial device connected")]
    NotConnected,
    /// The writer lock was poisoned by a panicking writer.
    #[error("serial writer unavailable")]
    WriterPoisoned,
}

/// Where and how to open the controller.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Port path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    /// Line speed; the controller talks at 115200 baud.
    pub baud_rate: u32,
}

/// Message forwarded from the reader thread.
pub type DeviceChunk = Result<Vec<u8>, DeviceError>;

/// Open connection to the controller: an inbound chunk stream plus a writer.
pub struct SerialLink {
    chunks: mpsc::Receiver<DeviceChunk>,
    writer: SerialWriter,
    shutdown: Arc<AtomicBool>,
}

impl SerialLink {
    /// Open the port and start the reader thread.
    pub fn open(settings: &SerialSettings) -> Result<Self, DeviceError> {
        let port = serialport::new(&settings.path, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| DeviceError::Open {
                path: settings.path.clone(),
                source,
            })?;

        let write_port = port
            .try_clone()
            .map_err(|source| DeviceError::Clone { source })?;

        info!(path = %settings.path, baud = settings.baud_rate, "opened serial port");

        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let reader_shutdown = shutdown.clone();
        thread::Builder::new()
            .name("kick-pad-reader".into())
            .spawn(move || reader_loop(port, tx, reader_shutdown))
            .map_err(|source| DeviceError::Read { source })?;

        Ok(Self {
            chunks: rx,
            writer: SerialWriter {
                port: Arc::new(Mutex::new(write_port)),
            },
            shutdown,
        })
    }

    /// Split into the chunk receiver and a cloneable writer.
    ///
    /// The returned guard stops the reader thread when dropped.
    pub fn into_parts(self) -> (mpsc::Receiver<DeviceChunk>, SerialWriter, ReaderGuard) {
        (
            self.chunks,
            self.writer,
            ReaderGuard {
                shutdown: self.shutdown,
            },
        )
    }
}

/// Stops the reader thread on drop.
pub struct ReaderGuard {
    shutdown: Arc<AtomicBool>,
}

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

/// Cloneable handle writing control packets to the controller.
#[derive(Clone)]
pub struct SerialWriter {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl SerialWriter {
    /// Write a control packet without blocking the async executor.
    pub async fn send(&self, packet: ControlPacket) -> Result<(), DeviceError> {
        let port = self.port.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = port.lock().map_err(|_| DeviceError::WriterPoisoned)?;
            guard
                .write_all(packet.as_bytes())
                .and_then(|_| guard.flush())
                .map_err(|source| DeviceError::Write { source })
        })
        .await
        .map_err(|err| DeviceError::Write {
            source: std::io::Error::other(err),
        })?
    }
}

/// Forward chunks read from `port` until shutdown, end of stream, or a read error.
fn reader_loop<R: Read>(
    mut port: R,
    tx: mpsc::Sender<DeviceChunk>,
    shutdown: Arc<AtomicBool>,
) {
    let mut buffer = [0u8; READ_BUFFER_LEN];

    while !shutdown.load(Ordering::Relaxed) {
        match port.read(&mut buffer) {
            Ok(0) => {
                info!("serial port reported end of stream; closing link");
                break;
            }
            Ok(n) => {
                if tx.blocking_send(Ok(buffer[..n].to_vec())).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                warn!(error = %source, "serial read failed; closing link");
                let _ = tx.blocking_send(Err(DeviceError::Read { source }));
                break;
            }
        }
    }

    debug!("serial reader thread exiting");
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    struct BrokenPort;

    impl Read for BrokenPort {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
        }
    }

    #[test]
    fn end_of_stream_closes_the_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = Arc::new(AtomicBool::new(false));
        let port = Cursor::new(vec![0xAA, 0xBB]);
        let reader = thread::spawn(move || reader_loop(port, tx, shutdown));

        assert_eq!(rx.blocking_recv().unwrap().unwrap(), vec![0xAA, 0xBB]);
        assert!(rx.blocking_recv().is_none());
        reader.join().unwrap();
    }

    #[test]
    fn read_error_is_forwarded_before_closing() {
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = Arc::new(AtomicBool::new(false));
        let reader = thread::spawn(move || reader_loop(BrokenPort, tx, shutdown));

        assert!(matches!(
            rx.blocking_recv(),
            Some(Err(DeviceError::Read { .. }))
        ));
        assert!(rx.blocking_recv().is_none());
        reader.join().unwrap();
    }

    #[test]
    fn shutdown_flag_stops_the_reader() {
        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = Arc::new(AtomicBool::new(true));
        reader_loop(Cursor::new(vec![1, 2, 3]), tx, shutdown);

        assert!(rx.blocking_recv().is_none());
    }
}
