//! Robot handle and connection runtime.
//!
//! [`Robot::connect`] establishes the TCP connection and spawns:
//! 1. the connection task, which exclusively owns the read half, the
//!    pending-request table, and the subscription registry
//! 2. the writer task, which exclusively owns the write half
//!
//! Callers never touch that state directly: `invoke`, `subscribe`,
//! `unsubscribe`, and `disconnect` submit messages into the connection
//! task, which interleaves them with socket reads in one `select!` loop.
//! That single-writer discipline is what makes the multiplexer race-free
//! without locks.
//!
//! # Example
//!
//! ```ignore
//! use botwire_client::{EventKey, Robot};
//!
//! #[tokio::main]
//! async fn main() -> botwire_client::Result<()> {
//!     let bot = Robot::connect("192.168.0.1:1110").await?;
//!
//!     bot.subscribe(EventKey::GpioPin(3), |event| {
//!         println!("pin 3: {:?}", event?);
//!         Ok(())
//!     })?;
//!
//!     bot.led(true, false, false).await?;
//!     let distance = bot.ultra_sensor().await?;
//!     println!("obstacle at {distance} cm");
//!
//!     bot.disconnect();
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch};

use crate::cmd::{Opcode, PinMode};
use crate::codec::MsgPackCodec;
use crate::dispatch::{EventHandler, SubscriptionRegistry};
use crate::error::{BotwireError, Result};
use crate::event::{decode_event, EventKey, EventKind, EventPayload, Position};
use crate::pending::PendingTable;
use crate::protocol::{
    Frame, FrameBuffer, FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, EVENT_CORRELATION_ID,
};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum accepted incoming payload size.
    pub max_payload_size: u32,
    /// Writer channel capacity.
    pub writer_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Lifecycle state of a handle's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket open, connection task not yet running.
    Connecting,
    /// Read loop running, commands and events flowing.
    Connected,
    /// Teardown in progress: pending requests being failed.
    Closing,
    /// Terminal. The handle cannot be revived; connect a new one.
    Disconnected,
}

/// Caller operations submitted into the connection task.
enum Op {
    Invoke {
        opcode: Opcode,
        args: Bytes,
        reply: oneshot::Sender<Result<Bytes>>,
    },
    Subscribe {
        key: EventKey,
        handler: EventHandler,
    },
    Unsubscribe {
        key: EventKey,
    },
    Disconnect,
}

/// Handle to one robot controller over one TCP connection.
///
/// Created by [`Robot::connect`]; invalidated by [`Robot::disconnect`]
/// or by a terminal connection error. All methods take `&self`; command
/// invocations may be issued concurrently and each suspends only its own
/// caller.
#[derive(Debug)]
pub struct Robot {
    ops: mpsc::UnboundedSender<Op>,
    state: watch::Receiver<ConnectionState>,
}

impl Robot {
    /// Connect to a controller at `host:port` and start the read loop.
    ///
    /// # Errors
    ///
    /// `Connect` when resolution or the TCP handshake fails; no handle
    /// is created.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with(addr, Config::default()).await
    }

    /// Connect with explicit configuration.
    pub async fn connect_with(addr: impl ToSocketAddrs, config: Config) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(BotwireError::Connect)?;
        // command frames are tiny and latency-sensitive
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let (writer, _writer_task) = spawn_writer_task(write_half, config.writer_channel_capacity);

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        tokio::spawn(connection_task(read_half, ops_rx, writer, state_tx, config));

        Ok(Self {
            ops: ops_tx,
            state: state_rx,
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection has fully torn down.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        loop {
            if *state.borrow() == ConnectionState::Disconnected {
                return;
            }
            // sender dropped means the connection task is gone
            if state.changed().await.is_err() {
                return;
            }
        }
    }

    /// Close the connection.
    ///
    /// Every pending command resolves with `Disconnected`; subscriptions
    /// drain and stop. Idempotent: repeated calls are no-ops.
    pub fn disconnect(&self) {
        let _ = self.ops.send(Op::Disconnect);
    }

    // ---- built-ins ----------------------------------------------------

    /// No-op round trip, useful as a liveness or latency probe.
    pub async fn nop(&self) -> Result<()> {
        self.invoke_unit(Opcode::Nop, &()).await
    }

    /// Time since the controller booted.
    pub async fn uptime(&self) -> Result<Duration> {
        self.invoke(Opcode::Uptime, &()).await
    }

    // ---- body ---------------------------------------------------------

    /// Drive the left and right motors, duty cycle in `[-1, 1]`.
    pub async fn drive(&self, left: f64, right: f64) -> Result<()> {
        if !(-1. ..=1.).contains(&left) || !(-1. ..=1.).contains(&right) {
            tracing::warn!(left, right, "drive values outside [-1, 1], controller will clamp");
        }
        self.invoke_unit(Opcode::Drive, &(left, right)).await
    }

    /// Set the onboard RGB led.
    pub async fn led(&self, r: bool, g: bool, b: bool) -> Result<()> {
        self.invoke_unit(Opcode::Led, &(r, g, b)).await
    }

    /// Turn the body's built-in steering servo to an absolute angle.
    pub async fn onboard_servo(&self, degree: f64) -> Result<()> {
        self.invoke_unit(Opcode::OnboardServo, &(degree,)).await
    }

    /// Drive the buzzer with the given pulse width.
    pub async fn buzzer(&self, pulse_width: f64) -> Result<()> {
        self.invoke_unit(Opcode::Buzzer, &(pulse_width,)).await
    }

    /// Read the track sensor bank, left to right.
    pub async fn track_sensors(&self) -> Result<[bool; 4]> {
        self.invoke(Opcode::TrackSensors, &()).await
    }

    /// Read the ultrasonic distance sensor.
    pub async fn ultra_sensor(&self) -> Result<f64> {
        self.invoke(Opcode::UltraSensor, &()).await
    }

    // ---- raw GPIO -----------------------------------------------------

    /// Read a GPIO pin level.
    pub async fn read_pin(&self, pin: u8) -> Result<bool> {
        self.invoke(Opcode::ReadPin, &(pin,)).await
    }

    /// Write a GPIO pin level.
    pub async fn write_pin(&self, pin: u8, value: bool) -> Result<()> {
        self.invoke_unit(Opcode::WritePin, &(pin, value)).await
    }

    /// Software PWM: frequency in hertz, duty cycle in `[0, 1]`.
    pub async fn pwm(&self, pin: u8, hz: f64, duty_cycle: f64) -> Result<()> {
        self.invoke_unit(Opcode::Pwm, &(pin, hz, duty_cycle)).await
    }

    /// Servo signal on an arbitrary pin.
    pub async fn servo(&self, pin: u8, degree: f64) -> Result<()> {
        self.invoke_unit(Opcode::Servo, &(pin, degree)).await
    }

    /// Configure a pin as input or output.
    pub async fn pin_mode(&self, pin: u8, mode: PinMode) -> Result<()> {
        self.invoke_unit(Opcode::PinMode, &(pin, mode)).await
    }

    // ---- positioning --------------------------------------------------

    /// Last known fix from the positioning service, `None` without a fix.
    pub async fn position(&self) -> Result<Option<Position>> {
        self.invoke(Opcode::Position, &()).await
    }

    // ---- events -------------------------------------------------------

    /// Register a handler for an event key, replacing any previous one.
    ///
    /// Also asks the controller to start pushing that event stream
    /// (fire-and-forget). Events that arrived before registration are
    /// not replayed. The handler runs on its own drain task: never
    /// concurrently with itself, in arrival order, and without ever
    /// blocking the read loop.
    pub fn subscribe<F>(&self, key: EventKey, handler: F) -> Result<()>
    where
        F: FnMut(Result<EventPayload>) -> Result<()> + Send + 'static,
    {
        self.ops
            .send(Op::Subscribe {
                key,
                handler: Box::new(handler),
            })
            .map_err(|_| BotwireError::Disconnected)
    }

    /// Remove a subscription and ask the controller to stop pushing the
    /// stream; no-op if nothing is registered under the key.
    pub fn unsubscribe(&self, key: EventKey) -> Result<()> {
        self.ops
            .send(Op::Unsubscribe { key })
            .map_err(|_| BotwireError::Disconnected)
    }

    // ---- plumbing -----------------------------------------------------

    /// Invoke a command and decode its reply payload.
    async fn invoke<R: DeserializeOwned>(
        &self,
        opcode: Opcode,
        args: &impl Serialize,
    ) -> Result<R> {
        let payload = self.invoke_raw(opcode, args).await?;
        MsgPackCodec::decode(&payload)
    }

    /// Invoke a command whose reply is a bare acknowledgment.
    async fn invoke_unit(&self, opcode: Opcode, args: &impl Serialize) -> Result<()> {
        let _ = self.invoke_raw(opcode, args).await?;
        Ok(())
    }

    /// Encode args, submit the invocation, and suspend until resolution.
    async fn invoke_raw(&self, opcode: Opcode, args: &impl Serialize) -> Result<Bytes> {
        let args = Bytes::from(MsgPackCodec::encode(args)?);
        let (reply, rx) = oneshot::channel();

        self.ops
            .send(Op::Invoke {
                opcode,
                args,
                reply,
            })
            .map_err(|_| BotwireError::Disconnected)?;

        rx.await.map_err(|_| BotwireError::Disconnected)?
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        // best-effort implicit disconnect; harmless if already down
        let _ = self.ops.send(Op::Disconnect);
    }
}

/// The connection task: single owner of all multiplexer state.
async fn connection_task(
    mut reader: OwnedReadHalf,
    mut ops: mpsc::UnboundedReceiver<Op>,
    writer: WriterHandle,
    state: watch::Sender<ConnectionState>,
    config: Config,
) {
    let _ = state.send(ConnectionState::Connected);

    let mut frames = FrameBuffer::with_max_payload(config.max_payload_size);
    let mut pending = PendingTable::new();
    let mut registry = SubscriptionRegistry::new();
    let mut scratch = vec![0u8; 8 * 1024];

    let reason = loop {
        tokio::select! {
            op = ops.recv() => match op {
                Some(Op::Invoke { opcode, args, reply }) => {
                    let id = pending.register(reply);
                    let header = Header::command(opcode.wire(), id, args.len() as u32);
                    if writer.send(OutboundFrame::new(&header, args)).await.is_err() {
                        break "write path closed";
                    }
                }
                Some(Op::Subscribe { key, handler }) => {
                    registry.insert(key, handler);
                    if send_control(&writer, Opcode::Subscribe, &key).await.is_err() {
                        break "write path closed";
                    }
                }
                Some(Op::Unsubscribe { key }) => {
                    if registry.remove(&key)
                        && send_control(&writer, Opcode::Unsubscribe, &key).await.is_err()
                    {
                        break "write path closed";
                    }
                }
                Some(Op::Disconnect) | None => break "disconnect requested",
            },

            read = reader.read(&mut scratch) => match read {
                Ok(0) => break "connection closed by controller",
                Ok(n) => match frames.push(&scratch[..n]) {
                    Ok(batch) => {
                        for frame in batch {
                            route_frame(frame, &mut pending, &mut registry);
                        }
                    }
                    Err(e) => {
                        tracing::error!("unrecoverable framing error: {e}");
                        break "framing lost";
                    }
                },
                Err(e) => {
                    tracing::error!("read error: {e}");
                    break "read error";
                }
            },
        }
    };

    tracing::debug!(pending = pending.len(), reason, "connection tearing down");
    let _ = state.send(ConnectionState::Closing);

    // fail every in-flight command; drop the registry so each
    // subscription drains its queue and stops; close the write path
    pending.fail_all();
    drop(registry);
    drop(writer);

    let _ = state.send(ConnectionState::Disconnected);
}

/// Send a fire-and-forget subscribe/unsubscribe control frame.
async fn send_control(writer: &WriterHandle, opcode: Opcode, key: &EventKey) -> Result<()> {
    let payload = Bytes::from(key.encode()?);
    let header = Header::command(opcode.wire(), EVENT_CORRELATION_ID, payload.len() as u32);
    writer.send(OutboundFrame::new(&header, payload)).await
}

/// Route one complete incoming frame.
fn route_frame(frame: Frame, pending: &mut PendingTable, registry: &mut SubscriptionRegistry) {
    match frame.kind() {
        FrameKind::Reply {
            correlation_id,
            is_error,
        } => {
            let result = if is_error {
                Err(BotwireError::Remote(decode_remote_error(frame.payload())))
            } else {
                Ok(frame.payload)
            };
            if !pending.resolve(correlation_id, result) {
                tracing::warn!(correlation_id, "reply with no pending command, dropping");
            }
        }

        FrameKind::Event { discriminant } => match decode_event(discriminant, frame.payload()) {
            Ok(payload) => {
                let key = payload.key();
                if !registry.deliver(key, Ok(payload)) {
                    tracing::trace!(?key, "event without subscriber, dropping");
                }
            }
            Err(err @ BotwireError::Decode(_)) => {
                tracing::warn!("malformed event payload: {err}");
                // surface the fault to the kind's subscriber when the key
                // does not depend on the payload we failed to decode
                if let Some(key) = EventKind::from_wire(discriminant)
                    .and_then(EventKind::filterless_key)
                {
                    registry.deliver(key, Err(err));
                }
            }
            Err(err) => {
                tracing::warn!("{err}, dropping event frame");
            }
        },
    }
}

/// Extract the controller's error message from an error-reply payload.
fn decode_remote_error(payload: &[u8]) -> String {
    MsgPackCodec::decode::<String>(payload)
        .unwrap_or_else(|_| String::from_utf8_lossy(payload).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.writer_channel_capacity, DEFAULT_CHANNEL_CAPACITY);
    }

    #[test]
    fn remote_error_decodes_msgpack_string() {
        let payload = MsgPackCodec::encode(&"pin 99 out of range").unwrap();
        assert_eq!(decode_remote_error(&payload), "pin 99 out of range");
    }

    #[test]
    fn remote_error_falls_back_to_lossy_utf8() {
        assert_eq!(decode_remote_error(b"\xc1raw"), "\u{fffd}raw");
    }

    #[tokio::test]
    async fn connect_refused_yields_connect_error() {
        // a freshly bound-and-dropped port is about as refused as it gets
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = Robot::connect(addr).await.unwrap_err();
        assert!(matches!(err, BotwireError::Connect(_)));
    }
}
