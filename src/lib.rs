//! # botwire-client
//!
//! Client SDK for driving a Botwire robot controller (motors, onboard
//! servo, buzzer, led, GPIO, sensors, camera positioning service) over a
//! persistent TCP connection.
//!
//! ## Architecture
//!
//! - **Commands**: request/response, many in flight at once over the one
//!   connection, each reply matched to its caller by correlation id
//! - **Events**: unsolicited typed pushes (sensor readings, GPIO edges,
//!   positioning updates), routed to per-key subscriber callbacks that
//!   run off the read loop
//!
//! ## Example
//!
//! ```ignore
//! use botwire_client::{EventKey, Robot};
//!
//! #[tokio::main]
//! async fn main() -> botwire_client::Result<()> {
//!     let bot = Robot::connect("192.168.0.1:1110").await?;
//!
//!     bot.subscribe(EventKey::PositioningUpdate, |event| {
//!         println!("at {:?}", event?);
//!         Ok(())
//!     })?;
//!
//!     bot.drive(0.4, 0.4).await?;
//!     println!("tracks: {:?}", bot.track_sensors().await?);
//!
//!     bot.disconnect();
//!     Ok(())
//! }
//! ```

pub mod cmd;
pub mod codec;
pub mod error;
pub mod event;
pub mod protocol;

mod client;
mod dispatch;
mod pending;
mod writer;

pub use client::{Config, ConnectionState, Robot};
pub use cmd::{Opcode, PinMode};
pub use dispatch::EventHandler;
pub use error::{BotwireError, Result};
pub use event::{CameraPlacement, EventKey, EventKind, EventPayload, Position};
