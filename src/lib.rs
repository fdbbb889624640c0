//! # Pinroute Core Library
//!
//! Serial controller for the BI04 signal-routing test stand:
//! - Port lifecycle with an explicit two-state machine
//! - Fixed command vocabulary (`CLEAR_ALL`, `INP_{pin}_{signal}`)
//! - Background line reader feeding an event sink
//! - Port enumeration for the shell
//!
//! ## Example
//!
//! ```rust,no_run
//! use pinroute_core::{BroadcastSink, Command, PortConfig, SerialSession, SignalType};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sink = Arc::new(BroadcastSink::default());
//!     let mut events = sink.subscribe();
//!     let session = SerialSession::new(sink);
//!
//!     session.open("COM3", &PortConfig::default()).await?;
//!     session
//!         .send(&Command::Route { signal: SignalType::Pls, pin: 1 })
//!         .await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!
//!     session.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::config::AppConfig;
pub use crate::core::codec::{decode_line, encode, CodecError, Command, SignalType};
pub use crate::core::event::{BroadcastSink, EventSink, LogEvent};
pub use crate::core::port::{list_ports, ConnectError, PortConfig, PortParity, RawPort};
pub use crate::core::session::{ConnectionState, SendError, SerialSession};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
