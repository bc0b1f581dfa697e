#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod board;
mod common;
mod config;
pub mod domain;
mod game;
mod missile;
mod soldier;
#[cfg(feature = "std")]
pub mod commander;
#[cfg(feature = "std")]
mod logging;
#[cfg(feature = "std")]
pub mod protocol;
#[cfg(feature = "std")]
pub mod skeleton;
#[cfg(feature = "std")]
pub mod skirmish;
#[cfg(feature = "std")]
pub mod soldier_node;
#[cfg(feature = "std")]
pub mod stub;
#[cfg(feature = "std")]
pub mod transport;
#[cfg(feature = "std")]
pub mod ui;

pub use board::*;
pub use common::*;
pub use config::*;
pub use domain::*;
pub use game::*;
pub use missile::*;
pub use soldier::*;
#[cfg(feature = "std")]
pub use commander::*;
#[cfg(feature = "std")]
pub use logging::init_logging;
#[cfg(feature = "std")]
pub use protocol::*;
#[cfg(feature = "std")]
pub use skeleton::*;
#[cfg(feature = "std")]
pub use skirmish::*;
#[cfg(feature = "std")]
pub use soldier_node::*;
#[cfg(feature = "std")]
pub use stub::*;
#[cfg(feature = "std")]
pub use transport::{in_memory::InMemoryConnector, in_memory::InMemoryTransport, tcp::TcpConnector, tcp::TcpTransport, Transport};
#[cfg(feature = "std")]
pub use ui::*;
