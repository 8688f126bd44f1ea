//! # Symphony Control Library for Light Symphony controllers
//!
//! `symphony-control-lib` is a Rust library for driving Light Symphony lighting
//! controllers (the iPort bridge) over a local network. The controller speaks a
//! small text line protocol over UDP and can only cope with one command at a
//! time, so every command goes through a single ordered queue that paces the
//! traffic.
//!
//! ## Features
//!
//! - Controller discovery by UDP broadcast
//! - All-areas and per-area on/off control
//! - Per-area intensity control, with validation of areas and levels
//! - Strictly ordered command delivery with a fixed pause after each send
//!
//! ## Example
//!
//! ```no_run
//! use symphony_control_lib::config::ControllerConfig;
//! use symphony_control_lib::control_interface::ControlInterface;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // No address configured, so the controller is discovered on first use.
//!     let control = ControlInterface::new(ControllerConfig::default());
//!
//!     control.set_all(true).await?;
//!     control.set_intensity(5, 7)?.await?;
//!     control.set_area(3, false)?.await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Light Symphony or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `config` module holds the controller settings and the protocol defaults
// (ports, timeout, command delay).
pub mod config;

// The `control_interface` module provides the command queue that talks to the
// controller, together with the command types and their validation.
//
// Example usage:
//
// ```
// use symphony_control_lib::control_interface::LightingCommand;
//
// let command: LightingCommand = "area 3 on".parse().unwrap();
// assert_eq!(command.to_string(), "area_on 3");
// ```
pub mod control_interface;

// The `util` module provides controller discovery and the error type shared
// by the rest of the library.
//
// Example usage:
//
// ```
// use symphony_control_lib::config::ControllerConfig;
// use symphony_control_lib::util::discovery::Discovery;
//
// #[tokio::main]
// async fn main() {
//     let address = Discovery::discover(&ControllerConfig::default()).await.unwrap();
//     println!("Found controller at {}", address);
// }
// ```
pub mod util;

pub use util::error::{ControlError, Result};
