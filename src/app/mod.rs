//! Application core: pure relay logic, zero I/O.
//!
//! This module contains the rules of the bridge: peer link supervision,
//! control-channel state, backend command translation, event reporting and
//! the relay loop that ties them together.  All interaction with UART, WiFi
//! and the network happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod control;
pub mod events;
pub mod peer;
pub mod pending;
pub mod ports;
pub mod report;
pub mod service;
