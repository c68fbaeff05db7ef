//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock ports.  All tests run on the host (x86_64) with a manual
//! clock and no real hardware.

mod control_channel_tests;
mod mock_ports;
mod relay_tests;
mod reporting_tests;
