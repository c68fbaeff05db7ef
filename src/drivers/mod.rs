//! On-chip peripheral drivers that sit outside the port boundary.

pub mod watchdog;
