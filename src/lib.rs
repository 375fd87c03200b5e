//! Firmware image upload sessions for MCUmgr devices.
//!
//! - [`dfu`]: file resolution, upload configuration, the session state
//!   machine and throughput tracking
//! - [`traits`]: the seam to the library that performs the actual transfer
//! - [`commands`]: host-facing operations built on top of the session

pub mod commands;
pub mod dfu;
pub mod traits;

#[cfg(test)]
mod test_helpers;
