//! Mirrors a Syncthing daemon's devices, folders and sync progress, and
//! reports a coarse status (connected peers, upload/download activity) to a
//! tray-style surface.

pub mod config;
pub mod monitor;
pub mod surface;
pub mod syncthing_client;
pub mod types;
