mod api;
mod client;
mod helpers;

pub use api::{
    ConnectionState, ConnectionsResponse, DeviceConfig, EventKind, FolderConfig, FolderDevice,
    FolderSummary, RemoteCompletion, SyncthingConfig, SyncthingEvent, SystemStatus,
    SystemVersion, TransferTotals,
};
pub use client::{DaemonApi, SyncthingClient};
