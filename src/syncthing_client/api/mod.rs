mod queries;
mod responses;
mod types;

pub use queries::{CompletionQuery, EventStreamQuery, FolderStatusQuery};
pub use responses::{
    ConnectionState, ConnectionsResponse, FolderSummary, RemoteCompletion, SystemStatus,
    SystemVersion, TransferTotals,
};
pub use types::{DeviceConfig, EventKind, FolderConfig, FolderDevice, SyncthingConfig, SyncthingEvent};
