pub mod broadcaster;
pub mod connection;
pub mod registry;
pub mod snapshot;

pub use broadcaster::{subscribe_snapshot_relay, PresenceKeys, SnapshotPublisher};
pub use connection::{ChannelSink, Connection, ConnectionId, ConnectionSink, SendError};
pub use registry::PresenceRegistry;
pub use snapshot::PresenceSnapshot;
