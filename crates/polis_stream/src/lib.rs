//! Event-stream projection engine.
//!
//! A cursor-driven pull loop over the discovery event log. Each handler folds
//! events into an opaque state blob persisted atomically together with its
//! cursor, giving at-least-once delivery with idempotent merges.

pub mod checkpoint;
pub mod follow;
pub mod handler;
pub mod inbox;
pub mod memory;
pub mod notification;
pub mod source;

pub use checkpoint::{CheckpointStore, HandlerCheckpoint};
pub use follow::{FollowHandler, FollowState, FOLLOW_HANDLER};
pub use handler::{HandlerRunReport, Projector, StreamHandler};
pub use inbox::{BlessingInboxHandler, InboxRequest, InboxState, INBOX_HANDLER};
pub use memory::MemoryStreamSource;
pub use notification::{
    notification_id, NotificationHandler, NotificationState, NOTIFICATION_HANDLER,
};
pub use source::StreamSource;
