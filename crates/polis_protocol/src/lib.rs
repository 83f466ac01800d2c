//! Core types for the Polis local control plane.
//!
//! Everything that is a wire or disk contract lives here: artifact
//! frontmatter, metadata indices, discovery stream events, canonical signing
//! payloads, typed API responses, and the shared error taxonomy.

pub mod api;
pub mod config;
pub mod defaults;
pub mod error;
pub mod events;
pub mod paths;
pub mod types;
pub mod wire;

pub use api::{
    AuthorError, CountsSnapshot, FeedRefreshResult, HookOutcome, OperationResult, PublishResult,
    SiteCheck, SiteReport, SiteStatus, SyncReport,
};
pub use config::{EnvConfig, HookConfig, SiteConfig};
pub use error::{PolisError, Result};
pub use events::{StreamBatch, StreamEvent, StreamFilter};
pub use paths::{polis_home, SitePaths};
pub use types::{
    domain_of, BlessedComments, BlessedPostEntry, BlessingRef, CommentFrontmatter, CommentState,
    FollowedSite, Notification, PostFrontmatter, PublicIndexEntry, SiteManifest,
};
pub use wire::{
    BeseechResponse, BlessingDecision, BlessingRequestPayload, BlessingStatus, BlessingVerdict,
    PendingBlessing, RegisterSitePayload,
};
