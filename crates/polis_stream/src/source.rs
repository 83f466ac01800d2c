//! Stream source capability.
//!
//! The projector pulls `(events, cursor)` pairs through this seam so tests
//! can drive it with an in-memory log instead of the discovery service.

use std::future::Future;

use polis_discovery::AuthedDiscovery;
use polis_protocol::{Result, StreamBatch, StreamFilter};

pub trait StreamSource {
    fn query(&self, filter: &StreamFilter) -> impl Future<Output = Result<StreamBatch>> + Send;
}

impl StreamSource for AuthedDiscovery {
    async fn query(&self, filter: &StreamFilter) -> Result<StreamBatch> {
        self.stream_query(filter).await
    }
}
