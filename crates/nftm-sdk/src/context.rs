use std::sync::Arc;

use nftm_fabric::EventFabric;
use nftm_ledger::{MarketReader, MarketWriter};

use crate::error::{SdkError, SdkResult};

/// Connections a front-end works against, passed explicitly.
///
/// An empty context is the "not connected" state: hooks answer with empty
/// data instead of failing.
#[derive(Clone, Default)]
pub struct MarketContext {
    reader: Option<Arc<dyn MarketReader>>,
    writer: Option<Arc<dyn MarketWriter>>,
    fabric: Option<Arc<EventFabric>>,
}

impl MarketContext {
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Connect to a market that serves both reads and writes.
    pub fn connect<M>(market: Arc<M>) -> Self
    where
        M: MarketReader + MarketWriter + 'static,
    {
        Self {
            reader: Some(market.clone()),
            writer: Some(market),
            fabric: None,
        }
    }

    /// Connect read-only.
    pub fn read_only(reader: Arc<dyn MarketReader>) -> Self {
        Self {
            reader: Some(reader),
            ..Self::default()
        }
    }

    pub fn with_fabric(mut self, fabric: Arc<EventFabric>) -> Self {
        self.fabric = Some(fabric);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    pub fn reader(&self) -> Option<&Arc<dyn MarketReader>> {
        self.reader.as_ref()
    }

    pub fn writer(&self) -> SdkResult<&Arc<dyn MarketWriter>> {
        self.writer.as_ref().ok_or(SdkError::NotConnected)
    }

    pub fn fabric(&self) -> Option<&Arc<EventFabric>> {
        self.fabric.as_ref()
    }
}
