// ── Region subscriptions ──

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::DeviceList;

/// A subscription to one cached region.
///
/// `None` means nothing has been stored for the region yet.
pub struct RegionStream {
    current: Option<DeviceList>,
    receiver: watch::Receiver<Option<DeviceList>>,
}

impl RegionStream {
    pub(crate) fn new(receiver: watch::Receiver<Option<DeviceList>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> Option<&DeviceList> {
        self.current.as_ref()
    }

    pub fn latest(&self) -> Option<DeviceList> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next write. Returns `None` once the cache is dropped.
    pub async fn changed(&mut self) -> Option<Option<DeviceList>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current.clone_from(&snap);
        Some(snap)
    }

    pub fn into_stream(self) -> RegionWatchStream {
        RegionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every snapshot written to a region.
pub struct RegionWatchStream {
    inner: WatchStream<Option<DeviceList>>,
}

impl Stream for RegionWatchStream {
    type Item = Option<DeviceList>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
