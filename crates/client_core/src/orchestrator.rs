//! Keeps the rendered duty page consistent with the URL and with the server.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    fetch_state::{FetchEvent, FetchState},
    location::{Location, PaginationLocation},
    DutiesApi, Notifier,
};

const LOAD_FAILED: &str = "Failed to load";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// `clamped_to` is set when the requested page no longer existed and the location was
    /// moved back to the last page.
    Loaded { clamped_to: Option<u32> },
    Failed,
    /// A newer load started before this one resolved; its response was dropped.
    Superseded,
}

pub struct ListOrchestrator {
    api: Arc<dyn DutiesApi>,
    location: PaginationLocation,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<FetchState>,
    events: broadcast::Sender<FetchEvent>,
    generation: AtomicU64,
    settled_for: Mutex<Option<Location>>,
}

impl ListOrchestrator {
    pub fn new(
        api: Arc<dyn DutiesApi>,
        location: PaginationLocation,
        notifier: Arc<dyn Notifier>,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(FetchState::default());
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            api,
            location,
            notifier,
            state,
            events,
            generation: AtomicU64::new(0),
            settled_for: Mutex::new(None),
        })
    }

    pub fn location(&self) -> &PaginationLocation {
        &self.location
    }

    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FetchEvent> {
        self.events.subscribe()
    }

    /// The location whose load last settled the state, success or failure.
    ///
    /// Updated under the state channel's lock, so a receiver woken by that settle already
    /// sees the new value.
    pub fn settled_for(&self) -> Option<Location> {
        *self
            .settled_for
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetches the page the URL currently asks for.
    ///
    /// Only the most recently started load may settle the state; older responses are dropped.
    pub async fn load(&self) -> LoadOutcome {
        let requested = self.location.read();
        let token = self.begin();
        debug!(
            page = requested.page,
            page_size = requested.page_size,
            token,
            "loading duties"
        );

        match self
            .api
            .list_duties(requested.page, requested.page_size)
            .await
        {
            Ok(page) => {
                let total_pages = page.total_pages;
                let item_count = page.items.len();
                if !self.settle(token, requested, FetchEvent::LoadSuccess(page)) {
                    debug!(token, "dropping superseded duty page");
                    return LoadOutcome::Superseded;
                }
                debug!(
                    page = requested.page,
                    total_pages,
                    items = item_count,
                    "duty page loaded"
                );
                let clamped_to = self.clamp(requested, total_pages);
                LoadOutcome::Loaded { clamped_to }
            }
            Err(error) => {
                let message = error.describe(LOAD_FAILED);
                if !self.settle(token, requested, FetchEvent::LoadError(message.clone())) {
                    debug!(token, %error, "dropping superseded duty list failure");
                    return LoadOutcome::Superseded;
                }
                warn!(
                    page = requested.page,
                    page_size = requested.page_size,
                    %error,
                    "failed to load duties"
                );
                self.notifier.error(&message);
                LoadOutcome::Failed
            }
        }
    }

    pub async fn reload(&self) -> LoadOutcome {
        self.load().await
    }

    /// Starts the driver that loads once now and again whenever `(page, pageSize)` changes.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run())
    }

    pub async fn run(self: Arc<Self>) {
        let mut watch = self.location.subscribe();
        let mut current = watch.current();
        info!(
            page = current.page,
            page_size = current.page_size,
            "duty list driver started"
        );

        let mut inflight = self.spawn_load();
        while let Some(next) = watch.changed().await {
            if next == current {
                continue;
            }
            debug!(
                page = next.page,
                page_size = next.page_size,
                "location changed"
            );
            current = next;
            inflight.abort();
            inflight = self.spawn_load();
        }

        inflight.abort();
        info!("duty list driver stopped");
    }

    fn spawn_load(self: &Arc<Self>) -> JoinHandle<LoadOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.load().await })
    }

    fn begin(&self) -> u64 {
        let mut token = 0;
        self.state.send_modify(|state| {
            token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = std::mem::take(state).reduce(FetchEvent::LoadStart);
        });
        let _ = self.events.send(FetchEvent::LoadStart);
        token
    }

    /// Applies a terminal event if `token` still belongs to the latest load.
    fn settle(&self, token: u64, requested: Location, event: FetchEvent) -> bool {
        let current = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != token {
                return false;
            }
            *self
                .settled_for
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(requested);
            *state = std::mem::take(state).reduce(event.clone());
            true
        });
        if current {
            debug!(token, event = event.name(), "fetch event applied");
            let _ = self.events.send(event);
        }
        current
    }

    fn clamp(&self, requested: Location, total_pages: u32) -> Option<u32> {
        if total_pages >= requested.page {
            return None;
        }
        // An empty list still has a page 1.
        let last = total_pages.max(1);
        if last == requested.page || self.location.read() != requested {
            return None;
        }

        info!(
            from = requested.page,
            to = last,
            total_pages,
            "requested page is out of range, clamping"
        );
        self.location.set_page(last);
        Some(last)
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
