//! Pagination position bound to the navigation URL.
//!
//! The URL held by a [`LocationStore`] is the single source of truth; [`PaginationLocation`]
//! only parses and rewrites it and never caches a copy of its own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;
use url::{form_urlencoded, Url};

pub const PAGE_KEY: &str = "page";
pub const PAGE_SIZE_KEY: &str = "pageSize";
pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// The `(page, pageSize)` pair encoded in the query string. Both are always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub page: u32,
    pub page_size: u32,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Location {
    pub fn from_url(url: &Url) -> Self {
        Self::parse_query(url.query().unwrap_or_default())
    }

    /// Missing, non-numeric and non-positive values fall back to the defaults.
    pub fn parse_query(query: &str) -> Self {
        let mut page = None;
        let mut page_size = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match &*key {
                PAGE_KEY if page.is_none() => page = Some(parse_positive(&value)),
                PAGE_SIZE_KEY if page_size.is_none() => page_size = Some(parse_positive(&value)),
                _ => {}
            }
        }

        Self {
            page: page.flatten().unwrap_or(DEFAULT_PAGE),
            page_size: page_size.flatten().unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|value| *value > 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryMode {
    #[default]
    Push,
    Replace,
}

/// Navigation state as an injectable store: the browser history in a web host,
/// [`MemoryHistory`] everywhere else.
pub trait LocationStore: Send + Sync {
    fn current(&self) -> Url;
    /// Must be visible to the next `current()` call before returning.
    fn write(&self, url: Url, mode: HistoryMode);
    /// Notified whenever the visible URL changes, including back/forward moves.
    fn subscribe(&self) -> watch::Receiver<Url>;
}

struct HistoryStack {
    entries: Vec<Url>,
    cursor: usize,
}

/// In-memory session history with browser push/replace/back/forward semantics.
pub struct MemoryHistory {
    stack: Mutex<HistoryStack>,
    changes: watch::Sender<Url>,
}

impl MemoryHistory {
    pub fn new(initial: Url) -> Self {
        let (changes, _) = watch::channel(initial.clone());
        Self {
            stack: Mutex::new(HistoryStack {
                entries: vec![initial],
                cursor: 0,
            }),
            changes,
        }
    }

    pub fn parse(initial: &str) -> Result<Self, url::ParseError> {
        Url::parse(initial).map(Self::new)
    }

    pub fn back(&self) -> bool {
        self.go(-1)
    }

    pub fn forward(&self) -> bool {
        self.go(1)
    }

    /// Moves the cursor by `delta` entries. Returns `false` and stays put when out of range.
    pub fn go(&self, delta: isize) -> bool {
        let mut stack = self.lock();
        let Some(target) = stack
            .cursor
            .checked_add_signed(delta)
            .filter(|target| *target < stack.entries.len())
        else {
            return false;
        };

        stack.cursor = target;
        let url = stack.entries[target].clone();
        debug!(%url, position = target, "history traversal");
        self.publish(url);
        true
    }

    pub fn depth(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn position(&self) -> usize {
        self.lock().cursor
    }

    fn lock(&self) -> MutexGuard<'_, HistoryStack> {
        self.stack.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, url: Url) {
        self.changes.send_if_modified(|current| {
            if *current == url {
                false
            } else {
                *current = url;
                true
            }
        });
    }
}

impl LocationStore for MemoryHistory {
    fn current(&self) -> Url {
        let stack = self.lock();
        stack.entries[stack.cursor].clone()
    }

    fn write(&self, url: Url, mode: HistoryMode) {
        let mut stack = self.lock();
        match mode {
            HistoryMode::Push => {
                let next = stack.cursor + 1;
                stack.entries.truncate(next);
                stack.entries.push(url.clone());
                stack.cursor = next;
            }
            HistoryMode::Replace => {
                let cursor = stack.cursor;
                stack.entries[cursor] = url.clone();
            }
        }
        // Published under the lock so subscribers observe writes in order.
        self.publish(url);
    }

    fn subscribe(&self) -> watch::Receiver<Url> {
        self.changes.subscribe()
    }
}

/// Reads and rewrites the pagination keys of the URL held by a [`LocationStore`].
#[derive(Clone)]
pub struct PaginationLocation {
    store: Arc<dyn LocationStore>,
}

impl PaginationLocation {
    pub fn new(store: Arc<dyn LocationStore>) -> Self {
        Self { store }
    }

    pub fn read(&self) -> Location {
        Location::from_url(&self.store.current())
    }

    pub fn url(&self) -> Url {
        self.store.current()
    }

    /// Merges `entries` into the current query string; `None` deletes the key.
    /// Keys not named in `entries` are kept untouched.
    pub fn set_query<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: ToString,
    {
        self.set_query_with(entries, HistoryMode::Push);
    }

    pub fn set_query_with<I, K, V>(&self, entries: I, mode: HistoryMode)
    where
        I: IntoIterator<Item = (K, Option<V>)>,
        K: AsRef<str>,
        V: ToString,
    {
        let next = merge_query(&self.store.current(), entries);
        debug!(url = %next, ?mode, "rewriting location");
        self.store.write(next, mode);
    }

    pub fn set_page(&self, page: u32) {
        self.set_query([(PAGE_KEY, Some(page.max(1)))]);
    }

    /// A new page size invalidates the old item range, so the page always resets to 1.
    pub fn set_page_size(&self, page_size: u32) {
        self.set_query([
            (PAGE_SIZE_KEY, Some(page_size.max(1))),
            (PAGE_KEY, Some(DEFAULT_PAGE)),
        ]);
    }

    pub fn subscribe(&self) -> LocationWatch {
        LocationWatch {
            rx: self.store.subscribe(),
        }
    }
}

/// Reactive view over the store: every change is re-derived from the live URL.
pub struct LocationWatch {
    rx: watch::Receiver<Url>,
}

impl LocationWatch {
    pub fn current(&mut self) -> Location {
        Location::from_url(&self.rx.borrow_and_update())
    }

    /// Waits for the next URL change. `None` once the store has gone away.
    pub async fn changed(&mut self) -> Option<Location> {
        self.rx.changed().await.ok()?;
        Some(self.current())
    }
}

fn merge_query<I, K, V>(url: &Url, entries: I) -> Url
where
    I: IntoIterator<Item = (K, Option<V>)>,
    K: AsRef<str>,
    V: ToString,
{
    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    for (key, value) in entries {
        let key = key.as_ref();
        match value {
            None => pairs.retain(|(existing, _)| existing != key),
            Some(value) => {
                let value = value.to_string();
                let mut seen = false;
                pairs.retain_mut(|(existing, current)| {
                    if existing != key {
                        return true;
                    }
                    if seen {
                        return false;
                    }
                    seen = true;
                    current.clone_from(&value);
                    true
                });
                if !seen {
                    pairs.push((key.to_string(), value));
                }
            }
        }
    }

    let mut next = url.clone();
    if pairs.is_empty() {
        next.set_query(None);
    } else {
        next.query_pairs_mut()
            .clear()
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
    next
}

#[cfg(test)]
#[path = "tests/location_tests.rs"]
mod tests;
