//! One paging interface over in-memory slicing and server-paged fetches
//!
//! In client mode the page is cut from the dataset held in memory. In remote
//! mode the storage service is asked for the page and its counts replace the
//! local ones, since earlier filters and deletes may have changed the stored
//! row count. A failed remote fetch degrades to slicing the last-known
//! dataset.
//!
//! Every request takes a sequence number. When a response arrives after a
//! newer request was issued it is discarded instead of overwriting the
//! newer page.

use std::sync::Arc;

use dm_core::{FileId, Row, SharedDataset, StorageClient};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::DataError;

/// Where pages come from
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Slice an in-memory dataset
    Client(SharedDataset),
    /// Ask the storage service; `last_known` backs the fallback
    Remote {
        file_id: FileId,
        last_known: SharedDataset,
    },
}

impl PageSource {
    pub fn dataset(&self) -> &SharedDataset {
        match self {
            PageSource::Client(dataset) => dataset,
            PageSource::Remote { last_known, .. } => last_known,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, PageSource::Remote { .. })
    }
}

/// Position and size of the paging window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageState {
    /// 1-based
    pub page_index: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

impl PageState {
    /// State for `total_rows` rows at page 1
    pub fn for_rows(total_rows: usize, page_size: usize) -> Self {
        Self {
            page_index: 1,
            page_size,
            total_rows,
            total_pages: total_rows.div_ceil(page_size),
        }
    }

    /// Highest page that may be requested; an empty dataset still has page 1
    pub fn last_page(&self) -> usize {
        self.total_pages.max(1)
    }

    pub fn check(&self, page_index: usize) -> Result<(), DataError> {
        if page_index < 1 || page_index > self.last_page() {
            return Err(DataError::PageOutOfRange {
                page: page_index,
                total_pages: self.total_pages,
            });
        }
        Ok(())
    }
}

/// How a page was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PageOrigin {
    Client,
    Remote,
    /// Remote fetch failed; rows were sliced from the last-known dataset
    Fallback,
}

/// A window of rows plus the paging state it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    pub state: PageState,
    pub origin: PageOrigin,
}

/// Outcome of a page request
#[derive(Debug, Clone, PartialEq)]
pub enum PageFetch {
    Applied(Page),
    /// A newer request was issued while this one was in flight
    Superseded { sequence: u64 },
}

impl PageFetch {
    pub fn page(&self) -> Option<&Page> {
        match self {
            PageFetch::Applied(page) => Some(page),
            PageFetch::Superseded { .. } => None,
        }
    }

    pub fn into_page(self) -> Option<Page> {
        match self {
            PageFetch::Applied(page) => Some(page),
            PageFetch::Superseded { .. } => None,
        }
    }
}

/// Cut page `page_index` out of an in-memory dataset
pub fn slice_page(
    dataset: &SharedDataset,
    page_index: usize,
    page_size: usize,
) -> Result<Page, DataError> {
    if page_size == 0 {
        return Err(DataError::InvalidPageSize);
    }
    let mut state = PageState::for_rows(dataset.len(), page_size);
    state.check(page_index)?;
    state.page_index = page_index;

    Ok(Page {
        rows: window(dataset, page_index, page_size),
        state,
        origin: PageOrigin::Client,
    })
}

/// Slice the last-known dataset after a failed remote fetch.
///
/// The index was checked against the server's count, which may exceed the
/// local copy; such pages clamp to the last local page instead of failing.
fn fallback_page(last_known: &SharedDataset, page_index: usize, page_size: usize) -> Page {
    let mut state = PageState::for_rows(last_known.len(), page_size);
    state.page_index = page_index.clamp(1, state.last_page());

    Page {
        rows: window(last_known, state.page_index, page_size),
        state,
        origin: PageOrigin::Fallback,
    }
}

fn window(dataset: &SharedDataset, page_index: usize, page_size: usize) -> Vec<Row> {
    let start = ((page_index - 1) * page_size).min(dataset.len());
    let end = (page_index * page_size).min(dataset.len());
    dataset.rows()[start..end].to_vec()
}

struct PaginatorState {
    source: PageSource,
    state: PageState,
    current: Option<Page>,
    /// Sequence number of the newest request issued
    issued: u64,
}

/// Yields row windows for the table view
pub struct Paginator {
    client: Option<Arc<dyn StorageClient>>,
    inner: Arc<RwLock<PaginatorState>>,
}

impl Paginator {
    /// A paginator that can only slice locally
    pub fn new(page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let source = PageSource::Client(Arc::default());
        Self {
            client: None,
            inner: Arc::new(RwLock::new(PaginatorState {
                source,
                state: PageState::for_rows(0, page_size),
                current: None,
                issued: 0,
            })),
        }
    }

    /// A paginator that can delegate to the storage service
    pub fn with_client(client: Arc<dyn StorageClient>, page_size: usize) -> Self {
        let mut paginator = Self::new(page_size);
        paginator.client = Some(client);
        paginator
    }

    /// Switch to a new dataset; the window returns to page 1 and any
    /// in-flight request becomes stale
    pub fn set_source(&self, source: PageSource) {
        let mut inner = self.inner.write();
        inner.state = PageState::for_rows(source.dataset().len(), inner.state.page_size);
        inner.source = source;
        inner.current = None;
        inner.issued += 1;
    }

    /// Change the page size; the window returns to page 1
    pub fn set_page_size(&self, page_size: usize) -> Result<PageState, DataError> {
        if page_size == 0 {
            return Err(DataError::InvalidPageSize);
        }
        let mut inner = self.inner.write();
        let total_rows = inner.state.total_rows;
        inner.state = PageState::for_rows(total_rows, page_size);
        inner.current = None;
        inner.issued += 1;
        Ok(inner.state)
    }

    pub fn state(&self) -> PageState {
        self.inner.read().state
    }

    pub fn source(&self) -> PageSource {
        self.inner.read().source.clone()
    }

    /// The page most recently applied
    pub fn current_page(&self) -> Option<Page> {
        self.inner.read().current.clone()
    }

    /// Request a page of the current source at the current page size
    pub async fn get_page(&self, page_index: usize) -> Result<PageFetch, DataError> {
        let (sequence, source, page_size) = {
            let mut inner = self.inner.write();
            inner.state.check(page_index)?;
            inner.issued += 1;
            (inner.issued, inner.source.clone(), inner.state.page_size)
        };

        let page = match (&source, &self.client) {
            (PageSource::Client(dataset), _) => slice_page(dataset, page_index, page_size)?,
            (PageSource::Remote { file_id, last_known }, Some(client)) => {
                debug!("Requesting page {} of file {} (#{})", page_index, file_id, sequence);
                match client.paged_data(*file_id, page_index, page_size).await {
                    Ok(response) => Page {
                        rows: response.data,
                        state: PageState {
                            page_index,
                            page_size,
                            total_rows: response.pagination.total_records,
                            total_pages: response.pagination.total_pages,
                        },
                        origin: PageOrigin::Remote,
                    },
                    Err(err) => {
                        warn!("Paged fetch failed, slicing locally: {}", err);
                        fallback_page(last_known, page_index, page_size)
                    }
                }
            }
            (PageSource::Remote { last_known, .. }, None) => {
                warn!("No storage client configured, slicing locally");
                fallback_page(last_known, page_index, page_size)
            }
        };

        let mut inner = self.inner.write();
        if sequence != inner.issued {
            debug!(
                "Discarding stale page response #{} (newest is #{})",
                sequence, inner.issued
            );
            return Ok(PageFetch::Superseded { sequence });
        }
        inner.state = page.state;
        inner.current = Some(page.clone());
        Ok(PageFetch::Applied(page))
    }
}
