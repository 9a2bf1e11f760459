//! Pagination driver
//!
//! App Store Connect pages collections with `links.next` (an absolute URL
//! to the next page) and `meta.paging` (`total`, `limit`). A response with a
//! next link has more pages; a response with only paging metadata is the
//! last page; a response with neither is not paginated at all.
//!
//! Pages are fetched one at a time and their `data` arrays concatenated in
//! arrival order. Accumulating anything other than arrays is rejected.

use futures_util::Stream;
use futures_util::stream;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::client::ApiClient;
use crate::error::{Error, Result};
use crate::request::ApiRequest;

/// Paging metadata of the most recently loaded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    /// `meta.paging.limit`, or the page's item count when the server omits it
    pub page_size: u64,
    pub has_more: bool,
}

/// One decoded response envelope.
struct Page {
    data: Value,
    next: Option<String>,
    pagination: Option<PaginationState>,
}

impl Page {
    fn from_envelope(base_url: &str, mut envelope: Value) -> Result<Self> {
        let next_link = envelope
            .pointer("/links/next")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let has_paging = envelope.pointer("/meta/paging").is_some();
        let limit = envelope
            .pointer("/meta/paging/limit")
            .and_then(Value::as_u64);
        let data = envelope
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null);
        let page_size =
            limit.unwrap_or_else(|| data.as_array().map_or(0, |items| items.len() as u64));

        let (next, pagination) = match next_link {
            Some(link) => (
                Some(relative_path(base_url, &link)?),
                Some(PaginationState {
                    page_size,
                    has_more: true,
                }),
            ),
            None if has_paging => (
                None,
                Some(PaginationState {
                    page_size,
                    has_more: false,
                }),
            ),
            None => (None, None),
        };

        Ok(Self {
            data,
            next,
            pagination,
        })
    }
}

/// A collection loaded page by page.
pub struct Paginated {
    client: ApiClient,
    data: Value,
    pagination: Option<PaginationState>,
    next: Option<String>,
    pages: usize,
}

impl Paginated {
    /// Data accumulated so far.
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    /// `None` when the first response carried no paging information.
    pub fn pagination(&self) -> Option<&PaginationState> {
        self.pagination.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    pub fn pages_loaded(&self) -> usize {
        self.pages
    }

    /// Fetch the next page and append its items. No-op when exhausted.
    pub async fn load_more(&mut self) -> Result<()> {
        let Some(path) = self.next.clone() else {
            return Ok(());
        };
        if !self.data.is_array() {
            return Err(Error::Pagination(
                "cannot accumulate pages: data is not a sequence".into(),
            ));
        }

        let page = self.client.fetch_page(&ApiRequest::get(path)).await?;
        let Value::Array(items) = page.data else {
            return Err(Error::Pagination(
                "cannot accumulate pages: next page data is not a sequence".into(),
            ));
        };
        if let Value::Array(accumulated) = &mut self.data {
            accumulated.extend(items);
        }
        self.next = page.next;
        self.pagination = page.pagination;
        self.pages += 1;

        debug!(
            pages = self.pages,
            items = self.data.as_array().map_or(0, Vec::len),
            has_more = self.has_more(),
            "loaded page"
        );
        Ok(())
    }

    /// Follow next links until exhausted and return the concatenated data.
    pub async fn drain(mut self) -> Result<Value> {
        while self.has_more() {
            self.load_more().await?;
        }
        Ok(self.data)
    }

    /// Yield each page's data in order, fetching lazily.
    pub fn into_stream(self) -> impl Stream<Item = Result<Value>> {
        let client = self.client;
        stream::try_unfold(Cursor::First(self.data, self.next), move |cursor| {
            step(client.clone(), cursor)
        })
    }
}

enum Cursor {
    First(Value, Option<String>),
    Next(String),
    Done,
}

async fn step(client: ApiClient, cursor: Cursor) -> Result<Option<(Value, Cursor)>> {
    let following = |next: Option<String>| next.map_or(Cursor::Done, Cursor::Next);
    match cursor {
        Cursor::First(data, next) => Ok(Some((data, following(next)))),
        Cursor::Next(path) => {
            let page = client.fetch_page(&ApiRequest::get(path)).await?;
            Ok(Some((page.data, following(page.next))))
        }
        Cursor::Done => Ok(None),
    }
}

impl ApiClient {
    /// Send `request` and wrap the response for page-by-page loading.
    pub async fn paginate(&self, request: ApiRequest) -> Result<Paginated> {
        let page = self.fetch_page(&request).await?;
        Ok(Paginated {
            client: self.clone(),
            data: page.data,
            pagination: page.pagination,
            next: page.next,
            pages: 1,
        })
    }

    /// Send `request` and follow every next link, concatenating all pages.
    pub async fn drain_all(&self, request: ApiRequest) -> Result<Value> {
        self.paginate(request).await?.drain().await
    }

    async fn fetch_page(&self, request: &ApiRequest) -> Result<Page> {
        let envelope = self.send(request).await?.json()?;
        Page::from_envelope(self.base_url(), envelope)
    }
}

/// Turn an absolute next link into a path relative to `base_url`.
///
/// The link's host is never contacted: the returned path is always sent to
/// the configured base. A link on the base's own origin has the base path
/// stripped; any other link (the production host behind a mirror or proxy)
/// must start with the base's API version root, e.g. `/v1`.
pub(crate) fn relative_path(base_url: &str, link: &str) -> Result<String> {
    let base = Url::parse(base_url)
        .map_err(|e| Error::Pagination(format!("invalid base URL {base_url}: {e}")))?;
    let next = Url::parse(link)
        .map_err(|e| Error::Pagination(format!("invalid next link {link}: {e}")))?;

    let base_path = base.path().trim_end_matches('/');
    let api_root = format!("/{}", api_version(base_path));

    let same_origin = next.origin() == base.origin();
    let rest = same_origin
        .then(|| under(next.path(), base_path))
        .flatten()
        .or_else(|| under(next.path(), &api_root))
        .ok_or_else(|| {
            Error::Pagination(format!("next link {link} has no {api_root} API root"))
        })?;
    if !same_origin {
        debug!(link, base_url, "re-targeting next link at configured base");
    }

    let mut relative = rest.to_string();
    if let Some(query) = next.query() {
        relative.push('?');
        relative.push_str(query);
    }
    Ok(relative)
}

/// The remainder of `path` below `prefix`, on a segment boundary.
fn under<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Last segment of the base path when it looks like `v<digits>`, else `v1`.
fn api_version(base_path: &str) -> &str {
    base_path
        .rsplit('/')
        .next()
        .filter(|segment| {
            segment
                .strip_prefix('v')
                .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
        .unwrap_or("v1")
}
