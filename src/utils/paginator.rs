//! Rate-limited pagination over a single search endpoint.
//!
//! A [`Paginator`] walks an endpoint page by page and exposes the hits as a
//! lazy [`Stream`]. Two continuation disciplines are supported:
//!
//! - **cursor**: the server returns an opaque token with every page, which is
//!   echoed back on the next request (Europe PMC `cursorMark`)
//! - **offset**: the caller advances a numeric position by the number of hits
//!   received, bounded by a total fetched beforehand (E-utilities `retstart`)
//!
//! The walk stops at the first of: no continuation, a repeated cursor, an
//! empty page, the caller's `max_results`, or the total reported by the source.

use async_stream::try_stream;
use futures_util::stream::Stream;

use crate::models::MaxResults;
use crate::sources::SourceError;
use crate::utils::{HttpClient, Throttle};

/// One decoded response page
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Raw, source-native hits
    pub hits: Vec<T>,

    /// Continuation token for cursor pagination
    pub next_cursor: Option<String>,

    /// Total number of hits the source reports for the query
    pub total: Option<usize>,
}

impl<T> Page<T> {
    pub fn new(hits: Vec<T>) -> Self {
        Self {
            hits,
            next_cursor: None,
            total: None,
        }
    }

    pub fn next_cursor(mut self, cursor: Option<String>) -> Self {
        self.next_cursor = cursor;
        self
    }

    pub fn total(mut self, total: Option<usize>) -> Self {
        self.total = total;
        self
    }
}

/// Continuation discipline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pagination {
    /// Opaque server-issued token, starting from a sentinel such as `*`
    Cursor { param: String, start: String },
    /// Numeric position advanced by the hits received, never reaching `total`
    Offset { param: String, start: usize, total: usize },
}

impl Pagination {
    pub fn cursor(param: impl Into<String>, start: impl Into<String>) -> Self {
        Pagination::Cursor {
            param: param.into(),
            start: start.into(),
        }
    }

    pub fn offset(param: impl Into<String>, start: usize, total: usize) -> Self {
        Pagination::Offset {
            param: param.into(),
            start,
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Cursor(String),
    Offset(usize),
}

impl Token {
    fn value(&self) -> String {
        match self {
            Token::Cursor(cursor) => cursor.clone(),
            Token::Offset(offset) => offset.to_string(),
        }
    }
}

/// Walks one endpoint until the source is exhausted or the bound is hit
pub struct Paginator<F> {
    client: HttpClient,
    url: String,
    params: Vec<(String, String)>,
    pagination: Pagination,
    page_size: Option<(String, usize)>,
    max_results: MaxResults,
    throttle: Throttle,
    extract: F,
}

impl<F> Paginator<F> {
    /// Create a paginator for `url`, decoding each body with `extract`
    pub fn new(client: HttpClient, url: impl Into<String>, pagination: Pagination, extract: F) -> Self {
        Self {
            client,
            url: url.into(),
            params: Vec::new(),
            pagination,
            page_size: None,
            max_results: MaxResults::Unbounded,
            throttle: Throttle::disabled(),
            extract,
        }
    }

    /// Add a fixed query parameter sent with every request
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add several fixed query parameters
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Page-size parameter; the value sent shrinks to the remaining budget
    pub fn page_size(mut self, param: impl Into<String>, size: usize) -> Self {
        self.page_size = Some((param.into(), size.max(1)));
        self
    }

    pub fn max_results(mut self, max_results: MaxResults) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }
}

impl<F> Paginator<F> {
    /// Consume the paginator as a lazy stream of raw hits
    ///
    /// The stream ends with an error item if a request fails; hits yielded
    /// before the failure remain valid.
    pub fn hits<T>(self) -> impl Stream<Item = Result<T, SourceError>>
    where
        F: Fn(&str) -> Result<Page<T>, SourceError>,
    {
        let Paginator {
            client,
            url,
            params,
            pagination,
            page_size,
            max_results,
            throttle,
            extract,
        } = self;

        try_stream! {
            let (token_param, mut token, offset_total) = match pagination {
                Pagination::Cursor { param, start } => (param, Token::Cursor(start), None),
                Pagination::Offset { param, start, total } => (param, Token::Offset(start), Some(total)),
            };
            let mut taken = 0usize;
            let mut requests = 0usize;

            loop {
                let remaining = max_results.remaining(taken);
                if remaining == Some(0) {
                    break;
                }
                if let (Token::Offset(offset), Some(total)) = (&token, offset_total) {
                    if *offset >= total {
                        break;
                    }
                }

                let mut query = params.clone();
                if let Some((size_param, size)) = &page_size {
                    let mut size = remaining.map_or(*size, |r| r.min(*size));
                    if let (Token::Offset(offset), Some(total)) = (&token, offset_total) {
                        size = size.min(total - offset);
                    }
                    query.push((size_param.clone(), size.to_string()));
                }
                query.push((token_param.clone(), token.value()));

                throttle.ready().await;
                requests += 1;
                tracing::debug!(url = %url, token = %token.value(), request = requests, "fetching page");

                let body = client.get_text(&url, &query).await?;
                let page = extract(&body)?;

                let received = page.hits.len();
                if received == 0 {
                    tracing::debug!(url = %url, requests, "empty page, source exhausted");
                    break;
                }

                for hit in page.hits.into_iter().take(remaining.unwrap_or(usize::MAX)) {
                    taken += 1;
                    yield hit;
                }

                if page.total.is_some_and(|total| taken >= total) {
                    break;
                }

                token = match token {
                    Token::Cursor(current) => match page.next_cursor {
                        Some(next) if next == current => {
                            tracing::warn!(url = %url, cursor = %current, "cursor did not advance, stopping");
                            break;
                        }
                        Some(next) if !next.is_empty() => Token::Cursor(next),
                        _ => break,
                    },
                    Token::Offset(offset) => Token::Offset(offset + received),
                };
            }

            tracing::debug!(url = %url, requests, taken, "pagination finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{pin_mut, StreamExt};
    use mockito::Matcher;

    fn numbers_page(body: &str) -> Result<Page<u32>, SourceError> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let hits = value["hits"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_u64()).map(|v| v as u32).collect())
            .unwrap_or_default();
        let next = value["next"].as_str().map(str::to_string);
        let total = value["total"].as_u64().map(|t| t as usize);
        Ok(Page::new(hits).next_cursor(next).total(total))
    }

    async fn collect<S>(stream: S) -> (Vec<u32>, Option<SourceError>)
    where
        S: Stream<Item = Result<u32, SourceError>>,
    {
        pin_mut!(stream);
        let mut hits = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(hit) => hits.push(hit),
                Err(e) => return (hits, Some(e)),
            }
        }
        (hits, None)
    }

    #[tokio::test]
    async fn test_cursor_walk_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "*".into()))
            .with_body(r#"{"hits":[1,2],"next":"A"}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "A".into()))
            .with_body(r#"{"hits":[3],"next":"B"}"#)
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "B".into()))
            .with_body(r#"{"hits":[]}"#)
            .expect(1)
            .create_async()
            .await;

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/search", server.url()),
            Pagination::cursor("cursor", "*"),
            numbers_page,
        );
        let (hits, error) = collect(paginator.hits()).await;

        assert!(error.is_none());
        assert_eq!(hits, vec![1, 2, 3]);
        first.assert_async().await;
        second.assert_async().await;
        third.assert_async().await;
    }

    #[tokio::test]
    async fn test_cursor_stall_terminates() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "*".into()))
            .with_body(r#"{"hits":[1,2],"next":"SAME"}"#)
            .expect(1)
            .create_async()
            .await;
        let stalled = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "SAME".into()))
            .with_body(r#"{"hits":[3,4],"next":"SAME"}"#)
            .expect(1)
            .create_async()
            .await;

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/search", server.url()),
            Pagination::cursor("cursor", "*"),
            numbers_page,
        );
        let (hits, error) = collect(paginator.hits()).await;

        assert!(error.is_none());
        assert_eq!(hits, vec![1, 2, 3, 4]);
        first.assert_async().await;
        stalled.assert_async().await;
    }

    #[tokio::test]
    async fn test_cursor_stops_at_reported_total() {
        let mut server = mockito::Server::new_async().await;
        let only = server
            .mock("GET", "/search")
            .match_query(Matcher::UrlEncoded("cursor".into(), "*".into()))
            .with_body(r#"{"hits":[1,2,3],"next":"A","total":3}"#)
            .expect(1)
            .create_async()
            .await;

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/search", server.url()),
            Pagination::cursor("cursor", "*"),
            numbers_page,
        );
        let (hits, _) = collect(paginator.hits()).await;

        assert_eq!(hits.len(), 3);
        only.assert_async().await;
    }

    #[tokio::test]
    async fn test_offset_walk_request_count() {
        let mut server = mockito::Server::new_async().await;
        let mut mocks = Vec::new();
        for (start, body) in [(0, "[1,2]"), (2, "[3,4]"), (4, "[5]")] {
            mocks.push(
                server
                    .mock("GET", "/fetch")
                    .match_query(Matcher::AllOf(vec![
                        Matcher::UrlEncoded("retstart".into(), start.to_string()),
                        Matcher::UrlEncoded("db".into(), "pubmed".into()),
                    ]))
                    .with_body(format!(r#"{{"hits":{}}}"#, body))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/fetch", server.url()),
            Pagination::offset("retstart", 0, 5),
            numbers_page,
        )
        .param("db", "pubmed")
        .page_size("retmax", 2);
        let (hits, error) = collect(paginator.hits()).await;

        assert!(error.is_none());
        assert_eq!(hits, vec![1, 2, 3, 4, 5]);
        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_max_results_bound() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cursor".into(), "*".into()),
                Matcher::UrlEncoded("size".into(), "3".into()),
            ]))
            .with_body(r#"{"hits":[1,2,3],"next":"A","total":100}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cursor".into(), "A".into()),
                Matcher::UrlEncoded("size".into(), "2".into()),
            ]))
            .with_body(r#"{"hits":[4,5,6],"next":"B","total":100}"#)
            .expect(1)
            .create_async()
            .await;

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/search", server.url()),
            Pagination::cursor("cursor", "*"),
            numbers_page,
        )
        .page_size("size", 3)
        .max_results(MaxResults::Limit(5));
        let (hits, _) = collect(paginator.hits()).await;

        assert_eq!(hits, vec![1, 2, 3, 4, 5]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_failure_keeps_earlier_hits() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/fetch")
            .match_query(Matcher::UrlEncoded("retstart".into(), "0".into()))
            .with_body(r#"{"hits":[1,2]}"#)
            .create_async()
            .await;
        let _fail = server
            .mock("GET", "/fetch")
            .match_query(Matcher::UrlEncoded("retstart".into(), "2".into()))
            .with_status(500)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let paginator = Paginator::new(
            HttpClient::new().unwrap(),
            format!("{}/fetch", server.url()),
            Pagination::offset("retstart", 0, 4),
            numbers_page,
        )
        .page_size("retmax", 2);
        let (hits, error) = collect(paginator.hits()).await;

        assert_eq!(hits, vec![1, 2]);
        match error {
            Some(SourceError::Upstream { status, message }) => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "backend unavailable");
            }
            other => panic!("expected upstream error, got {:?}", other),
        }
    }
}
