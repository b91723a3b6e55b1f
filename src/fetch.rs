use std::time::Duration;

use chrono::Utc;
use reqwest::Url;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::feeds;
use crate::models::{
    AssessmentRecord, CalendarEvent, HeadcountRecord, ImageAsset, ProgramActivity, TeacherRecord,
};

const USER_AGENT: &str = concat!("kurikulum-feeds/", env!("CARGO_PKG_VERSION"));

/// Append a `t=<unix millis>` parameter so caches in front of the published
/// sheet never serve a stale export.
pub fn cache_busted(url: &str, millis: i64) -> FeedResult<Url> {
    let mut parsed = Url::parse(url).map_err(|err| FeedError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    parsed.query_pairs_mut().append_pair("t", &millis.to_string());
    Ok(parsed)
}

/// Collapse a feed result into the list the dashboard shows.
fn soften<T>(feed: &'static str, result: FeedResult<Vec<T>>) -> Vec<T> {
    match result {
        Ok(records) => {
            debug!(feed, count = records.len(), "feed loaded");
            records
        }
        Err(err) if err.is_transport() => {
            warn!(feed, %err, "feed unavailable");
            Vec::new()
        }
        Err(err) => {
            debug!(feed, %err, "feed produced nothing");
            Vec::new()
        }
    }
}

/// HTTP access to the published sheet exports.
///
/// `load_*` methods report why a feed came back empty; `fetch_*` methods are
/// the fail-soft variants and always resolve to a (possibly empty) list.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
}

impl FeedClient {
    pub fn new(timeout: Duration) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    pub async fn fetch_text(&self, url: &str) -> FeedResult<String> {
        let url = cache_busted(url, Utc::now().timestamp_millis())?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        Ok(response.text().await?)
    }

    pub async fn load_events(&self, url: &str, fallback_year: i32) -> FeedResult<Vec<CalendarEvent>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_events(&text, fallback_year)
    }

    pub async fn load_programs(
        &self,
        url: &str,
        fallback_year: i32,
    ) -> FeedResult<Vec<ProgramActivity>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_programs(&text, fallback_year)
    }

    pub async fn load_assessments(&self, url: &str) -> FeedResult<Vec<AssessmentRecord>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_assessments(&text)
    }

    pub async fn load_headcount(&self, url: &str) -> FeedResult<Vec<HeadcountRecord>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_headcount(&text)
    }

    pub async fn load_teachers(&self, url: &str) -> FeedResult<Vec<TeacherRecord>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_teachers(&text)
    }

    pub async fn load_images(&self, url: &str) -> FeedResult<Vec<ImageAsset>> {
        let text = self.fetch_text(url).await?;
        feeds::parse_images(&text)
    }

    pub async fn fetch_events(&self, url: &str, fallback_year: i32) -> Vec<CalendarEvent> {
        soften("takwim", self.load_events(url, fallback_year).await)
    }

    pub async fn fetch_programs(&self, url: &str, fallback_year: i32) -> Vec<ProgramActivity> {
        soften("programs", self.load_programs(url, fallback_year).await)
    }

    pub async fn fetch_assessments(&self, url: &str) -> Vec<AssessmentRecord> {
        soften("pbd", self.load_assessments(url).await)
    }

    pub async fn fetch_headcount(&self, url: &str) -> Vec<HeadcountRecord> {
        soften("headcount", self.load_headcount(url).await)
    }

    pub async fn fetch_teachers(&self, url: &str) -> Vec<TeacherRecord> {
        soften("teachers", self.load_teachers(url).await)
    }

    pub async fn fetch_images(&self, url: &str) -> Vec<ImageAsset> {
        soften("images", self.load_images(url).await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Serve a single canned HTTP response; the receiver yields the request
    /// line the client sent.
    pub(crate) async fn serve_once(status: &str, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let read = socket.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..read]);
            let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        (format!("http://{addr}/export?format=csv"), rx)
    }

    /// Client that talks to the local test server directly, whatever proxy
    /// the environment sets.
    pub(crate) fn client() -> FeedClient {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(5))
            .no_proxy()
            .build()
            .unwrap();
        FeedClient { http }
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(FeedClient::new(Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn cache_buster_is_appended_to_existing_query() {
        let url = cache_busted("https://example.com/pub?output=csv", 1_700_000_000_000).unwrap();
        assert_eq!(url.as_str(), "https://example.com/pub?output=csv&t=1700000000000");
    }

    #[test]
    fn cache_buster_rejects_garbage() {
        let err = cache_busted("not a url", 1).unwrap_err();
        assert!(matches!(err, FeedError::InvalidUrl { .. }));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn events_load_over_http_with_cache_buster() {
        let (url, request) = serve_once(
            "200 OK",
            "TARIKH,PROGRAM,UNIT\n15/3/2026,Mesyuarat Kurikulum,Unit Kurikulum\n",
        )
        .await;

        let events = client().fetch_events(&url, 2026).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].program, "Mesyuarat Kurikulum");

        let request_line = request.await.unwrap();
        assert!(request_line.starts_with("GET /export?format=csv&t="));
    }

    #[tokio::test]
    async fn non_success_status_resolves_empty() {
        let (url, _request) = serve_once("500 Internal Server Error", "NAMA\nAli").await;
        let client = client();
        assert!(matches!(
            client.load_teachers(&url).await,
            Err(FeedError::Status(status)) if status.as_u16() == 500
        ));

        let (url, _request) = serve_once("404 Not Found", "NAMA\nAli").await;
        assert!(client.fetch_teachers(&url).await.is_empty());
    }

    #[tokio::test]
    async fn refused_connection_resolves_empty() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/export");
        let client = client();
        assert!(client.fetch_events(&url, 2026).await.is_empty());
        assert!(client.fetch_programs(&url, 2026).await.is_empty());
        assert!(client.fetch_assessments(&url).await.is_empty());
        assert!(client.fetch_headcount(&url).await.is_empty());
        assert!(client.fetch_teachers(&url).await.is_empty());
        assert!(client.fetch_images(&url).await.is_empty());
    }

    #[tokio::test]
    async fn headerless_body_resolves_empty() {
        let (url, _request) = serve_once("200 OK", "Mesyuarat,HEM\nBengkel,KOKU").await;
        assert!(client().fetch_events(&url, 2026).await.is_empty());

        let (url, _request) = serve_once("200 OK", "").await;
        assert!(client().fetch_assessments(&url).await.is_empty());
    }

    #[tokio::test]
    async fn invalid_url_resolves_empty() {
        assert!(client().fetch_headcount("::nope::").await.is_empty());
    }
}
