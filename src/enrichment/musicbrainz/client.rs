//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.
//! This client makes exactly one request per call; spacing and retries are
//! handled by the caller.

use std::time::Duration;

use super::{adapter, dto};
use crate::config::LookupConfig;
use crate::enrichment::domain::{LookupError, LookupHints, LookupOutcome};

/// Number of hits requested per search
const SEARCH_LIMIT: u32 = 5;

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzClient {
    /// Create a new client
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LookupConfig) -> Result<Self, LookupError> {
        Self::new(
            config.base_url.clone(),
            &config.user_agent,
            config.request_timeout(),
        )
    }

    /// Search for the recording described by `hints`.
    pub async fn search_recording(
        &self,
        hints: &LookupHints,
    ) -> Result<LookupOutcome, LookupError> {
        let Some(query) = build_query(hints) else {
            return Ok(LookupOutcome::NotFound);
        };

        let url = format!(
            "{}/recording?query={}&fmt=json&limit={}",
            self.base_url,
            urlencoding::encode(&query),
            SEARCH_LIMIT
        );
        tracing::debug!(path = %hints.path.display(), %query, "Searching MusicBrainz");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if let Some(outcome) = check_status(status)? {
            return Ok(outcome);
        }
        if !status.is_success() {
            // Try to parse error response
            let message = match response.json::<dto::ApiError>().await {
                Ok(error) => error.error,
                Err(_) => status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
            return Err(LookupError::Rejected(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        let body = response
            .json::<dto::SearchResponse>()
            .await
            .map_err(map_request_error)?;

        Ok(match adapter::best_match(body) {
            Some(result) => LookupOutcome::Found(result),
            None => LookupOutcome::NotFound,
        })
    }
}

/// Lucene query for the recording search.
///
/// Title is required. Artist narrows the search; album only boosts it,
/// since folder names are unreliable album hints.
pub fn build_query(hints: &LookupHints) -> Option<String> {
    let title = hints.title.as_deref()?;
    let mut query = format!("recording:{}", quote(title));
    if let Some(artist) = &hints.artist {
        query.push_str(&format!(" AND artist:{}", quote(artist)));
    }
    if let Some(album) = &hints.album {
        query.push_str(&format!(" release:{}", quote(album)));
    }
    Some(query)
}

/// Quote a phrase, escaping the characters that are special inside quotes.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Map statuses that decide the outcome without reading the body.
///
/// `Ok(None)` means keep going: either a success body to decode or an
/// error body to report.
fn check_status(status: reqwest::StatusCode) -> Result<Option<LookupOutcome>, LookupError> {
    use reqwest::StatusCode;

    match status {
        StatusCode::NOT_FOUND => Ok(Some(LookupOutcome::NotFound)),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            Err(LookupError::RateLimited)
        }
        s if s.is_server_error() => Err(LookupError::Server { status: s.as_u16() }),
        _ => Ok(None),
    }
}

fn map_request_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout
    } else if e.is_decode() {
        LookupError::Malformed(e.to_string())
    } else {
        LookupError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn hints(title: Option<&str>, artist: Option<&str>, album: Option<&str>) -> LookupHints {
        LookupHints {
            path: PathBuf::from("/m/a.mp3"),
            title: title.map(String::from),
            artist: artist.map(String::from),
            album: album.map(String::from),
        }
    }

    fn client(base_url: &str) -> MusicBrainzClient {
        MusicBrainzClient::new(base_url, super::super::DEFAULT_USER_AGENT, Duration::from_secs(5))
            .unwrap()
    }

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = client("http://localhost:8080/ws/2/");
        assert_eq!(client.base_url, "http://localhost:8080/ws/2");
    }

    #[test]
    fn test_query_requires_title() {
        assert_eq!(build_query(&hints(None, Some("Queen"), None)), None);
    }

    #[test]
    fn test_query_clauses() {
        let query = build_query(&hints(
            Some("Bohemian Rhapsody"),
            Some("Queen"),
            Some("A Night at the Opera"),
        ))
        .unwrap();
        assert_eq!(
            query,
            r#"recording:"Bohemian Rhapsody" AND artist:"Queen" release:"A Night at the Opera""#
        );
    }

    #[test]
    fn test_query_escapes_quotes() {
        let query = build_query(&hints(Some(r#"The "Best" \ Song"#), None, None)).unwrap();
        assert_eq!(query, r#"recording:"The \"Best\" \\ Song""#);
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;

        assert_eq!(check_status(StatusCode::OK), Ok(None));
        assert_eq!(
            check_status(StatusCode::NOT_FOUND),
            Ok(Some(LookupOutcome::NotFound))
        );
        assert_eq!(
            check_status(StatusCode::TOO_MANY_REQUESTS),
            Err(LookupError::RateLimited)
        );
        assert_eq!(
            check_status(StatusCode::SERVICE_UNAVAILABLE),
            Err(LookupError::RateLimited)
        );
        assert_eq!(
            check_status(StatusCode::BAD_GATEWAY),
            Err(LookupError::Server { status: 502 })
        );
        assert_eq!(check_status(StatusCode::BAD_REQUEST), Ok(None));
    }

    #[tokio::test]
    async fn test_search_found() {
        let base = serve_once(
            "200 OK",
            r#"{"count":1,"offset":0,"recordings":[{"id":"rec-1","score":92,"title":"Nightcall",
                "artist-credit":[{"name":"Kavinsky","artist":{"id":"a","name":"Kavinsky"}}],
                "releases":[{"id":"r","title":"OutRun","status":"Official","date":"2013-02-22"}]}]}"#,
        )
        .await;

        let outcome = client(&base)
            .search_recording(&hints(Some("Nightcall"), Some("Kavinsky"), None))
            .await
            .unwrap();

        let LookupOutcome::Found(result) = outcome else {
            panic!("expected a match, got {outcome:?}");
        };
        assert_eq!(result.fields.artist.as_deref(), Some("Kavinsky"));
        assert_eq!(result.fields.album.as_deref(), Some("OutRun"));
        assert_eq!(result.fields.year, Some(2013));
    }

    #[tokio::test]
    async fn test_search_empty_is_not_found() {
        let base = serve_once("200 OK", r#"{"count":0,"offset":0,"recordings":[]}"#).await;

        let outcome = client(&base)
            .search_recording(&hints(Some("Nothing"), None, None))
            .await
            .unwrap();
        assert_eq!(outcome, LookupOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_bad_request_is_rejected() {
        let base = serve_once("400 Bad Request", r#"{"error":"Invalid query"}"#).await;

        let result = client(&base)
            .search_recording(&hints(Some("x"), None, None))
            .await;
        assert!(matches!(result, Err(LookupError::Rejected(msg)) if msg.contains("Invalid query")));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_malformed() {
        let base = serve_once("200 OK", "<html>maintenance</html>").await;

        let result = client(&base)
            .search_recording(&hints(Some("x"), None, None))
            .await;
        assert!(matches!(result, Err(LookupError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(&format!("http://{addr}"))
            .search_recording(&hints(Some("x"), None, None))
            .await;
        assert!(matches!(result, Err(LookupError::Network(_))));
    }
}
