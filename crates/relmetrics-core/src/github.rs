//! Release list retrieval from the GitHub tags API.
//!
//! Tags come back newest first, which is the order releases are processed
//! in. Pagination stops as soon as `limit` tags are collected or a page
//! comes back empty.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

/// Largest page size the tags endpoint accepts.
const MAX_PER_PAGE: usize = 100;

/// Hard stop for "fetch everything" walks.
const MAX_PAGES: usize = 50;

/// Errors from the release list API.
#[derive(Error, Debug)]
pub enum GithubError {
    /// The request could not be sent or the response could not be decoded.
    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not a list of tags.
    #[error("unexpected tags response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The repository URL does not name an owner and repository.
    #[error("cannot derive owner/repo from {0}")]
    InvalidRepository(String),
}

/// Result alias for GitHub operations.
pub type GithubResult<T> = Result<T, GithubError>;

/// A tagged release: name plus the commit it points to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseTag {
    /// Tag name (e.g., `rel/commons-lang-3.17.0`).
    pub name: String,
    /// Full SHA of the tagged commit.
    pub commit_sha: String,
}

#[derive(Deserialize)]
struct ApiTag {
    name: String,
    commit: ApiCommit,
}

#[derive(Deserialize)]
struct ApiCommit {
    sha: String,
}

impl From<ApiTag> for ReleaseTag {
    fn from(tag: ApiTag) -> Self {
        Self {
            name: tag.name,
            commit_sha: tag.commit.sha,
        }
    }
}

/// Client for the tags endpoint of one repository.
#[derive(Debug, Clone)]
pub struct TagsClient {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
    token: Option<String>,
}

impl TagsClient {
    /// Build a client for the repository behind `repository_url`.
    pub fn for_repository(
        api_url: &str,
        repository_url: &str,
        token: Option<String>,
    ) -> GithubResult<Self> {
        let (owner, repo) = crate::git::parse_owner_repo(repository_url)
            .ok_or_else(|| GithubError::InvalidRepository(repository_url.to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("relmetrics/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
            token,
        })
    }

    /// `owner/repo` this client talks to.
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Fetch up to `limit` tags, newest first. `None` fetches every page.
    #[instrument(skip(self), fields(repo = %self.slug()))]
    pub fn fetch_releases(&self, limit: Option<usize>) -> GithubResult<Vec<ReleaseTag>> {
        let per_page = limit.map_or(MAX_PER_PAGE, |l| l.clamp(1, MAX_PER_PAGE));
        let mut releases = Vec::new();

        for page in 1..=MAX_PAGES {
            let batch = self.fetch_page(page, per_page)?;
            let exhausted = batch.len() < per_page;
            releases.extend(batch);

            if limit.is_some_and(|l| releases.len() >= l) || exhausted {
                break;
            }
        }

        if let Some(limit) = limit {
            releases.truncate(limit);
        }
        debug!(count = releases.len(), "releases fetched");
        Ok(releases)
    }

    fn fetch_page(&self, page: usize, per_page: usize) -> GithubResult<Vec<ReleaseTag>> {
        let url = format!("{}/repos/{}/{}/tags", self.api_url, self.owner, self.repo);
        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", per_page), ("page", page)])
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let body = request.send()?.error_for_status()?.text()?;
        debug!(page, bytes = body.len(), "tags page received");
        Ok(parse_tags(&body)?)
    }
}

/// Parse a tags API response body.
pub fn parse_tags(body: &str) -> Result<Vec<ReleaseTag>, serde_json::Error> {
    let tags: Vec<ApiTag> = serde_json::from_str(body)?;
    Ok(tags.into_iter().map(ReleaseTag::from).collect())
}

/// A stand-in for the tags endpoint, served from a local socket.
#[cfg(test)]
pub(crate) mod fake_api {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    use super::ReleaseTag;

    type Responder = Box<dyn Fn(usize, usize) -> (u16, String) + Send>;

    pub(crate) struct TagsServer {
        pub(crate) url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl TagsServer {
        /// Serve `tags` in the given order, honoring `per_page` and `page`.
        pub(crate) fn start(tags: Vec<ReleaseTag>) -> Self {
            Self::spawn(Box::new(move |per_page, page| {
                let start = page.saturating_sub(1).saturating_mul(per_page).min(tags.len());
                let end = start.saturating_add(per_page).min(tags.len());
                let body: Vec<serde_json::Value> = tags[start..end]
                    .iter()
                    .map(|t| serde_json::json!({ "name": t.name, "commit": { "sha": t.commit_sha } }))
                    .collect();
                (200, serde_json::Value::Array(body).to_string())
            }))
        }

        /// Answer every request with `status` and a GitHub-style error body.
        pub(crate) fn failing(status: u16) -> Self {
            Self::spawn(Box::new(move |_, _| {
                (status, r#"{"message": "API rate limit exceeded"}"#.to_owned())
            }))
        }

        /// Request heads received so far, lowercased.
        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn spawn(respond: Responder) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&requests);

            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    let Ok(mut stream) = stream else { continue };
                    let mut head = String::new();
                    let mut reader = BufReader::new(&stream);
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                            break;
                        }
                        head.push_str(&line);
                    }

                    let (per_page, page) = paging(&head);
                    let (status, body) = respond(per_page, page);
                    log.lock().unwrap().push(head.to_lowercase());
                    let response = format!(
                        "HTTP/1.1 {status} Fake\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes());
                }
            });

            Self { url, requests }
        }
    }

    /// `per_page` and `page` from the request line, with the API defaults.
    fn paging(head: &str) -> (usize, usize) {
        let target = head.split_whitespace().nth(1).unwrap_or_default();
        let query = target.split_once('?').map_or("", |(_, q)| q);
        let (mut per_page, mut page) = (30, 1);
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("per_page", v)) => per_page = v.parse().unwrap_or(per_page),
                Some(("page", v)) => page = v.parse().unwrap_or(page),
                _ => {}
            }
        }
        (per_page, page)
    }
}
