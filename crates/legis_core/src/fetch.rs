use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use tracing::debug;

use crate::config::SyncConfig;
use crate::error::FetchError;

/// Largest body we are willing to buffer (vote sheets are small PDFs).
const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Blocking GET. Non-2xx statuses come back as responses, not errors, so
/// callers can tell a missing document from a dead connection.
pub trait Fetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(config: &SyncConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
            .timeout_read(Duration::from_secs(config.request_timeout_secs))
            .timeout_write(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .build();
        Self { agent }
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        debug!(url, "GET");
        let response = match self.agent.get(url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(_, resp)) => resp,
            Err(ureq::Error::Transport(err)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                });
            }
        };
        let status = response.status();
        let body = read_capped(response.into_reader(), url, MAX_BODY_BYTES)?;
        debug!(url, status, bytes = body.len(), "fetched");
        Ok(FetchResponse { status, body })
    }
}

/// Read a whole body, failing rather than truncating past `limit` bytes.
fn read_capped(reader: impl Read, url: &str, limit: u64) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    reader
        .take(limit + 1)
        .read_to_end(&mut body)
        .map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
    if body.len() as u64 > limit {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(body)
}

/// In-memory fetcher serving canned responses; records every URL requested.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: HashMap<String, FetchResponse>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, response: FetchResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Fetcher for ScriptedFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.calls.borrow_mut().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: url.to_string(),
                message: "no scripted response".to_string(),
            })
    }
}
