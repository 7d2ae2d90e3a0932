pub mod api;
pub mod websocket;

use api::AppState;
use std::error::Error;
use url::form_urlencoded;

pub struct Server {
    addr: String,
    http_port: u16,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, http_port: u16, state: AppState) -> Self {
        Self {
            addr,
            http_port,
            state,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(self.http_port, self.state.clone()).await?;
        websocket::start_ws_server(&self.addr, self.state.clone()).await
    }
}

/// True when no key is configured, or the client sent it as a header or as
/// the `api_key` query parameter.
pub(crate) fn api_key_matches(expected: Option<&str>, header: Option<&str>, query: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|k| !k.is_empty()) else {
        return true;
    };
    if header == Some(expected) {
        return true;
    }
    query
        .map(|qs| form_urlencoded::parse(qs.as_bytes()).any(|(k, v)| k == "api_key" && v == expected))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_when_no_key_configured() {
        assert!(api_key_matches(None, None, None));
        assert!(api_key_matches(Some(""), None, None));
    }

    #[test]
    fn key_accepted_from_header_or_query() {
        assert!(api_key_matches(Some("k"), Some("k"), None));
        assert!(api_key_matches(Some("k"), None, Some("a=1&api_key=k")));
        assert!(!api_key_matches(Some("k"), Some("x"), Some("api_key=y")));
        assert!(!api_key_matches(Some("k"), None, None));
    }
}
