use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::{AsHeaderName, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use shortlink_core::ClientAgent;
use woothee::parser::Parser;

use crate::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN: &str = "UNKNOWN";

/// The authenticated caller, taken from the configured identity header.
///
/// The header is set by an upstream authenticator. A missing or blank value
/// rejects the request with 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        header_value(&parts.headers, state.identity_header())
            .map(Self)
            .ok_or(AppError::Unauthenticated)
    }
}

/// Request metadata recorded with a visit.
#[derive(Debug, Clone, Default)]
pub struct VisitContext {
    pub client_addr: Option<String>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    pub agent: ClientAgent,
    pub accept_language: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for VisitContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = header_value(&parts.headers, FORWARDED_FOR)
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()));
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let user_agent = header_value(&parts.headers, USER_AGENT);
        let agent = user_agent.as_deref().map(parse_agent).unwrap_or_default();

        Ok(Self {
            client_addr: forwarded.or(peer),
            referer: header_value(&parts.headers, REFERER),
            user_agent,
            agent,
            accept_language: header_value(&parts.headers, ACCEPT_LANGUAGE),
        })
    }
}

fn header_value(headers: &HeaderMap, name: impl AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parses a `User-Agent` header into browser, OS and device fields.
pub fn parse_agent(user_agent: &str) -> ClientAgent {
    let Some(parsed) = Parser::new().parse(user_agent) else {
        return ClientAgent::default();
    };

    ClientAgent {
        browser: known(&parsed.name),
        browser_version: known(&parsed.version),
        os: known(&parsed.os),
        os_version: known(&parsed.os_version),
        device: known(&parsed.category),
    }
}

fn known(value: &str) -> Option<String> {
    (!value.is_empty() && value != UNKNOWN).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_ON_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
        AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    #[test]
    fn parses_a_desktop_browser() {
        let agent = parse_agent(CHROME_ON_WINDOWS);

        assert_eq!(agent.browser.as_deref(), Some("Chrome"));
        assert_eq!(agent.browser_version.as_deref(), Some("120.0.0.0"));
        assert_eq!(agent.os.as_deref(), Some("Windows 10"));
        assert_eq!(agent.device.as_deref(), Some("pc"));
    }

    #[test]
    fn unrecognised_agent_has_no_fields() {
        assert_eq!(parse_agent(""), ClientAgent::default());
        assert_eq!(parse_agent("zzz"), ClientAgent::default());
    }

    #[test]
    fn blank_headers_are_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, "  ".parse().unwrap());

        assert_eq!(header_value(&headers, REFERER), None);
        assert_eq!(header_value(&headers, USER_AGENT), None);
    }
}
