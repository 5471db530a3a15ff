//! Endpoint resolution.
//!
//! Maps a managed GraphQL API endpoint to the WebSocket endpoint used for
//! subscriptions, and back:
//!
//! | API endpoint | Real-time endpoint |
//! |---|---|
//! | `https://{id}.appsync-api.{region}.amazonaws.com/graphql` | `wss://{id}.appsync-realtime-api.{region}.amazonaws.com/graphql` |
//! | `https://custom.example.com/graphql` | `https://custom.example.com/graphql/realtime` |
//!
//! Both directions are pure and total over well-formed URLs.

use crate::error::{EndpointError, Result};
use url::Url;

/// Service label of the standard API domain.
const API_SERVICE: &str = "appsync-api";
/// Service label of the standard real-time domain.
const REALTIME_SERVICE: &str = "appsync-realtime-api";
/// Domain suffixes of the managed service.
const AWS_SUFFIXES: [&str; 2] = ["amazonaws.com", "amazonaws.com.cn"];
/// Path segment appended for custom domains.
const REALTIME_PATH: &str = "/realtime";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostKind {
    Api,
    Realtime,
    Custom,
}

/// Split a standard host into `(id, service, suffix)`.
fn split_standard_host(host: &str) -> Option<(&str, &str, &str)> {
    let (id, rest) = host.split_once('.')?;
    let (service, suffix) = rest.split_once('.')?;
    if id.is_empty() {
        return None;
    }

    let is_aws_suffix = AWS_SUFFIXES.iter().any(|aws| {
        suffix == *aws
            || suffix
                .strip_suffix(aws)
                .and_then(|region| region.strip_suffix('.'))
                .is_some_and(|region| !region.is_empty() && !region.contains('.'))
    });

    is_aws_suffix.then_some((id, service, suffix))
}

fn classify_host(host: &str) -> HostKind {
    match split_standard_host(host) {
        Some((_, API_SERVICE, _)) => HostKind::Api,
        Some((_, REALTIME_SERVICE, _)) => HostKind::Realtime,
        _ => HostKind::Custom,
    }
}

fn unsupported(url: &Url, reason: &'static str) -> EndpointError {
    EndpointError::UnsupportedUrl {
        url: url.to_string(),
        reason,
    }
}

/// Check the URL has a host and a scheme the resolver understands.
fn validated_host(url: &Url) -> Result<&str> {
    if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
        return Err(unsupported(url, "scheme must be http, https, ws or wss"));
    }
    url.host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| unsupported(url, "missing host"))
}

fn is_realtime_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "ws" | "wss")
}

fn has_realtime_path(url: &Url) -> bool {
    url.path().trim_end_matches('/').ends_with(REALTIME_PATH)
}

/// Replace the service label of a standard host and switch the scheme.
fn swap_service(url: &Url, service: &str, scheme: &str) -> Result<Url> {
    let host = validated_host(url)?;
    let (id, _, suffix) =
        split_standard_host(host).ok_or_else(|| unsupported(url, "not a standard host"))?;
    let new_host = format!("{id}.{service}.{suffix}");

    let mut swapped = url.clone();
    swapped
        .set_scheme(scheme)
        .map_err(|()| unsupported(url, "scheme cannot be changed"))?;
    swapped.set_host(Some(&new_host))?;
    Ok(swapped)
}

/// Derive the real-time endpoint from an API endpoint.
///
/// URLs that are already real-time (WebSocket scheme, standard real-time
/// domain, or a custom domain ending in `/realtime`) are returned unchanged.
pub fn realtime_endpoint(api: &Url) -> Result<Url> {
    let host = validated_host(api)?;

    if is_realtime_scheme(api) {
        return Ok(api.clone());
    }

    match classify_host(host) {
        HostKind::Realtime => Ok(api.clone()),
        HostKind::Api => swap_service(api, REALTIME_SERVICE, "wss"),
        HostKind::Custom => {
            if has_realtime_path(api) {
                return Ok(api.clone());
            }
            let mut realtime = api.clone();
            let path = format!("{}{}", api.path().trim_end_matches('/'), REALTIME_PATH);
            realtime.set_path(&path);
            Ok(realtime)
        }
    }
}

/// Derive the API endpoint from a real-time endpoint.
///
/// Inverse of [`realtime_endpoint`]; URLs that are already API endpoints are
/// returned unchanged.
pub fn api_endpoint(realtime: &Url) -> Result<Url> {
    let host = validated_host(realtime)?;

    match classify_host(host) {
        HostKind::Realtime => swap_service(realtime, API_SERVICE, "https"),
        HostKind::Api => Ok(realtime.clone()),
        HostKind::Custom => {
            if !has_realtime_path(realtime) {
                return Ok(realtime.clone());
            }
            let trimmed = realtime.path().trim_end_matches('/');
            let stripped = trimmed.strip_suffix(REALTIME_PATH).unwrap_or(trimmed);
            let mut api = realtime.clone();
            api.set_path(if stripped.is_empty() { "/" } else { stripped });
            Ok(api)
        }
    }
}

/// Parse and resolve a real-time endpoint from a string.
pub fn resolve_realtime(api: &str) -> Result<Url> {
    realtime_endpoint(&Url::parse(api)?)
}

/// Parse and resolve an API endpoint from a string.
pub fn resolve_api(realtime: &str) -> Result<Url> {
    api_endpoint(&Url::parse(realtime)?)
}

/// Immutable pair of API endpoint and real-time endpoint.
///
/// Computed once per client instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    api: Url,
    realtime: Url,
}

impl Endpoint {
    /// Build the pair from either side.
    ///
    /// The input is treated as the real-time endpoint when it already looks
    /// like one, otherwise as the API endpoint.
    pub fn new(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        let host = validated_host(&parsed)?;

        let looks_realtime = is_realtime_scheme(&parsed)
            || classify_host(host) == HostKind::Realtime
            || (classify_host(host) == HostKind::Custom && has_realtime_path(&parsed));

        if looks_realtime {
            let api = api_endpoint(&parsed)?;
            Ok(Self {
                api,
                realtime: parsed,
            })
        } else {
            let realtime = realtime_endpoint(&parsed)?;
            Ok(Self {
                api: parsed,
                realtime,
            })
        }
    }

    /// API (HTTP) endpoint.
    pub fn api(&self) -> &Url {
        &self.api
    }

    /// Real-time (WebSocket) endpoint.
    pub fn realtime(&self) -> &Url {
        &self.realtime
    }

    /// URL to dial for the real-time transport.
    ///
    /// Custom-domain real-time endpoints keep their `http`/`https` scheme;
    /// the WebSocket client needs `ws`/`wss`.
    pub fn websocket(&self) -> Url {
        let scheme = match self.realtime.scheme() {
            "http" => "ws",
            "https" => "wss",
            _ => return self.realtime.clone(),
        };
        let mut url = self.realtime.clone();
        if url.set_scheme(scheme).is_err() {
            return self.realtime.clone();
        }
        url
    }

    /// Host of the API endpoint, as sent in authorization payloads.
    pub fn host(&self) -> &str {
        self.api.host_str().unwrap_or_default()
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.api, self.realtime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realtime(s: &str) -> String {
        resolve_realtime(s).unwrap().to_string()
    }

    fn api(s: &str) -> String {
        resolve_api(s).unwrap().to_string()
    }

    #[test]
    fn test_standard_api_domain_to_realtime() {
        assert_eq!(
            realtime("https://abc.appsync-api.amazonaws.com/graphql"),
            "wss://abc.appsync-realtime-api.amazonaws.com/graphql"
        );
    }

    #[test]
    fn test_regional_api_domain_to_realtime() {
        assert_eq!(
            realtime("https://abc123.appsync-api.us-east-1.amazonaws.com/graphql"),
            "wss://abc123.appsync-realtime-api.us-east-1.amazonaws.com/graphql"
        );
        assert_eq!(
            realtime("https://abc123.appsync-api.cn-north-1.amazonaws.com.cn/graphql"),
            "wss://abc123.appsync-realtime-api.cn-north-1.amazonaws.com.cn/graphql"
        );
    }

    #[test]
    fn test_realtime_domain_unchanged() {
        assert_eq!(
            realtime("wss://abc.appsync-realtime-api.amazonaws.com/graphql"),
            "wss://abc.appsync-realtime-api.amazonaws.com/graphql"
        );
    }

    #[test]
    fn test_custom_domain_appends_realtime_path() {
        assert_eq!(
            realtime("https://test.example.com/graphql"),
            "https://test.example.com/graphql/realtime"
        );
        assert_eq!(
            realtime("https://test.example.com/graphql/"),
            "https://test.example.com/graphql/realtime"
        );
    }

    #[test]
    fn test_custom_domain_already_realtime_unchanged() {
        assert_eq!(
            realtime("https://test.example.com/graphql/realtime"),
            "https://test.example.com/graphql/realtime"
        );
        assert_eq!(
            realtime("ws://127.0.0.1:8080/graphql"),
            "ws://127.0.0.1:8080/graphql"
        );
    }

    #[test]
    fn test_realtime_domain_to_api() {
        assert_eq!(
            api("wss://abc.appsync-realtime-api.amazonaws.com/graphql"),
            "https://abc.appsync-api.amazonaws.com/graphql"
        );
    }

    #[test]
    fn test_api_domain_unchanged_in_reverse() {
        assert_eq!(
            api("https://abc.appsync-api.amazonaws.com/graphql"),
            "https://abc.appsync-api.amazonaws.com/graphql"
        );
    }

    #[test]
    fn test_custom_domain_reverse_strips_realtime_path() {
        assert_eq!(
            api("https://custom.example.com/graphql/realtime"),
            "https://custom.example.com/graphql"
        );
        assert_eq!(
            api("https://test.example.com/graphql"),
            "https://test.example.com/graphql"
        );
    }

    #[test]
    fn test_round_trip() {
        for url in [
            "https://abc.appsync-api.amazonaws.com/graphql",
            "https://xyz.appsync-api.eu-west-2.amazonaws.com/graphql",
            "https://custom.example.com/graphql",
        ] {
            let rt = resolve_realtime(url).unwrap();
            assert_eq!(api_endpoint(&rt).unwrap().as_str(), url);
        }

        for url in [
            "wss://abc.appsync-realtime-api.amazonaws.com/graphql",
            "https://custom.example.com/graphql/realtime",
        ] {
            let api = resolve_api(url).unwrap();
            assert_eq!(realtime_endpoint(&api).unwrap().as_str(), url);
        }
    }

    #[test]
    fn test_lookalike_host_is_custom() {
        // Not an AWS suffix: treated as a custom domain.
        assert_eq!(
            realtime("https://abc.appsync-api.example.com/graphql"),
            "https://abc.appsync-api.example.com/graphql/realtime"
        );
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            resolve_realtime("not a url"),
            Err(EndpointError::InvalidUrl(_))
        ));
        assert!(matches!(
            resolve_api("ftp://example.com/graphql"),
            Err(EndpointError::UnsupportedUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_pair_from_either_side() {
        let from_api = Endpoint::new("https://abc.appsync-api.amazonaws.com/graphql").unwrap();
        let from_rt = Endpoint::new("wss://abc.appsync-realtime-api.amazonaws.com/graphql").unwrap();
        assert_eq!(from_api, from_rt);
        assert_eq!(from_api.host(), "abc.appsync-api.amazonaws.com");

        let custom = Endpoint::new("https://custom.example.com/graphql/realtime").unwrap();
        assert_eq!(custom.api().as_str(), "https://custom.example.com/graphql");
        assert_eq!(
            custom.realtime().as_str(),
            "https://custom.example.com/graphql/realtime"
        );
    }

    #[test]
    fn test_websocket_url_uses_ws_schemes() {
        let custom = Endpoint::new("https://custom.example.com/graphql").unwrap();
        assert_eq!(
            custom.websocket().as_str(),
            "wss://custom.example.com/graphql/realtime"
        );

        let local = Endpoint::new("http://127.0.0.1:8080/graphql").unwrap();
        assert_eq!(
            local.realtime().as_str(),
            "http://127.0.0.1:8080/graphql/realtime"
        );
        assert_eq!(
            local.websocket().as_str(),
            "ws://127.0.0.1:8080/graphql/realtime"
        );

        let standard = Endpoint::new("https://abc.appsync-api.amazonaws.com/graphql").unwrap();
        assert_eq!(standard.websocket(), *standard.realtime());
    }
}
