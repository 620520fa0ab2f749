//! Request handling and transformation.
//!
//! # Responsibilities
//! - Request ID generation and propagation (`x-request-id`, UUID v4)
//! - Map the inbound URI onto the backend target
//! - Prepare headers for forwarding (hop-by-hop removal, `X-Forwarded-*`)

use std::net::IpAddr;

use axum::http::{header, uri::PathAndQuery, HeaderMap, HeaderName, HeaderValue, Uri};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use url::Url;

pub const X_REQUEST_ID: &str = "x-request-id";

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
static X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
static X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers meaningful only for a single connection hop.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Layer assigning a UUID `x-request-id` to requests that lack one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying `x-request-id` from the request onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Build the backend URI for `original`: scheme and authority come from
/// `target`, the target's path is joined in front of the request path, and
/// both query strings are kept.
pub fn target_uri(target: &Url, original: &Uri) -> Result<Uri, axum::http::Error> {
    let path = join_paths(target.path(), original.path());
    let path_and_query = match (target.query().filter(|q| !q.is_empty()), original.query()) {
        (Some(a), Some(b)) if !b.is_empty() => format!("{path}?{a}&{b}"),
        (Some(a), _) => format!("{path}?{a}"),
        (None, Some(b)) => format!("{path}?{b}"),
        (None, None) => path,
    };

    let authority = match target.port() {
        Some(port) => format!("{}:{}", target.host_str().unwrap_or_default(), port),
        None => target.host_str().unwrap_or_default().to_string(),
    };

    Uri::builder()
        .scheme(target.scheme())
        .authority(authority)
        .path_and_query(PathAndQuery::try_from(path_and_query)?)
        .build()
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn remove_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Whether the request asks to switch protocols (e.g. WebSocket).
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    connection_upgrade && headers.contains_key(header::UPGRADE)
}

/// Headers to send to the backend for an inbound request.
pub fn outbound_headers(inbound: &HeaderMap, client_ip: Option<IpAddr>) -> HeaderMap {
    let mut headers = inbound.clone();
    let upgrade = is_upgrade_request(inbound)
        .then(|| inbound.get(header::UPGRADE).cloned())
        .flatten();

    remove_hop_by_hop(&mut headers);

    if let Some(protocol) = upgrade {
        headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(header::UPGRADE, protocol);
    }

    if let Some(ip) = client_ip {
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{prior}, {ip}"),
            None => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR.clone(), value);
        }
    }
    if let Some(host) = inbound.get(header::HOST) {
        headers.insert(X_FORWARDED_HOST.clone(), host.clone());
    }
    headers.insert(X_FORWARDED_PROTO.clone(), HeaderValue::from_static("http"));

    headers
}
