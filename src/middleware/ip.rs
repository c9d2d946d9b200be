use axum::{
    extract::{connect_info::ConnectInfo, Request},
    http::HeaderMap,
};
use std::net::{IpAddr, SocketAddr};

/// Resolves the client address used for rate limiting and logging.
///
/// Forwarding headers are client-controlled, so they are only consulted when
/// the server sits behind a proxy that overwrites them (`server.trust_proxy`).
pub fn client_ip(headers: &HeaderMap, remote: Option<IpAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return ip;
        }
    }
    remote.unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Same as [`client_ip`], reading the socket address from the request extensions.
pub fn request_ip(req: &Request, trust_proxy: bool) -> IpAddr {
    let remote = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
    client_ip(req.headers(), remote, trust_proxy)
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(h) = headers.get("x-forwarded-for").and_then(|hv| hv.to_str().ok()) {
        if let Some(ip) = h.split(',').next().and_then(|first| first.trim().parse::<IpAddr>().ok()) {
            return Some(ip);
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|hv| hv.to_str().ok())
        .and_then(|h| h.trim().parse::<IpAddr>().ok())
}
