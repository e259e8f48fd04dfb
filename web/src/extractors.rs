//! Request extractors.
//!
//! [`ClientIp`]: the address rate limiting is keyed on.

use axum::{
    async_trait,
    extract::{connect_info::ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Client IP address.
///
/// In order: the first `X-Forwarded-For` entry, `X-Real-IP`, the peer
/// address (served with `into_make_service_with_connect_info`), and finally
/// `127.0.0.1`.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(
            forwarded_ip(&parts.headers)
                .or(peer)
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        ))
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let parse = |ip: &str| ip.trim().parse().ok();

    header("X-Forwarded-For")
        .and_then(|list| list.split(',').next())
        .and_then(parse)
        .or_else(|| header("X-Real-IP").and_then(parse))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/user/current");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    async fn client_ip(mut parts: Parts) -> String {
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        ip.to_string()
    }

    #[tokio::test]
    async fn test_forwarded_for_wins() {
        let parts = parts(&[
            ("X-Forwarded-For", "203.0.113.1, 198.51.100.1"),
            ("X-Real-IP", "198.51.100.42"),
        ]);
        assert_eq!(client_ip(parts).await, "203.0.113.1");
    }

    #[tokio::test]
    async fn test_real_ip_before_peer() {
        let mut parts = parts(&[("X-Real-IP", "198.51.100.42")]);
        parts
            .extensions
            .insert(ConnectInfo("192.0.2.7:51000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(parts).await, "198.51.100.42");
    }

    #[tokio::test]
    async fn test_peer_address() {
        let mut parts = parts(&[]);
        parts
            .extensions
            .insert(ConnectInfo("192.0.2.7:51000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(parts).await, "192.0.2.7");
    }

    #[tokio::test]
    async fn test_localhost_fallback() {
        assert_eq!(client_ip(parts(&[])).await, "127.0.0.1");
    }
}
