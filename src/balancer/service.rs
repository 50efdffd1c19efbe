//! Round-robin (plain HTTP) / sticky (socket upgrades) backend selection,
//! exposed both as a plain selection API and as a `tower::Service` a router
//! can sit behind.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use super::affinity::{AffinityTable, SessionKey};
use super::health::BackendHealth;
use crate::config::BalancerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Backend {
    pub id: InstanceId,
    pub address: String,
}

/// Selects a backend for each inbound request and proxies it there. HTTP
/// traffic round-robins across healthy backends; requests carrying a
/// session key (a `session` query parameter, standing in for the upgrade
/// handshake's cookie) are pinned to whatever instance already holds that
/// key, falling back to a hash bucket on first contact.
#[derive(Clone)]
pub struct BalancerService {
    backends: Arc<Vec<Backend>>,
    affinity: Arc<AffinityTable>,
    health: Arc<DashMap<InstanceId, BackendHealth>>,
    next: Arc<AtomicUsize>,
    sticky_sessions: bool,
    client: reqwest::Client,
}

impl BalancerService {
    pub fn new(
        backends: Vec<Backend>,
        affinity: Arc<AffinityTable>,
        health: Arc<DashMap<InstanceId, BackendHealth>>,
        config: &BalancerConfig,
    ) -> Self {
        Self {
            backends: Arc::new(backends),
            affinity,
            health,
            next: Arc::new(AtomicUsize::new(0)),
            sticky_sessions: config.sticky_sessions,
            client: reqwest::Client::new(),
        }
    }

    fn is_healthy(&self, id: &InstanceId) -> bool {
        self.health
            .get(id)
            .map(|entry| *entry == BackendHealth::Healthy)
            .unwrap_or(true)
    }

    fn healthy_backends(&self) -> Vec<&Backend> {
        self.backends
            .iter()
            .filter(|b| self.is_healthy(&b.id))
            .collect()
    }

    /// Picks the backend for `session_key`. With no key (plain HTTP), or
    /// sticky sessions disabled, falls through to round robin.
    pub fn select(&self, session_key: Option<&SessionKey>) -> Option<Backend> {
        if self.sticky_sessions {
            if let Some(key) = session_key {
                if let Some(instance) = self.affinity.get(key) {
                    if self.is_healthy(&instance) {
                        if let Some(backend) = self.backends.iter().find(|b| b.id == instance) {
                            return Some(backend.clone());
                        }
                    }
                }

                let healthy = self.healthy_backends();
                if healthy.is_empty() {
                    return None;
                }
                let backend = healthy[key.bucket(healthy.len())].clone();
                self.affinity.assign(key.clone(), backend.id.clone());
                return Some(backend);
            }
        }

        let healthy = self.healthy_backends();
        if healthy.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Some(healthy[index].clone())
    }

    async fn forward(&self, backend: Backend, req: Request<Body>) -> Response {
        let (parts, body) = req.into_parts();
        let uri = format!(
            "{}{}",
            backend.address.trim_end_matches('/'),
            parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
        );

        let bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (axum::http::StatusCode::BAD_GATEWAY, format!("bad upstream body: {e}"))
                    .into_response();
            }
        };

        let mut upstream_req = self.client.request(parts.method, &uri).body(bytes.to_vec());
        for (name, value) in parts.headers.iter() {
            upstream_req = upstream_req.header(name, value);
        }

        match upstream_req.send().await {
            Ok(resp) => {
                let status = resp.status();
                let headers = resp.headers().clone();
                match resp.bytes().await {
                    Ok(body) => {
                        let mut response = (status, body.to_vec()).into_response();
                        *response.headers_mut() = headers;
                        response
                    }
                    Err(e) => (axum::http::StatusCode::BAD_GATEWAY, format!("upstream read failed: {e}"))
                        .into_response(),
                }
            }
            Err(e) => (axum::http::StatusCode::BAD_GATEWAY, format!("upstream unreachable: {e}")).into_response(),
        }
    }
}

fn session_key_from_request(req: &Request<Body>) -> Option<SessionKey> {
    let query = req.uri().query()?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "session").then(|| SessionKey::new(value.to_string()))
    })
}

impl tower::Service<Request<Body>> for BalancerService {
    type Response = Response;
    type Error = std::convert::Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let this = self.clone();
        let session_key = session_key_from_request(&req);

        Box::pin(async move {
            match this.select(session_key.as_ref()) {
                Some(backend) => Ok(this.forward(backend, req).await),
                None => Ok((axum::http::StatusCode::SERVICE_UNAVAILABLE, "no healthy backend").into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(id: &str) -> Backend {
        Backend {
            id: InstanceId::new(id),
            address: format!("http://{id}.internal"),
        }
    }

    #[test]
    fn round_robins_across_healthy_backends() {
        let backends = vec![backend("a"), backend("b")];
        let health = Arc::new(DashMap::new());
        for b in &backends {
            health.insert(b.id.clone(), BackendHealth::Healthy);
        }
        let affinity = Arc::new(AffinityTable::new());
        let config = BalancerConfig::default();
        let service = BalancerService::new(backends, affinity, health, &config);

        let first = service.select(None).unwrap();
        let second = service.select(None).unwrap();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn sticky_session_returns_same_backend_twice() {
        let backends = vec![backend("a"), backend("b"), backend("c")];
        let health = Arc::new(DashMap::new());
        for b in &backends {
            health.insert(b.id.clone(), BackendHealth::Healthy);
        }
        let affinity = Arc::new(AffinityTable::new());
        let config = BalancerConfig::default();
        let service = BalancerService::new(backends, affinity, health, &config);

        let key = SessionKey::new("session-1");
        let first = service.select(Some(&key)).unwrap();
        let second = service.select(Some(&key)).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn no_healthy_backends_returns_none() {
        let backends = vec![backend("a")];
        let health = Arc::new(DashMap::new());
        health.insert(backends[0].id.clone(), BackendHealth::Unhealthy);
        let affinity = Arc::new(AffinityTable::new());
        let config = BalancerConfig::default();
        let service = BalancerService::new(backends, affinity, health, &config);

        assert!(service.select(None).is_none());
    }
}
