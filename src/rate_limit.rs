//! Fixed-window request limiter keyed by the client's socket address.

use std::time::{Duration, Instant};

use actix_web::{
    Error, HttpResponse,
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
    web,
};
use dashmap::DashMap;
use log::warn;

use crate::envelope::ApiEnvelope;
use crate::server::AppState;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    window: Duration,
    max_requests: u32,
    clients: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            clients: DashMap::new(),
        }
    }

    /// Counts one request from `client` and reports whether it is allowed.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut entry = self.clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        entry.count = entry.count.saturating_add(1);
        entry.count <= self.max_requests
    }

    /// Drops windows that have fully elapsed.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
    }
}

pub async fn limit_requests<B: MessageBody + 'static>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    // Forwarding headers are client-controlled, so only the socket address counts.
    let client = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let allowed = req
        .app_data::<web::Data<AppState>>()
        .is_none_or(|state| state.limiter.check(&client));

    if !allowed {
        warn!("Rate limit exceeded for {client}");
        let resp = HttpResponse::TooManyRequests().json(ApiEnvelope::err(
            "Too many requests, please try again later.",
            None,
        ));
        return Ok(req.into_response(resp).map_into_right_body());
    }

    Ok(next.call(req).await?.map_into_left_body())
}
