// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::context::Context;
use crate::server::listener::bind_tcp;
use anyhow::{anyhow, Result};
use hyper::{server::conn::Http, Body, Request, Response};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::Service;

const ACCEPT_BACKOFF_START: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before the next `accept` after `failures` consecutive errors.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_START
        .checked_mul(1u32 << failures.saturating_sub(1).min(16))
        .map_or(ACCEPT_BACKOFF_MAX, |d| d.min(ACCEPT_BACKOFF_MAX))
}

/// Builder pattern so `main.rs` can inject the metrics handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr, handler: None }
    }

    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind the listener. Split from [`Bound::serve`] so bind errors surface
    /// at startup rather than inside a background task.
    pub async fn bind(self) -> Result<Bound<H>> {
        let handler = self
            .handler
            .ok_or_else(|| anyhow!("handler must be set via with_handler()"))?;
        let listener = bind_tcp(self.addr).await?;
        Ok(Bound { listener, handler })
    }
}

pub struct Bound<H> {
    listener: TcpListener,
    handler: H,
}

impl<H> Bound<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `ctx` is cancelled, one task per connection.
    pub async fn serve(self, ctx: Context) -> Result<()> {
        tracing::info!("HTTP server listening on {}", self.local_addr()?);

        let mut failures = 0u32;
        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = ctx.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => {
                        failures = 0;
                        accepted
                    }
                    Err(err) => {
                        failures = failures.saturating_add(1);
                        let pause = accept_backoff(failures);
                        tracing::warn!(%err, ?pause, "failed to accept connection");
                        tokio::select! {
                            biased;
                            _ = ctx.cancelled() => break,
                            _ = tokio::time::sleep(pause) => continue,
                        }
                    }
                },
            };
            let svc = self.handler.clone();

            tokio::spawn(async move {
                let http = Http::new();
                if let Err(err) = http.serve_connection(stream, svc).await {
                    tracing::warn!(%peer, %err, "connection error");
                }
            });
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
