// src/server/handler.rs
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

use crate::metrics::MetricsRegistry;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Serves the registry in the text exposition format at a single path.
#[derive(Clone)]
pub struct MetricsHandler {
    registry: Arc<MetricsRegistry>,
    path: Arc<str>,
}

impl MetricsHandler {
    pub fn new(registry: Arc<MetricsRegistry>, path: &str) -> Self {
        Self {
            registry,
            path: Arc::from(path),
        }
    }

    fn respond(&self, req: &Request<Body>) -> Result<Response<Body>, hyper::http::Error> {
        if req.uri().path() != &*self.path {
            return Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("Not Found"));
        }
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(Body::empty());
        }

        match self.registry.gather() {
            Ok(metrics) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, TEXT_FORMAT)
                .body(Body::from(metrics)),
            Err(e) => {
                tracing::error!(%e, "failed to gather metrics");
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Body::from(e.to_string()))
            }
        }
    }
}

impl Service<Request<Body>> for MetricsHandler {
    type Response = Response<Body>;
    type Error = hyper::http::Error;
    type Future = futures::future::Ready<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        futures::future::ready(self.respond(&req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricsConfig;
    use crate::metrics::{CheckLabels, MetricSink};
    use crate::target::Address;
    use std::time::Duration;

    fn handler() -> MetricsHandler {
        let registry = MetricsRegistry::new(&MetricsConfig::default()).unwrap();
        let labels = CheckLabels::new(&Address::new("a.test", Some(80)), "tcp-probe");
        registry
            .collector()
            .record(&labels, true, Duration::from_millis(12))
            .unwrap();
        MetricsHandler::new(Arc::new(registry), "/metrics")
    }

    #[tokio::test]
    async fn test_serves_metrics_path() {
        let mut handler = handler();
        let req = Request::get("/metrics").body(Body::empty()).unwrap();
        let resp = handler.call(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[CONTENT_TYPE], TEXT_FORMAT);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("dns_checker_check{"));
        assert!(body.contains(r#"check_name="tcp-probe""#));
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let mut handler = handler();
        let req = Request::get("/").body(Body::empty()).unwrap();
        let resp = handler.call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = Request::post("/metrics").body(Body::empty()).unwrap();
        let resp = handler.call(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
