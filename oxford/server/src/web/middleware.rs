use axum::http::{HeaderName, HeaderValue, Request, Response};
use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Layer that marks responses as not cacheable.
///
/// Every page shows data of the signed-in session; the browser must not
/// show it again from its cache after sign-out.
#[derive(Clone, Default)]
pub struct NoStoreLayer;

impl NoStoreLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NoStoreLayer {
    type Service = NoStoreService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NoStoreService { inner }
    }
}

#[derive(Clone)]
pub struct NoStoreService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for NoStoreService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = NoStoreFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        NoStoreFuture {
            future: self.inner.call(request),
        }
    }
}

pin_project! {
    pub struct NoStoreFuture<F> {
        #[pin]
        future: F,
    }
}

impl<F, ResBody, E> Future for NoStoreFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = Result<Response<ResBody>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this.future.poll(cx) {
            Poll::Ready(Ok(mut response)) => {
                // Static documents may set their own policy.
                response
                    .headers_mut()
                    .entry(HeaderName::from_static("cache-control"))
                    .or_insert(HeaderValue::from_static("no-store"));
                Poll::Ready(Ok(response))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::{Router, response::Response};
    use tower::ServiceExt;

    #[tokio::test]
    async fn adds_no_store_header() {
        let app = Router::new()
            .route("/members", axum::routing::get(|| async { "roster" }))
            .layer(NoStoreLayer::new());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/members")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("cache-control"),
            Some(&HeaderValue::from_static("no-store"))
        );
    }

    #[tokio::test]
    async fn keeps_an_existing_cache_policy() {
        async fn handler_with_cache_policy() -> Response<String> {
            let mut response = Response::new("agenda".to_string());
            response.headers_mut().insert(
                "cache-control",
                HeaderValue::from_static("public, max-age=60"),
            );
            response
        }

        let app = Router::new()
            .route("/docs/agenda.pdf", axum::routing::get(handler_with_cache_policy))
            .layer(NoStoreLayer::new());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/docs/agenda.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("cache-control"),
            Some(&HeaderValue::from_static("public, max-age=60"))
        );
    }
}
