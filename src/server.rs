//! Route assembly and the HTTP server.

use crate::error::{utils::server_error, RedirectorError, Result};
use crate::forward::{Forwarder, InboundRequest};
use crate::management_api;
use crate::resolver::SelectionResolver;
use crate::store::UrlStore;
use bytes::Bytes;
use hyper::service::make_service_fn;
use hyper::Server;
use metrics::counter;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;
use warp::http::header::HeaderMap;
use warp::http::{Method, StatusCode};
use warp::path::FullPath;
use warp::{Filter, Rejection, Reply};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UrlStore>,
    pub resolver: SelectionResolver,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    pub fn new(store: Arc<dyn UrlStore>, forwarder: Forwarder) -> Self {
        Self {
            resolver: SelectionResolver::new(store.clone()),
            store,
            forwarder: Arc::new(forwarder),
        }
    }
}

/// Management paths first; every other request goes to the selected target.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone {
    management_api::routes(state.store.clone())
        .or(forward_route(state))
        .unify()
        .recover(handle_rejection)
        .unify()
}

fn forward_route(
    state: AppState,
) -> impl Filter<Extract = (warp::reply::Response,), Error = Rejection> + Clone {
    warp::any()
        .and(warp::method())
        .and(warp::path::full())
        .and(
            warp::filters::query::raw()
                .or(warp::any().map(String::new))
                .unify(),
        )
        .and(warp::header::headers_cloned())
        .and(warp::body::bytes())
        .and(warp::any().map(move || state.clone()))
        .and_then(handle_forward)
}

async fn handle_forward(
    method: Method,
    path: FullPath,
    raw_query: String,
    headers: HeaderMap,
    body: Bytes,
    state: AppState,
) -> std::result::Result<warp::reply::Response, Rejection> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "forward",
        %request_id,
        method = %method,
        path = %path.as_str()
    );

    let request = InboundRequest {
        method,
        path: path.as_str().to_string(),
        raw_query,
        headers,
        body,
    };

    let result = forward(&state, request).instrument(span).await;
    Ok(match result {
        Ok(response) => response,
        Err(e) => e.into_response(),
    })
}

async fn forward(state: &AppState, request: InboundRequest) -> Result<warp::reply::Response> {
    counter!("redirector.forward.requests", 1);

    let target = match state.resolver.resolve().await? {
        Some(target) => target,
        None => {
            counter!("redirector.forward.no_selection", 1);
            return Err(RedirectorError::NoSelection);
        }
    };

    state.forwarder.forward(request, &target).await
}

async fn handle_rejection(err: Rejection) -> std::result::Result<warp::reply::Response, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else {
        tracing::warn!("Unhandled rejection: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };

    Ok(warp::reply::with_status(message, code).into_response())
}

/// Serve `routes` on `addr` until `shutdown` resolves.
pub async fn run<F>(addr: SocketAddr, routes: F, shutdown: impl Future<Output = ()>) -> Result<()>
where
    F: Filter<Extract = (warp::reply::Response,), Error = Infallible> + Clone + Send + Sync + 'static,
{
    let service = warp::service(routes);

    let make_svc = make_service_fn(move |_conn| {
        let svc = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .service(service.clone());
        async move { Ok::<_, Infallible>(svc) }
    });

    let server = Server::try_bind(&addr)
        .map_err(|e| server_error(format!("failed to bind to {}: {}", addr, e)))?
        .serve(make_svc)
        .with_graceful_shutdown(shutdown);

    tracing::info!("Listening on {}", addr);
    server
        .await
        .map_err(|e| server_error(format!("HTTP server error: {}", e)))?;

    tracing::info!("Server shut down");
    Ok(())
}

pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForwardMode;
    use crate::store::{NewUrl, SqliteStore, UrlRecord};
    use warp::http::header::LOCATION;

    async fn state(mode: ForwardMode) -> AppState {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        store.ensure_selection().await.unwrap();
        AppState::new(Arc::new(store), Forwarder::new(mode))
    }

    async fn select(state: &AppState, url: &str) -> UrlRecord {
        let created = state
            .store
            .insert_url(NewUrl {
                url: url.to_string(),
                name: "target".to_string(),
            })
            .await
            .unwrap();
        state.store.select_url(created.id).await.unwrap();
        created
    }

    #[tokio::test]
    async fn test_no_selection_yields_500() {
        let state = state(ForwardMode::Proxy).await;
        let res = warp::test::request()
            .path("/foo?a=1")
            .reply(&routes(state))
            .await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body().as_ref(), b"No URL is currently selected");
    }

    #[tokio::test]
    async fn test_dangling_selection_yields_500() {
        let state = state(ForwardMode::Redirect).await;
        state.store.select_url(404).await.unwrap();

        let res = warp::test::request().path("/foo").reply(&routes(state)).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_redirect_mode_composes_destination() {
        let state = state(ForwardMode::Redirect).await;
        select(&state, "http://example.com").await;

        let res = warp::test::request()
            .method("POST")
            .path("/foo/bar?a=1&b=2")
            .reply(&routes(state.clone()))
            .await;
        assert_eq!(res.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            res.headers().get(LOCATION).unwrap(),
            "http://example.com/foo/bar?a=1&b=2"
        );

        let res = warp::test::request().path("/foo").reply(&routes(state)).await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "http://example.com/foo");
    }

    #[tokio::test]
    async fn test_management_paths_bypass_forwarding() {
        let state = state(ForwardMode::Redirect).await;
        select(&state, "http://example.com").await;

        let res = warp::test::request().path("/urls").reply(&routes(state)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(LOCATION).is_none());
    }

    #[tokio::test]
    async fn test_proxy_mode_relays_target_response() {
        let upstream = warp::path!("status").map(|| {
            warp::http::Response::builder()
                .status(201)
                .header("X-Test", "v")
                .body(r#"{"ok":true}"#)
                .unwrap()
        });
        let (addr, server) = warp::serve(upstream).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let state = state(ForwardMode::Proxy).await;
        select(&state, &format!("http://{}", addr)).await;

        let res = warp::test::request().path("/status").reply(&routes(state)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers().get("x-test").unwrap(), "v");
        assert_eq!(res.body().as_ref(), br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_proxy_mode_passes_path_and_query_unchanged() {
        let upstream = warp::path::full()
            .and(
                warp::filters::query::raw()
                    .or(warp::any().map(String::new))
                    .unify(),
            )
            .map(|path: FullPath, query: String| format!("{}?{}", path.as_str(), query));
        let (addr, server) = warp::serve(upstream).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let state = state(ForwardMode::Proxy).await;
        select(&state, &format!("http://{}", addr)).await;

        let res = warp::test::request()
            .path("/x/../y?name=O'Brien&f={a}")
            .reply(&routes(state))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body().as_ref(), b"/x/../y?name=O'Brien&f={a}");
    }

    #[tokio::test]
    async fn test_selection_switch_applies_to_next_request() {
        let state = state(ForwardMode::Redirect).await;
        select(&state, "http://first.example.com").await;

        let res = warp::test::request().path("/x").reply(&routes(state.clone())).await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "http://first.example.com/x");

        select(&state, "http://second.example.com").await;
        let res = warp::test::request().path("/x").reply(&routes(state)).await;
        assert_eq!(res.headers().get(LOCATION).unwrap(), "http://second.example.com/x");
    }
}
