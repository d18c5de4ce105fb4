//! API Module
//!
//! Every `GET` is a file request. Lookups that fail for any reason answer
//! `404 File not found`; a panic anywhere below the router answers
//! `500 Internal Server Error`.

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State, rejection::PathRejection},
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::content::{Asset, ContentError, ContentService};

/// Artifacts are immutable per deployment id, so clients may cache forever
pub const CACHE_CONTROL: &str = "public, max-age=31536000";

/// Create the router serving tenant files
pub fn create_router(service: Arc<ContentService>) -> Router {
    Router::new()
        .route("/", get(serve_root))
        .route("/{*path}", get(serve_path))
        .with_state(service)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
}

/// GET /
async fn serve_root(
    State(service): State<Arc<ContentService>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    serve(&service, &headers, &uri, "/").await
}

/// GET /{*path}
///
/// A path that does not decode (e.g. `%FF`) names no file either.
async fn serve_path(
    State(service): State<Arc<ContentService>>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    match path {
        Ok(Path(path)) => serve(&service, &headers, &uri, &path).await,
        Err(rejection) => {
            debug!(uri = %uri, "{}", rejection.body_text());
            not_found()
        }
    }
}

async fn serve(service: &ContentService, headers: &HeaderMap, uri: &Uri, path: &str) -> Response {
    let host = request_host(headers, uri);

    match service.serve(&host, path).await {
        Ok(asset) => asset_response(asset, headers),
        Err(err) => {
            match &err {
                ContentError::Fetch {
                    source: object_store::Error::NotFound { .. },
                    ..
                } => debug!(host = %host, path = %path, "{}", err),
                ContentError::UnknownTenant(_) | ContentError::InvalidKey { .. } => {
                    debug!(host = %host, path = %path, "{}", err)
                }
                ContentError::Fetch { .. } => warn!(host = %host, path = %path, "{}", err),
            }
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "File not found").into_response()
}

/// Host from the `Host` header, or from the request target for HTTP/2
fn request_host(headers: &HeaderMap, uri: &Uri) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.host())
        .unwrap_or_default()
        .to_string()
}

fn asset_response(asset: Asset, headers: &HeaderMap) -> Response {
    let etag = asset
        .etag
        .as_deref()
        .and_then(|etag| HeaderValue::from_str(etag).ok());

    let not_modified = match (&asset.etag, headers.get(header::IF_NONE_MATCH)) {
        (Some(etag), Some(condition)) => condition
            .to_str()
            .map(|condition| etag_matches(condition, etag))
            .unwrap_or(false),
        _ => false,
    };

    let mut response = if not_modified {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, HeaderValue::from_static(asset.content_type))],
            asset.body,
        )
            .into_response()
    };

    let response_headers = response.headers_mut();
    response_headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
    if let Some(etag) = etag {
        response_headers.insert(header::ETAG, etag);
    }

    response
}

/// Weak comparison of an `If-None-Match` list against an entity tag
fn etag_matches(condition: &str, etag: &str) -> bool {
    let etag = etag.trim_start_matches("W/");
    condition
        .split(',')
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == etag)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(msg) = err.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = err.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    };
    error!("Request handler panicked: {}", detail);

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use object_store::ObjectStore;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use tower::ServiceExt;

    async fn app_with(files: &[(&str, &str)]) -> Router {
        let store = Arc::new(InMemory::new());
        for (key, contents) in files {
            store
                .put(&ObjectPath::from(*key), contents.as_bytes().to_vec().into())
                .await
                .unwrap();
        }
        create_router(Arc::new(ContentService::new(store)))
    }

    fn get_request(host: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_root_serves_index_html() {
        let app = app_with(&[("dist/site1/index.html", "<h1>site1</h1>")]).await;

        let response = app.oneshot(get_request("site1.example.com", "/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(response.headers()[header::CACHE_CONTROL], CACHE_CONTROL);
        assert!(response.headers().contains_key(header::ETAG));
        assert_eq!(body_text(response).await, "<h1>site1</h1>");
    }

    #[tokio::test]
    async fn test_nested_asset_content_types() {
        let app = app_with(&[
            ("dist/site1/css/site.css", "body{}"),
            ("dist/site1/js/app.js", "run()"),
            ("dist/site1/data.bin", "\u{1}\u{2}"),
        ])
        .await;

        for (uri, expected) in [
            ("/css/site.css", "text/css"),
            ("/js/app.js", "application/javascript"),
            ("/data.bin", "application/octet-stream"),
        ] {
            let response = app
                .clone()
                .oneshot(get_request("site1.example.com:3001", uri))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(response.headers()[header::CONTENT_TYPE], expected, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_plain_404() {
        let app = app_with(&[("dist/site1/index.html", "x")]).await;

        let response = app
            .oneshot(get_request("site1.example.com", "/nope.html"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "File not found");
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let app = app_with(&[
            ("dist/site1/index.html", "one"),
            ("dist/site2/secret.txt", "two"),
        ])
        .await;

        for uri in ["/../site2/secret.txt", "/a/../../site2/secret.txt", "/%2e%2e/site2/secret.txt"] {
            let response = app
                .clone()
                .oneshot(get_request("site1.example.com", uri))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        let response = app
            .oneshot(get_request("site2.example.com", "/secret.txt"))
            .await
            .unwrap();
        assert_eq!(body_text(response).await, "two");
    }

    #[tokio::test]
    async fn test_undecodable_path_is_404() {
        let app = app_with(&[("dist/site1/index.html", "x")]).await;

        for uri in ["/%FF", "/css/%C3%28.css"] {
            let response = app
                .clone()
                .oneshot(get_request("site1.example.com", uri))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body_text(response).await, "File not found");
        }
    }

    #[tokio::test]
    async fn test_invalid_host_is_404() {
        let app = app_with(&[("dist/site1/index.html", "x")]).await;

        let response = app.oneshot(get_request("bad_host.example.com", "/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_matching_etag_is_not_modified() {
        let app = app_with(&[("dist/site1/index.html", "x")]).await;

        let first = app
            .clone()
            .oneshot(get_request("site1.example.com", "/"))
            .await
            .unwrap();
        let etag = first.headers()[header::ETAG].clone();

        let request = Request::builder()
            .uri("/")
            .header(header::HOST, "site1.example.com")
            .header(header::IF_NONE_MATCH, etag)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert!(body_text(response).await.is_empty());
    }

    #[test]
    fn test_etag_matches() {
        assert!(etag_matches("\"a\"", "\"a\""));
        assert!(etag_matches("W/\"a\"", "\"a\""));
        assert!(etag_matches("\"b\", \"a\"", "\"a\""));
        assert!(etag_matches("*", "\"a\""));
        assert!(!etag_matches("\"b\"", "\"a\""));
    }

    #[tokio::test]
    async fn test_panic_becomes_500() {
        async fn boom() -> &'static str {
            panic!("boom")
        }

        let app: Router = Router::new()
            .route("/", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "Internal Server Error");
    }
}
