use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

pub(crate) fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/interactions", post(routes::interactions::handle))
        .route("/api/status/{server}", get(routes::api::get_server_status))
        .route("/api/health", get(routes::api::health))
        .route("/api/metrics", get(routes::api::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::testing::Harness;

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let app = super::build_app(Harness::new().state);

        let response = app
            .oneshot(Request::get("/api/nope").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn interactions_are_disabled_without_a_public_key() {
        let app = super::build_app(Harness::new().state);

        let response = app
            .oneshot(
                Request::post("/interactions")
                    .body(Body::from("{\"type\":1}"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
