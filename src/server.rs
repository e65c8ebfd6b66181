use crate::exporter::Exporter;
use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
struct AppState {
    exporter: Arc<Exporter>,
    metrics_path: String,
}

/// Builds the HTTP surface: the scrape endpoint at `metrics_path` and a landing page at `/`
pub fn router(exporter: Arc<Exporter>, metrics_path: &str) -> Router {
    let state = AppState {
        exporter,
        metrics_path: metrics_path.to_string(),
    };

    let router = Router::new().route(metrics_path, get(metrics));
    let router = if metrics_path == "/" {
        router
    } else {
        router.route("/", get(landing))
    };

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.exporter.collect().await;
    ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body)
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n\
         <head><title>Nature Remo Exporter</title></head>\n\
         <body>\n\
         <h1>Nature Remo Prometheus Metrics Exporter</h1>\n\
         <p><a href='{}'>Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        escape_html(&state.metrics_path)
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
