//! HTTP layer.
//!
//! | Route | Serves |
//! |---|---|
//! | `GET /` | Index page: one preview per photo, each linking to the full-size image |
//! | `GET /img/{name}` | Optimised derivative, or the original if there is none |
//! | `GET /img/preview/{name}` | Preview derivative, or the original if there is none |
//! | `GET /public/*` | Static assets from the configured public directory |
//!
//! Handlers read through [`SharedIndex`], so a reload published by the
//! watcher is visible to the next request. Names absent from the current
//! generation get a 404; resize failures are never surfaced to clients.

use crate::shared::SharedIndex;
use crate::types::ImageEntry;
use axum::Router;
use axum::extract::{self, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use maud::{DOCTYPE, Markup, html};
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// State injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SharedIndex>,
    pub title: Arc<str>,
    /// Shuffle photo order on every index page load.
    pub shuffle: bool,
}

impl AppState {
    pub fn new(index: Arc<SharedIndex>, title: impl Into<Arc<str>>, shuffle: bool) -> Self {
        Self {
            index,
            title: title.into(),
            shuffle,
        }
    }
}

pub fn router(state: AppState, public_dir: &Path) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/img/{name}", get(full_size))
        .route("/img/preview/{name}", get(preview))
        .nest_service("/public", ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Renders the index page: a grid of previews, each linking to its full-size image.
pub fn render_index(title: &str, names: &[String]) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href="/public/style.css";
            }
            body {
                h1 { (title) }
                @if names.is_empty() {
                    p.empty { "No photos yet." }
                } @else {
                    main.photo-grid {
                        @for name in names {
                            @let encoded = urlencoding::encode(name).into_owned();
                            a.photo href={ "/img/" (encoded) } {
                                img src={ "/img/preview/" (encoded) } alt=(name) loading="lazy";
                            }
                        }
                    }
                }
            }
        }
    }
}

async fn index_page(State(state): State<AppState>) -> Html<String> {
    let mut names = state.index.names();
    if state.shuffle {
        names.shuffle(&mut rand::rng());
    }
    Html(render_index(&state.title, &names).into_string())
}

async fn full_size(
    State(state): State<AppState>,
    extract::Path(name): extract::Path<String>,
    request: Request,
) -> Response {
    serve_entry_file(&state, &name, request, |entry| entry.full_size()).await
}

async fn preview(
    State(state): State<AppState>,
    extract::Path(name): extract::Path<String>,
    request: Request,
) -> Response {
    serve_entry_file(&state, &name, request, |entry| entry.preview()).await
}

async fn serve_entry_file(
    state: &AppState,
    name: &str,
    request: Request,
    pick: fn(&ImageEntry) -> &Path,
) -> Response {
    let Some(entry) = state.index.lookup(name) else {
        debug!(name, "unknown image requested");
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    let path: PathBuf = pick(&entry).to_path_buf();
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
