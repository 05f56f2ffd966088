//! Catalogue server: renders the channel list, player and settings pages
//! for the set-top box over HTTP.

mod locale;
mod pages;
mod tls;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path as UrlPath, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, RwLock};

pub use locale::{Language, Translations};
pub use pages::{Pages, SettingsData, LOGS_ID, MAIN_ID, PLAYER_ID, SEARCH_ID};
pub use tls::{load_server_config, start_tls_server, TlsError};

use crate::config::{Config, ConfigError};
use crate::m3u::{self, Catalogue, CatalogueError, LogoCache, M3uError, MISSING_LOGO};
use crate::xml::{error_document, Document, Element};

#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    #[error(transparent)]
    Playlist(#[from] M3uError),
    #[error("no playlist address is configured")]
    NoPlaylist,
    #[error("failed to read logs: {0}")]
    Logs(std::io::Error),
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::warn!(target: "server", error = %self, "serving error dialog");
        Xml(error_document("Error", &self.to_string())).into_response()
    }
}

/// An XML page response.
pub struct Xml(pub Document);

impl IntoResponse for Xml {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, "application/xml")],
            self.0.serialize_to_string(),
        )
            .into_response()
    }
}

type PageResult = Result<Xml, PageError>;

/// Per-request page settings taken from the `Host` and
/// `Accept-Language` headers.
pub struct PageContext {
    base: String,
    translations: Translations,
}

impl PageContext {
    fn from_headers(headers: &HeaderMap) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("localhost");
        let language = headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|value| value.to_str().ok());
        Self {
            base: format!("http://{host}"),
            translations: Translations::new(Language::negotiate(language)),
        }
    }

    pub fn pages(&self) -> Pages<'_> {
        Pages::new(&self.base, self.translations)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PageContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Served at `/redbulltv.cer` so the box can trust the HTTPS listener.
pub const CERTIFICATE_PATH: &str = "/redbulltv.cer";

/// Catalogue and config shared by every request.
pub struct ServerState {
    catalogue: RwLock<Catalogue>,
    config: Mutex<Config>,
    logos: LogoCache,
}

impl ServerState {
    pub fn new(config: Config, mut catalogue: Catalogue) -> Self {
        catalogue.restore(&config.recents, &config.favorites);
        Self {
            catalogue: RwLock::new(catalogue),
            logos: LogoCache::new(&config.logo_cache_path),
            config: Mutex::new(config),
        }
    }

    /// Reads the configured playlist and caches its logos. A playlist that
    /// fails to load leaves the catalogue empty.
    pub async fn load(config: Config) -> Self {
        let mut catalogue = if config.m3u_path.is_empty() {
            Catalogue::default()
        } else {
            m3u::load(&config.m3u_path).await.unwrap_or_else(|err| {
                tracing::warn!(target: "server", path = %config.m3u_path, error = %err, "failed to load playlist");
                Catalogue::default()
            })
        };
        LogoCache::new(&config.logo_cache_path)
            .localize(&mut catalogue)
            .await;
        Self::new(config, catalogue)
    }

    pub async fn catalogue(&self) -> Catalogue {
        self.catalogue.read().await.clone()
    }

    async fn settings_data(&self) -> SettingsData {
        let catalogue = self.catalogue.read().await;
        let config = self.config.lock().await;
        SettingsData {
            version: env!("CARGO_PKG_VERSION").to_string(),
            m3u_path: config.m3u_path.clone(),
            channel_count: catalogue.channel_count(),
            recent_count: catalogue.recent_count(),
            favorite_count: catalogue.favorite_count(),
            logs_active: config.log_to_file,
        }
    }

    async fn persist(&self, save: impl FnOnce(&mut Config) -> Result<(), ConfigError>) {
        let mut config = self.config.lock().await;
        if let Err(err) = save(&mut config) {
            tracing::warn!(target: "server", error = %err, "failed to save config");
        }
    }
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    server_handle: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.server_handle.await;
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(main_page))
        .route("/channels.xml", get(channels))
        .route("/category.xml", get(category))
        .route("/channel-options.xml", get(channel_options))
        .route("/player.xml", get(player))
        .route("/recent.xml", get(recent))
        .route("/favorites.xml", get(favorites))
        .route("/toggle-favorite.xml", get(toggle_favorite).post(toggle_favorite))
        .route("/search.xml", get(search))
        .route("/search-results.xml", get(search_results))
        .route("/settings.xml", get(settings).post(settings))
        .route("/set-m3u.xml", get(set_m3u).post(set_m3u))
        .route("/reload-channels.xml", get(reload_channels).post(reload_channels))
        .route("/clear-recent.xml", get(clear_recent).post(clear_recent))
        .route("/clear-favorites.xml", get(clear_favorites).post(clear_favorites))
        .route("/logs.xml", get(logs))
        .route("/logo/:file", get(logo))
        .route(MISSING_LOGO, get(missing_logo))
        .route(CERTIFICATE_PATH, get(certificate))
        .with_state(state)
}

pub async fn start_server(addr: SocketAddr, state: Arc<ServerState>) -> Result<ServerHandle> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    let graceful = axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });

    let handle = tokio::spawn(async move {
        if let Err(err) = graceful.await {
            tracing::error!(target: "server", error = %err, "catalogue server error");
        }
    });
    tracing::info!(target: "server", addr = %local_addr, "catalogue server listening");

    Ok(ServerHandle {
        addr: local_addr,
        shutdown_tx,
        server_handle: handle,
    })
}

#[derive(Debug, Deserialize)]
struct CategoryQuery {
    #[serde(default)]
    category: String,
}

#[derive(Debug, Deserialize)]
struct ChannelQuery {
    #[serde(default)]
    category: String,
    #[serde(default)]
    channel: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    term: String,
}

#[derive(Debug, Deserialize)]
struct M3uQuery {
    #[serde(default)]
    m3u: String,
}

async fn main_page(page: PageContext) -> Xml {
    Xml(page.pages().main())
}

async fn channels(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    let catalogue = state.catalogue.read().await;
    Xml(page.pages().channels(&catalogue))
}

async fn category(
    State(state): State<Arc<ServerState>>,
    page: PageContext,
    Query(query): Query<CategoryQuery>,
) -> PageResult {
    let catalogue = state.catalogue.read().await;
    let category = catalogue.category(&query.category)?;
    Ok(Xml(page.pages().category(&category.name, &category.channels)))
}

async fn channel_options(
    State(state): State<Arc<ServerState>>,
    page: PageContext,
    Query(query): Query<ChannelQuery>,
) -> PageResult {
    let catalogue = state.catalogue.read().await;
    let channel = catalogue.channel(&query.category, &query.channel)?;
    Ok(Xml(page.pages().channel_options(channel)))
}

async fn player(
    State(state): State<Arc<ServerState>>,
    page: PageContext,
    Query(query): Query<ChannelQuery>,
) -> PageResult {
    let (channel, recents) = {
        let mut catalogue = state.catalogue.write().await;
        catalogue.mark_recent(&query.category, &query.channel)?;
        let channel = catalogue.channel(&query.category, &query.channel)?.clone();
        (channel, catalogue.recent_ids())
    };
    tracing::info!(target: "server", channel = %channel.title, "playing channel");
    state.persist(|config| config.save_recents(recents)).await;
    Ok(Xml(page.pages().player(&channel)))
}

async fn recent(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    let catalogue = state.catalogue.read().await;
    Xml(page
        .pages()
        .channel_list("com.atvkit.recent", "recent", &catalogue.recent_channels()))
}

async fn favorites(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    let catalogue = state.catalogue.read().await;
    Xml(page
        .pages()
        .channel_list("com.atvkit.favorites", "favorites", &catalogue.favorite_channels()))
}

async fn toggle_favorite(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ChannelQuery>,
) -> PageResult {
    let (favorite, favorites) = {
        let mut catalogue = state.catalogue.write().await;
        let favorite = catalogue.toggle_favorite(&query.category, &query.channel)?;
        (favorite, catalogue.favorite_ids())
    };
    tracing::debug!(target: "server", channel = %query.channel, favorite, "toggled favorite");
    state.persist(|config| config.save_favorites(favorites)).await;
    Ok(Xml(Document::new(Element::new("atv"))))
}

async fn search(page: PageContext) -> Xml {
    Xml(page.pages().search())
}

async fn search_results(
    State(state): State<Arc<ServerState>>,
    page: PageContext,
    Query(query): Query<SearchQuery>,
) -> Xml {
    let results = state.catalogue.read().await.search(&query.term);
    Xml(page.pages().search_results(&results))
}

async fn settings(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    Xml(page.pages().settings(&state.settings_data().await))
}

async fn set_m3u(
    State(state): State<Arc<ServerState>>,
    page: PageContext,
    Query(query): Query<M3uQuery>,
) -> Xml {
    tracing::info!(target: "server", m3u = %query.m3u, "playlist address changed");
    state.persist(|config| config.save_m3u_path(query.m3u)).await;
    Xml(page.pages().settings(&state.settings_data().await))
}

async fn reload_channels(State(state): State<Arc<ServerState>>, page: PageContext) -> PageResult {
    let (path, recents, favorites) = {
        let config = state.config.lock().await;
        (config.m3u_path.clone(), config.recents.clone(), config.favorites.clone())
    };
    if path.is_empty() {
        return Err(PageError::NoPlaylist);
    }
    let mut catalogue = m3u::load(&path).await?;
    state.logos.localize(&mut catalogue).await;
    catalogue.restore(&recents, &favorites);
    tracing::info!(target: "server", channels = catalogue.channel_count(), "reloaded channels");
    *state.catalogue.write().await = catalogue;
    Ok(Xml(page.pages().settings(&state.settings_data().await)))
}

async fn clear_recent(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    state.catalogue.write().await.clear_recents();
    state.persist(Config::clear_recents).await;
    Xml(page.pages().settings(&state.settings_data().await))
}

async fn clear_favorites(State(state): State<Arc<ServerState>>, page: PageContext) -> Xml {
    state.catalogue.write().await.clear_favorites();
    state.persist(Config::clear_favorites).await;
    Xml(page.pages().settings(&state.settings_data().await))
}

async fn logs(State(state): State<Arc<ServerState>>, page: PageContext) -> PageResult {
    let dir = state.config.lock().await.logging_path.clone();
    let path = dir.join(format!("{}.log", chrono::Utc::now().format("%Y-%m-%d")));
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(PageError::Logs)?;
    Ok(Xml(page.pages().logs(&contents)))
}

async fn serve_file(path: &Path, content_type: &'static str) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        Err(err) => {
            tracing::debug!(target: "server", path = %path.display(), error = %err, "file not served");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

async fn logo(State(state): State<Arc<ServerState>>, UrlPath(file): UrlPath<String>) -> Response {
    if file.contains("..") || file.contains(['/', '\\']) {
        return StatusCode::NOT_FOUND.into_response();
    }
    serve_file(&state.logos.dir().join(file), "image/png").await
}

static MISSING_LOGO_PNG: LazyLock<Vec<u8>> = LazyLock::new(|| {
    m3u::placeholder_png().unwrap_or_else(|err| {
        tracing::error!(target: "server", error = %err, "failed to draw placeholder logo");
        Vec::new()
    })
});

async fn missing_logo() -> Response {
    if MISSING_LOGO_PNG.is_empty() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(header::CONTENT_TYPE, "image/png")], MISSING_LOGO_PNG.as_slice()).into_response()
}

async fn certificate(State(state): State<Arc<ServerState>>) -> Response {
    let Some(path) = state.config.lock().await.cer_path.clone() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    serve_file(&path, "application/x-x509-ca-cert").await
}
