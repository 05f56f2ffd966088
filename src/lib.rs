//! Client-side toolkit for XML-driven set-top box applications, plus the
//! catalogue server that feeds them.

pub mod ajax;
pub mod app;
pub mod config;
pub mod host;
pub mod loader;
pub mod logging;
pub mod m3u;
pub mod server;
pub mod storage;
pub mod timers;
pub mod util;
pub mod views;
pub mod xml;

pub use ajax::{http_registry, RequestOptions, RequestRegistry, Response};
pub use app::AppContext;
pub use config::Config;
pub use loader::DocumentLoader;
pub use views::{CallbackRegistry, ViewManager};
pub use xml::Document;
