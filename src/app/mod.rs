//! Handlers the host calls into: app lifecycle, authentication, navigation
//! bar, playback and screensaver.

mod auth;
pub(crate) mod context;
mod navigation;
mod player;
mod screensaver;

pub use auth::{AuthResult, AUTH_TOKEN_KEY, ITMS_LINK_KEY};
pub use context::{AppContext, HostHandles, LOGOUT_PAGE_ID};
pub use navigation::{Navbar, NavigationError, NavigationEvent, FAILURE_LABEL, NAVIGATION_FAILED};
pub use player::{MoreAssets, PlayerEvent, PlayerSession, UnskippableEvent, COUNTER_VIEW};
pub use screensaver::{selection_entry, PhotoCollection, PhotoQuery, QueryFilter};
