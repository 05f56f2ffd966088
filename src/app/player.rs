use std::cell::RefCell;
use std::rc::Rc;

use super::context::AppContext;
use crate::ajax::{Callbacks, RequestError, RequestHandle, RequestHooks, RequestId, RequestOptions, Response};
use crate::storage::{data, delete_data};
use crate::views::{Frame, OverlayController};
use crate::xml::Element;

pub const COUNTER_VIEW: &str = "counter";

const BOOKMARK_URL: &str = "bookmark-url";
const BOOKMARK_TIME: &str = "bookmark-time";
const ALREADY_WATCHED_AD: &str = "already-watched-ad";
const IN_AD: &str = "in-ad";
const ALREADY_WATCHED_EVENT: &str = "already-watched-event";
const IN_EVENT: &str = "in-event";
const RESUME_TIME: &str = "resume-time";

/// Transport events the player asks permission for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEvent {
    FastForward,
    Pause,
    Play,
    Rewind,
    SkipBack,
    SkipForward,
}

/// Stretch of the stream the viewer has to watch once before seeking past
/// it. Times are seconds from the start of the asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnskippableEvent {
    pub start: f64,
    pub end: f64,
}

impl Default for UnskippableEvent {
    fn default() -> Self {
        Self {
            start: 10.0,
            end: 15.0,
        }
    }
}

/// Next playlist part, `None` once the server reports the end, or the
/// message to show on failure.
pub type MoreAssets = Result<Option<Vec<Element>>, String>;

#[derive(Default)]
struct PlaybackState {
    playlist_base: Option<String>,
    next_part: u32,
    playlist_request: Option<RequestId>,
}

/// Per-playback bookkeeping: bookmarks, dynamic playlists, the elapsed
/// time overlay and the optional unskippable event.
#[derive(Clone)]
pub struct PlayerSession {
    ctx: AppContext,
    overlay: OverlayController,
    event: Option<UnskippableEvent>,
    state: Rc<RefCell<PlaybackState>>,
}

impl PlayerSession {
    pub fn new(ctx: AppContext, overlay: OverlayController) -> Self {
        Self {
            ctx,
            overlay,
            event: None,
            state: Rc::new(RefCell::new(PlaybackState::default())),
        }
    }

    pub fn with_unskippable_event(mut self, event: UnskippableEvent) -> Self {
        self.event = Some(event);
        self
    }

    pub fn overlay(&self) -> &OverlayController {
        &self.overlay
    }

    pub fn will_start_playing(&self, asset: &Element, screen: Frame) {
        tracing::info!(target: "app", "playback starting");
        self.overlay.initiate_view(COUNTER_VIEW, screen);
        self.remember(ALREADY_WATCHED_AD, "false");
        self.remember(IN_AD, "false");

        let metadata = asset.element_by_tag_name("myMetadata");
        match metadata.and_then(|metadata| metadata.element_by_tag_name("bookmarkURL")) {
            Some(bookmark) => self.remember(BOOKMARK_URL, &bookmark.text_content()),
            None => delete_data(self.ctx.session(), BOOKMARK_URL),
        }

        let playlist_base = metadata
            .and_then(|metadata| metadata.element_by_tag_name("playlistBaseURL"))
            .map(|base| base.text_content())
            .filter(|base| !base.is_empty());
        if let Some(base) = &playlist_base {
            tracing::debug!(target: "app", base = %base, "dynamic playlist detected");
        }
        *self.state.borrow_mut() = PlaybackState {
            playlist_base,
            next_part: 1,
            playlist_request: None,
        };
    }

    /// Whether the current asset pages in more items on demand.
    pub fn has_playlist(&self) -> bool {
        self.state.borrow().playlist_base.is_some()
    }

    /// Requests the next playlist part (`<base><part>.xml`, parts counted
    /// from 1). Returns `Ok(None)` without calling `callback` when the asset
    /// has no dynamic playlist.
    pub fn load_more_assets(
        &self,
        callback: impl FnOnce(MoreAssets) + 'static,
    ) -> Result<Option<RequestHandle>, RequestError> {
        let url = {
            let mut state = self.state.borrow_mut();
            let Some(base) = state.playlist_base.clone() else {
                return Ok(None);
            };
            let url = format!("{base}{}.xml", state.next_part);
            state.next_part += 1;
            url
        };
        tracing::debug!(target: "app", url = %url, "loading more assets");

        let handle = self
            .ctx
            .requests()
            .issue(RequestOptions::new(url), PlaylistHooks(Some(Box::new(callback))))?;
        self.state.borrow_mut().playlist_request = Some(handle.id());
        Ok(Some(handle))
    }

    /// Returns the seek target, pulled back to the start of an unwatched
    /// unskippable event.
    pub fn player_will_seek_to_time(&self, time: f64) -> f64 {
        let Some(event) = self.event else {
            return time;
        };
        if time >= event.start && !self.flag(ALREADY_WATCHED_EVENT) {
            if time > event.end {
                self.remember(RESUME_TIME, &time.to_string());
            }
            self.remember(IN_EVENT, "true");
            return event.start;
        }
        time
    }

    pub fn player_should_handle_event(&self, event: PlayerEvent, time: f64) -> bool {
        let Some(window) = self.event else {
            return true;
        };
        let blocked =
            time >= window.start && time < window.end && !self.flag(ALREADY_WATCHED_EVENT);
        if blocked {
            tracing::debug!(target: "app", ?event, time, "player event blocked inside event");
        }
        !blocked
    }

    /// Records the playhead for the bookmark. Returns the time to seek back
    /// to when playback has just left the unskippable event.
    pub fn player_time_did_change(&self, time: f64) -> Option<f64> {
        if data(self.ctx.session(), BOOKMARK_URL, None).is_some() {
            self.remember(BOOKMARK_TIME, &time.to_string());
        }

        let event = self.event?;
        if !(self.flag(IN_EVENT) && time > event.end) {
            return None;
        }
        self.remember(IN_EVENT, "false");
        self.remember(ALREADY_WATCHED_EVENT, "true");
        let resume = data(self.ctx.session(), RESUME_TIME, None)?;
        delete_data(self.ctx.session(), RESUME_TIME);
        resume.parse().ok()
    }

    /// Tears the playback down: stops the counter, writes the bookmark and
    /// drops any pending playlist request.
    pub fn did_stop_playing(&self) {
        tracing::info!(target: "app", "playback stopped");
        self.overlay.stop_counter();

        if let Some(bookmark) = data(self.ctx.session(), BOOKMARK_URL, None) {
            let time = data(self.ctx.session(), BOOKMARK_TIME, None).unwrap_or_default();
            let hooks = Callbacks::new()
                .on_success(|_| tracing::debug!(target: "app", "bookmark written"))
                .on_failure(|status, response| {
                    tracing::error!(
                        target: "app",
                        status,
                        status_text = %response.status_text,
                        "bookmark write request failed"
                    );
                });
            if let Err(err) = self
                .ctx
                .requests()
                .issue(RequestOptions::new(format!("{bookmark}{time}")), hooks)
            {
                tracing::error!(target: "app", error = %err, "failed to save bookmark");
            }
            delete_data(self.ctx.session(), BOOKMARK_URL);
        }

        let pending = {
            let mut state = self.state.borrow_mut();
            state.playlist_base = None;
            state.playlist_request.take()
        };
        if let Some(id) = pending {
            self.ctx.requests().cancel(id);
        }
    }

    pub fn transport_controls_displayed(&self, duration: f64) {
        self.overlay.show_view(COUNTER_VIEW, duration);
    }

    pub fn transport_controls_hidden(&self, duration: f64) {
        self.overlay.hide_view(COUNTER_VIEW, duration);
    }

    fn remember(&self, key: &str, value: &str) {
        data(self.ctx.session(), key, Some(value));
    }

    fn flag(&self, key: &str) -> bool {
        data(self.ctx.session(), key, None).as_deref() == Some("true")
    }
}

struct PlaylistHooks(Option<Box<dyn FnOnce(MoreAssets)>>);

impl PlaylistHooks {
    fn finish(&mut self, outcome: MoreAssets) {
        if let Some(callback) = self.0.take() {
            callback(outcome);
        }
    }
}

impl RequestHooks for PlaylistHooks {
    fn success(&mut self, response: &Response) {
        let outcome = match response.document() {
            Ok(document) => Ok(Some(
                document
                    .root_element()
                    .elements_by_tag_name("httpFileVideoAsset")
                    .into_iter()
                    .cloned()
                    .collect(),
            )),
            Err(err) => Err(format!(
                "Caught exception while processing request. Aborting. Exception: {err}"
            )),
        };
        self.finish(outcome);
    }

    fn failure(&mut self, status: u16, response: &Response) {
        if status == 404 {
            tracing::debug!(target: "app", "playlist finished");
            self.finish(Ok(None));
            return;
        }
        let message = format!(
            "HTTP request failed. Status {status}: {}",
            response.status_text
        );
        tracing::error!(target: "app", "{message}");
        self.finish(Err(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ajax::testing::complete;
    use crate::app::context::testing::{test_app, TestApp};
    use crate::host::testing::FakeOverlayHost;
    use crate::timers::TimerRegistry;
    use crate::xml::Document;

    const ASSET: &str = r#"<httpFileVideoAsset id="a1"><mediaURL>http://tv/a1.mp4</mediaURL>
        <myMetadata><bookmarkURL>http://tv/bookmark?t=</bookmarkURL>
        <playlistBaseURL>http://tv/playlist/part</playlistBaseURL></myMetadata></httpFileVideoAsset>"#;

    const PART: &str = r#"<atv><body><videoPlayer><httpFileVideoAsset id="b1"/>
        <httpFileVideoAsset id="b2"/></videoPlayer></body></atv>"#;

    fn session(app: &TestApp) -> (PlayerSession, Rc<FakeOverlayHost>) {
        let host = Rc::new(FakeOverlayHost::default());
        let overlay = OverlayController::new(host.clone(), TimerRegistry::new().expect("runtime"));
        (PlayerSession::new(app.ctx.clone(), overlay), host)
    }

    fn asset(source: &str) -> Element {
        Document::parse(source).unwrap().root_element().clone()
    }

    fn sink() -> (Rc<RefCell<Option<MoreAssets>>>, impl FnOnce(MoreAssets)) {
        let slot = Rc::new(RefCell::new(None));
        let sink = slot.clone();
        (slot, move |outcome| *sink.borrow_mut() = Some(outcome))
    }

    #[tokio::test]
    async fn start_reads_metadata_and_shows_counter() {
        let app = test_app();
        let (player, host) = session(&app);
        player.will_start_playing(&asset(ASSET), Frame::new(0.0, 0.0, 1920.0, 1080.0));

        assert_eq!(host.presented(), 1);
        assert!(player.has_playlist());
        assert_eq!(
            app.ctx.session().get(BOOKMARK_URL).unwrap().as_deref(),
            Some("http://tv/bookmark?t=")
        );
        assert_eq!(app.ctx.session().get(IN_AD).unwrap().as_deref(), Some("false"));

        player.will_start_playing(&asset("<httpFileVideoAsset/>"), Frame::default());
        assert!(!player.has_playlist());
        assert_eq!(app.ctx.session().get(BOOKMARK_URL).unwrap(), None);
        player.overlay().stop_counter();
    }

    #[tokio::test]
    async fn playlist_parts_page_until_not_found() {
        let app = test_app();
        let (player, _) = session(&app);
        player.will_start_playing(&asset(ASSET), Frame::default());

        let (first, callback) = sink();
        let handle = player.load_more_assets(callback).unwrap().unwrap();
        assert_eq!(
            app.transfers.last().calls.borrow()[0],
            "open GET http://tv/playlist/part1.xml async=true"
        );
        complete(app.ctx.requests(), handle.id(), 200, PART);
        let assets = first.borrow_mut().take().unwrap().unwrap().unwrap();
        let ids: Vec<_> = assets.iter().filter_map(|asset| asset.attr("id")).collect();
        assert_eq!(ids, vec!["b1", "b2"]);

        let (second, callback) = sink();
        let handle = player.load_more_assets(callback).unwrap().unwrap();
        assert_eq!(
            app.transfers.last().calls.borrow()[0],
            "open GET http://tv/playlist/part2.xml async=true"
        );
        complete(app.ctx.requests(), handle.id(), 404, "");
        assert_eq!(*second.borrow(), Some(Ok(None)));
        player.overlay().stop_counter();
    }

    #[tokio::test]
    async fn playlist_errors_carry_the_status() {
        let app = test_app();
        let (player, _) = session(&app);
        player.will_start_playing(&asset(ASSET), Frame::default());
        let (outcome, callback) = sink();
        let handle = player.load_more_assets(callback).unwrap().unwrap();
        complete(app.ctx.requests(), handle.id(), 503, "");
        assert_eq!(
            *outcome.borrow(),
            Some(Err("HTTP request failed. Status 503: ".to_string()))
        );
        player.overlay().stop_counter();
    }

    #[tokio::test]
    async fn stop_writes_bookmark_and_cancels_playlist() {
        let app = test_app();
        let (player, _) = session(&app);
        player.will_start_playing(&asset(ASSET), Frame::default());
        player.player_time_did_change(42.5);
        let (outcome, callback) = sink();
        let pending = player.load_more_assets(callback).unwrap().unwrap();

        player.did_stop_playing();
        assert!(!app.ctx.requests().is_active(pending.id()));
        assert!(outcome.borrow().is_none());
        assert_eq!(
            app.transfers.last().calls.borrow()[0],
            "open GET http://tv/bookmark?t=42.5 async=true"
        );
        assert_eq!(app.ctx.session().get(BOOKMARK_URL).unwrap(), None);
        assert!(player.load_more_assets(|_| {}).unwrap().is_none());
    }

    #[tokio::test]
    async fn unskippable_event_holds_the_viewer() {
        let app = test_app();
        let (player, _) = session(&app);
        let player = player.with_unskippable_event(UnskippableEvent::default());

        assert!(player.player_should_handle_event(PlayerEvent::Play, 5.0));
        assert!(!player.player_should_handle_event(PlayerEvent::SkipForward, 12.0));
        assert_eq!(player.player_will_seek_to_time(4.0), 4.0);
        assert_eq!(player.player_will_seek_to_time(30.0), 10.0);

        assert_eq!(player.player_time_did_change(12.0), None);
        assert_eq!(player.player_time_did_change(15.5), Some(30.0));
        assert!(player.player_should_handle_event(PlayerEvent::FastForward, 12.0));
        assert_eq!(player.player_will_seek_to_time(30.0), 30.0);
    }

    #[tokio::test]
    async fn transport_controls_fade_the_counter() {
        let app = test_app();
        let (player, host) = session(&app);
        player.will_start_playing(&asset(ASSET), Frame::default());
        player.transport_controls_displayed(0.25);
        player.transport_controls_hidden(0.25);
        assert_eq!(host.container(0).animations.borrow().len(), 2);
        player.overlay().stop_counter();
    }
}
