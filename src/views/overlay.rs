use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;

use crate::host::{OverlayHost, OverlayView, TextView};
use crate::timers::{TimerId, TimerRegistry};

const STRIP_HEIGHT: f64 = 0.07;
const HORIZONTAL_PADDING: f64 = 0.05;
const TOP_PADDING: f64 = 0.35;
const COUNTER_POINT_SIZE: f64 = 22.0;
const COUNTER_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl Color {
    pub const WHITE: Color = Color {
        red: 1.0,
        green: 1.0,
        blue: 1.0,
        alpha: None,
    };

    pub fn rgba(red: f64, green: f64, blue: f64, alpha: f64) -> Self {
        Self {
            red,
            green,
            blue,
            alpha: Some(alpha),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAttributes {
    pub point_size: f64,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedText {
    pub string: String,
    pub attributes: TextAttributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMode {
    Removed,
    Forwards,
    Backwards,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    #[serde(rename = "type")]
    pub kind: String,
    pub key_path: String,
    pub from_value: f64,
    pub to_value: f64,
    pub duration: f64,
    pub removed_on_completion: bool,
    pub fill_mode: FillMode,
}

impl Animation {
    /// Opacity fade that holds its final value.
    pub fn fade(from_value: f64, to_value: f64, duration: f64) -> Self {
        Self {
            kind: "BasicAnimation".into(),
            key_path: "opacity".into(),
            from_value,
            to_value,
            duration,
            removed_on_completion: false,
            fill_mode: FillMode::Forwards,
        }
    }
}

#[derive(Default)]
struct OverlayState {
    views: HashMap<String, Rc<dyn OverlayView>>,
    message: Option<Rc<dyn TextView>>,
    seconds: u64,
    message_timer: Option<TimerId>,
}

/// Named overlay views drawn over playback, with fade in/out and the
/// elapsed-time counter strip.
#[derive(Clone)]
pub struct OverlayController {
    host: Rc<dyn OverlayHost>,
    timers: TimerRegistry,
    state: Rc<RefCell<OverlayState>>,
}

impl OverlayController {
    pub fn new(host: Rc<dyn OverlayHost>, timers: TimerRegistry) -> Self {
        Self {
            host,
            timers,
            state: Rc::new(RefCell::new(OverlayState::default())),
        }
    }

    pub fn save_view(&self, name: &str, view: Rc<dyn OverlayView>) {
        if name.is_empty() {
            return;
        }
        self.state.borrow_mut().views.insert(name.to_string(), view);
    }

    pub fn get_view(&self, name: &str) -> Option<Rc<dyn OverlayView>> {
        self.state.borrow().views.get(name).cloned()
    }

    pub fn remove_view(&self, name: &str) -> bool {
        self.state.borrow_mut().views.remove(name).is_some()
    }

    pub fn show_view(&self, name: &str, duration: f64) -> bool {
        self.animate(name, Animation::fade(0.0, 1.0, duration))
    }

    pub fn hide_view(&self, name: &str, duration: f64) -> bool {
        self.animate(name, Animation::fade(1.0, 0.0, duration))
    }

    fn animate(&self, name: &str, animation: Animation) -> bool {
        let Some(view) = self.get_view(name) else {
            tracing::debug!(target: "views", overlay = name, "no overlay to animate");
            return false;
        };
        tracing::debug!(target: "views", overlay = name, to = animation.to_value, "animating overlay");
        view.add_animation(animation, name);
        true
    }

    /// Builds the counter strip along the bottom of `screen`, presents it
    /// and starts the once-a-second counter.
    pub fn initiate_view(&self, name: &str, screen: Frame) -> Rc<dyn OverlayView> {
        let height = screen.height * STRIP_HEIGHT;
        let container_frame = Frame::new(
            screen.x,
            screen.y + screen.height - height,
            screen.width,
            height,
        );
        let container = self.host.create_view();
        container.set_frame(container_frame);
        container.set_background(Color::rgba(0.188, 0.188, 0.188, 0.7));
        container.set_alpha(1.0);

        let top_padding = container_frame.height * TOP_PADDING;
        let horizontal_padding = container_frame.width * HORIZONTAL_PADDING;
        let message = self.host.create_text_view();
        message.set_frame(Frame::new(
            horizontal_padding,
            0.0,
            container_frame.width - 2.0 * horizontal_padding,
            container_frame.height - top_padding,
        ));

        self.stop_counter();
        {
            let mut state = self.state.borrow_mut();
            state.seconds = 0;
            state.message = Some(Rc::clone(&message));
        }
        let controller = self.clone();
        let timer = self
            .timers
            .set_interval(COUNTER_INTERVAL_MS, move || controller.update_message());
        self.state.borrow_mut().message_timer = Some(timer);
        self.update_message();

        container.add_subview(message);
        self.host.present(Rc::clone(&container));
        self.save_view(name, Rc::clone(&container));
        container
    }

    fn update_message(&self) {
        let (message, seconds) = {
            let mut state = self.state.borrow_mut();
            let Some(message) = state.message.clone() else {
                return;
            };
            let seconds = state.seconds;
            state.seconds += 1;
            (message, seconds)
        };
        message.set_text(AttributedText {
            string: format!("We have been playing for {seconds} seconds."),
            attributes: TextAttributes {
                point_size: COUNTER_POINT_SIZE,
                color: Color::WHITE,
            },
        });
    }

    /// Stops the counter timer, if running.
    pub fn stop_counter(&self) -> bool {
        let timer = self.state.borrow_mut().message_timer.take();
        match timer {
            Some(timer) => self.timers.clear_timer(timer),
            None => false,
        }
    }

    pub fn seconds_counted(&self) -> u64 {
        self.state.borrow().seconds
    }
}
