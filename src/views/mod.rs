mod callbacks;
mod dialog;
mod manager;
mod overlay;

pub use callbacks::{CallbackRegistry, Handler, ON_LOAD_ERROR, ON_LOAD_SUCCESS, ON_UNLOAD_VIEW};
pub use dialog::{option_event, DialogOption, OptionDialog, OPTION_DIALOG_ID};
pub use manager::{ViewError, ViewHandle, ViewManager, LOAD_ERROR_ID, LOAD_ERROR_MESSAGE};
pub use overlay::{
    Animation, AttributedText, Color, FillMode, Frame, OverlayController, TextAttributes,
};
