mod date;
mod text;

pub use date::{day_name, month_name, next_day, prev_day};
pub use text::{
    accessibility_safe_string, encode_component, shuffle, software_version_is_at_least, trim,
    trim_left, trim_right, unescape, valid_email, xml_encode,
};
