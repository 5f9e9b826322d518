pub mod console;
pub mod json;

pub use console::{format_session_line, print_summary};
pub use json::{to_pretty_json, write_json};
