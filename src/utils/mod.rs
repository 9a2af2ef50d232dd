pub mod error;
pub mod logging;
pub mod string_utils;

pub use error::*;
pub use string_utils::{mask_secret, status_text, truncate_safe, truncate_with_suffix};
