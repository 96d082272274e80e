pub mod batch;
pub mod cache;
pub mod convert;
pub mod setup;
pub mod ui;

use crate::core::{ConvertError, ErrorKind};

/// Turns a failed command into the line shown to the user.
///
/// Conversion failures lead with what the user can do about them; anything
/// else is printed with its full context chain.
pub fn error_message(error: &anyhow::Error) -> String {
    let Some(convert_error) = error.downcast_ref::<ConvertError>() else {
        return format!("{error:#}");
    };
    let headline = match convert_error.kind() {
        ErrorKind::Input => "could not understand your input",
        ErrorKind::Unreachable => "could not reach the rate service",
        ErrorKind::NoData => "rate service returned no data for that currency",
    };
    format!("{headline}: {convert_error}")
}
