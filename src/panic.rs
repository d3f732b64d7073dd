//! Formatting of panic payloads raised by custom route handlers.

use std::{any::Any, fmt};

/// Wrapper that formats a panic payload when logged or displayed.
///
/// `String` and `&'static str` payloads print as-is; anything else prints a
/// placeholder naming the payload as opaque.
///
/// ```
/// use netcondition::panic::format_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(format_panic(payload.as_ref()).to_string(), "boom");
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
/// assert_eq!(
///     format_panic(payload.as_ref()).to_string(),
///     "<non-string panic payload>"
/// );
/// ```
#[derive(Debug)]
#[must_use]
pub struct PanicMessage<'a>(&'a (dyn Any + Send));

impl fmt::Display for PanicMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(s) = self.0.downcast_ref::<String>() {
            f.write_str(s)
        } else if let Some(s) = self.0.downcast_ref::<&'static str>() {
            f.write_str(s)
        } else {
            f.write_str("<non-string panic payload>")
        }
    }
}

/// Borrow a caught panic payload for display.
///
/// Pass the payload itself (`payload.as_ref()`), not a reference to its box.
pub fn format_panic(panic: &(dyn Any + Send)) -> PanicMessage<'_> { PanicMessage(panic) }
