//! Parameters of an event-log record.

use std::fmt;

/// One positional argument of an event-log record.
///
/// Used only to build log records, never process arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventArg {
    Text(String),
    /// Rendered in decimal.
    UnsignedNumber(u64),
    /// A signed status code, rendered as lowercase two's-complement hex.
    ErrorCode(i32),
    /// An OS error number, rendered as the OS's message for it.
    SystemErrorMessage(i32),
}

impl EventArg {
    pub fn text(value: impl Into<String>) -> Self {
        EventArg::Text(value.into())
    }

    /// Render to the display string placed in the record.
    pub fn render(&self) -> String {
        match self {
            EventArg::Text(s) => s.clone(),
            EventArg::UnsignedNumber(n) => n.to_string(),
            EventArg::ErrorCode(code) => format!("{:x}", code),
            EventArg::SystemErrorMessage(code) => {
                std::io::Error::from_raw_os_error(*code).to_string()
            }
        }
    }
}

impl fmt::Display for EventArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<u32> for EventArg {
    fn from(n: u32) -> Self {
        EventArg::UnsignedNumber(u64::from(n))
    }
}

impl From<u64> for EventArg {
    fn from(n: u64) -> Self {
        EventArg::UnsignedNumber(n)
    }
}

impl From<&str> for EventArg {
    fn from(s: &str) -> Self {
        EventArg::Text(s.to_string())
    }
}

impl From<String> for EventArg {
    fn from(s: String) -> Self {
        EventArg::Text(s)
    }
}

/// Render an ordered argument list.
pub fn render_all(args: &[EventArg]) -> Vec<String> {
    args.iter().map(EventArg::render).collect()
}
