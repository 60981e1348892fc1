use std::fmt;

/// Non-fatal, user-facing messages produced while searching.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The typed address did not resolve; the device position was used instead.
    AddressUnresolved { address: String },
    UnknownFilter { field: String },
    InvalidFilterValue { field: String, value: String },
    /// The optimizer answered without a route, possibly explaining why.
    NoResult { message: Option<String> },
    SearchFailed { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AddressUnresolved { address } => write!(
                f,
                "Could not locate \"{address}\", starting from your current position instead."
            ),
            Notice::UnknownFilter { field } => write!(f, "Ignoring unknown filter \"{field}\"."),
            Notice::InvalidFilterValue { field, value } => {
                write!(f, "Ignoring filter \"{field}\": \"{value}\" is not a number.")
            }
            Notice::NoResult { message: Some(message) } => f.write_str(message),
            Notice::NoResult { message: None } => f.write_str("No route returned."),
            Notice::SearchFailed { reason } => write!(f, "Search failed: {reason}"),
        }
    }
}
