use std::fmt;

/// CORS configuration error
///
/// Returned by `CorsPolicyBuilder::build()` when the configured origin cannot
/// be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsConfigError {
    /// No origin was configured
    ///
    /// CORS is switched off by leaving the origin unset, not by an empty value.
    EmptyOrigin,
    /// Invalid origin format
    ///
    /// The origin string does not match the expected format (scheme://host[:port]).
    InvalidOriginFormat {
        /// The invalid origin string
        origin: String,
    },
}

impl fmt::Display for CorsConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsConfigError::EmptyOrigin => {
                write!(
                    f,
                    "CORS configuration error: the allowed origin is empty. \
                    Use an origin such as https://example.com or the wildcard __ALL."
                )
            }
            CorsConfigError::InvalidOriginFormat { origin } => {
                write!(
                    f,
                    "CORS configuration error: Invalid origin format '{}'. \
                    Expected format: scheme://host[:port] (e.g., https://example.com)",
                    origin
                )
            }
        }
    }
}

impl std::error::Error for CorsConfigError {}
