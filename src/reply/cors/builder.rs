use url::Url;

use super::{AllowedOrigin, CorsConfigError, CorsPolicy, WILDCARD_ORIGIN};

pub const DEFAULT_EXPOSE_HEADERS: [&str; 3] = ["Fiware-Correlator", "Fiware-Total-Count", "Location"];

pub const DEFAULT_ALLOWED_HEADERS: [&str; 8] = [
    "Content-Type",
    "Fiware-Service",
    "Fiware-Servicepath",
    "Ngsiv2-AttrsFormat",
    "Fiware-Correlator",
    "X-Forwarded-For",
    "X-Real-IP",
    "X-Auth-Token",
];

pub const DEFAULT_MAX_AGE: u32 = 86400;

/// Builder for [`CorsPolicy`] with a fluent API
///
/// # Example
///
/// ```
/// use ngsi_rest::reply::cors::CorsPolicyBuilder;
///
/// let cors = CorsPolicyBuilder::new()
///     .allowed_origin("https://dashboard.example.com")
///     .max_age(600)
///     .build()
///     .unwrap();
/// assert!(!cors.is_wildcard());
/// ```
#[derive(Debug, Clone)]
pub struct CorsPolicyBuilder {
    allowed_origin: String,
    expose_headers: Vec<String>,
    allowed_headers: Vec<String>,
    max_age: u32,
}

impl CorsPolicyBuilder {
    /// Create a builder with the broker defaults
    ///
    /// - No origin (must be set before `build()`)
    /// - Exposed: `Fiware-Correlator, Fiware-Total-Count, Location`
    /// - Allowed: the FIWARE request headers plus `Content-Type`
    /// - Max age: 86400 seconds
    pub fn new() -> Self {
        Self {
            allowed_origin: String::new(),
            expose_headers: DEFAULT_EXPOSE_HEADERS.iter().map(|s| s.to_string()).collect(),
            allowed_headers: DEFAULT_ALLOWED_HEADERS.iter().map(|s| s.to_string()).collect(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Set the allowed origin
    ///
    /// `__ALL` (or `*`) allows any origin; anything else must be an exact
    /// `scheme://host[:port]` origin.
    pub fn allowed_origin(mut self, origin: &str) -> Self {
        self.allowed_origin = origin.to_string();
        self
    }

    /// Headers listed in `Access-Control-Expose-Headers`
    pub fn expose_headers(mut self, headers: &[&str]) -> Self {
        self.expose_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Headers listed in `Access-Control-Allow-Headers` on preflight replies
    pub fn allowed_headers(mut self, headers: &[&str]) -> Self {
        self.allowed_headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Preflight cache duration in seconds
    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }

    /// Build the policy
    ///
    /// # Errors
    ///
    /// - `CorsConfigError::EmptyOrigin` if no origin was set
    /// - `CorsConfigError::InvalidOriginFormat` if the origin is not
    ///   `scheme://host[:port]`
    pub fn build(self) -> Result<CorsPolicy, CorsConfigError> {
        let origin = self.allowed_origin.trim();
        let allowed_origin = if origin.is_empty() {
            return Err(CorsConfigError::EmptyOrigin);
        } else if origin == WILDCARD_ORIGIN || origin == "*" {
            AllowedOrigin::Wildcard
        } else {
            validate_origin(origin)?;
            AllowedOrigin::Exact(origin.to_string())
        };

        Ok(CorsPolicy {
            allowed_origin,
            expose_headers: self.expose_headers.join(", "),
            allowed_headers: self.allowed_headers.join(", "),
            max_age: self.max_age,
        })
    }
}

impl Default for CorsPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An origin is a scheme, a host and optionally a port. Nothing else.
fn validate_origin(origin: &str) -> Result<(), CorsConfigError> {
    let invalid = || CorsConfigError::InvalidOriginFormat {
        origin: origin.to_string(),
    };
    if origin.ends_with('/') {
        return Err(invalid());
    }
    let url = Url::parse(origin).map_err(|_| invalid())?;
    let plain = matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|h| !h.is_empty())
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
        && url.password().is_none();
    if plain {
        Ok(())
    } else {
        Err(invalid())
    }
}
