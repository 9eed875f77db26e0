use std::fmt;
use std::time::{Duration, Instant};

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::state::{ConnectionState, RequestKind, Verb};

/// A service routine: renders the answer for a matched request.
///
/// Failures are recorded on the state with
/// [`ConnectionState::fail`]; the returned string is then ignored unless it
/// is non-empty (an operation-specific error body).
pub type ServiceRoutine = fn(&mut ConnectionState<'_>, &dyn Backend) -> String;

/// Verbs served for a path, as listed in an `Allow` header.
pub type AllowedVerbs = SmallVec<[Verb; 6]>;

/// One entry of the service table.
#[derive(Clone, Copy)]
pub struct RestService {
    pub verb: Verb,
    /// Path template, `*` matching one segment.
    pub template: &'static str,
    pub kind: RequestKind,
    pub routine: ServiceRoutine,
    /// Name used in logs.
    pub name: &'static str,
}

impl fmt::Debug for RestService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestService")
            .field("verb", &self.verb)
            .field("template", &self.template)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Wildcard,
}

#[derive(Debug, Clone)]
struct CompiledService {
    service: RestService,
    segments: Vec<Segment>,
}

fn compile(template: &'static str) -> Vec<Segment> {
    template
        .split('/')
        .skip(1)
        .map(|segment| match segment {
            "*" => Segment::Wildcard,
            literal => Segment::Literal(literal),
        })
        .collect()
}

/// Match `path` against compiled segments, collecting wildcard captures.
fn capture<'r>(segments: &[Segment], path: &'r str) -> Option<SmallVec<[&'r str; 2]>> {
    let mut wildcards = SmallVec::new();
    let mut parts = path.split('/').skip(1);
    for segment in segments {
        let part = parts.next()?;
        match segment {
            Segment::Literal(literal) if *literal == part => {}
            Segment::Literal(_) => return None,
            Segment::Wildcard if part.is_empty() => return None,
            Segment::Wildcard => wildcards.push(part),
        }
    }
    if parts.next().is_some() {
        return None;
    }
    Some(wildcards)
}

/// A matched service and the segments its wildcards captured.
#[derive(Debug, Clone)]
pub struct RouteMatch<'s, 'r> {
    pub service: &'s RestService,
    pub wildcards: SmallVec<[&'r str; 2]>,
}

/// Result of [`Router::route`].
#[derive(Debug, Clone)]
pub enum RouteResult<'s, 'r> {
    Matched(RouteMatch<'s, 'r>),
    /// The path exists, but not for this verb.
    MethodNotAllowed { allowed: AllowedVerbs },
    NotFound,
}

/// Service table compiled for matching.
#[derive(Debug, Clone, Default)]
pub struct Router {
    services: Vec<CompiledService>,
}

impl Router {
    /// Compile the service table. Entries are tried in the given order.
    #[must_use]
    pub fn new(services: Vec<RestService>) -> Self {
        let services: Vec<CompiledService> = services
            .into_iter()
            .map(|service| CompiledService {
                segments: compile(service.template),
                service,
            })
            .collect();

        let summary: Vec<String> = services
            .iter()
            .take(10)
            .map(|s| format!("{} {}", s.service.verb.as_str(), s.service.template))
            .collect();
        info!(
            services_count = services.len(),
            services_summary = ?summary,
            "Service table loaded"
        );

        Self { services }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Verbs served for `path`, in table order and without repetitions.
    #[must_use]
    pub fn allowed_verbs(&self, path: &str) -> AllowedVerbs {
        let mut allowed = AllowedVerbs::new();
        for compiled in &self.services {
            if capture(&compiled.segments, path).is_some() && !allowed.contains(&compiled.service.verb) {
                allowed.push(compiled.service.verb);
            }
        }
        allowed
    }

    /// Find the service for `verb` and `path`.
    #[must_use]
    pub fn route<'s, 'r>(&'s self, verb: Verb, path: &'r str) -> RouteResult<'s, 'r> {
        debug!(verb = verb.as_str(), path, "Route match attempt");
        let started = Instant::now();

        let mut allowed = AllowedVerbs::new();
        for compiled in &self.services {
            let Some(wildcards) = capture(&compiled.segments, path) else {
                continue;
            };
            if compiled.service.verb == verb {
                let elapsed = started.elapsed();
                if elapsed > Duration::from_millis(1) {
                    warn!(
                        verb = verb.as_str(),
                        path,
                        service = compiled.service.name,
                        duration_us = elapsed.as_micros() as u64,
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        verb = verb.as_str(),
                        path,
                        service = compiled.service.name,
                        wildcards = ?wildcards,
                        "Route matched"
                    );
                }
                return RouteResult::Matched(RouteMatch {
                    service: &compiled.service,
                    wildcards,
                });
            }
            if !allowed.contains(&compiled.service.verb) {
                allowed.push(compiled.service.verb);
            }
        }

        if allowed.is_empty() {
            warn!(verb = verb.as_str(), path, "No route matched");
            RouteResult::NotFound
        } else {
            debug!(verb = verb.as_str(), path, allowed = ?allowed, "Path served for other verbs");
            RouteResult::MethodNotAllowed { allowed }
        }
    }
}

/// `Allow` header value: verbs joined with `", "`.
#[must_use]
pub fn allow_header(allowed: &[Verb]) -> String {
    allowed
        .iter()
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
