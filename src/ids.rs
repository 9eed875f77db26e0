use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Correlator minted for requests that arrive without `Fiware-Correlator`.
///
/// Backed by a ULID so generated correlators sort by creation time.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct CorrelatorId(pub ulid::Ulid);

impl CorrelatorId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for CorrelatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for CorrelatorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CorrelatorId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(CorrelatorId(ulid::Ulid::from_string(s)?))
    }
}
