use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Latency/cost class of an archive retrieval job.
///
/// Only used when a job is created; the service does not report it back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum RetrievalTier {
    /// Minutes, most expensive.
    Expedited,
    /// Hours.
    #[default]
    Standard,
    /// Up to half a day, cheapest.
    Bulk,
}
impl RetrievalTier {
    /// Name as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expedited => "Expedited",
            Self::Standard => "Standard",
            Self::Bulk => "Bulk",
        }
    }
}
impl FromStr for RetrievalTier {
    // Not `Error`: clap needs a `std::error::Error` here.
    type Err = ErrorKind;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "expedited" => Self::Expedited,
            "standard" => Self::Standard,
            "bulk" => Self::Bulk,
            _ => return Err(ErrorKind::UnknownTier(s.to_string())),
        })
    }
}
impl TryFrom<String> for RetrievalTier {
    type Error = ErrorKind;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
impl From<RetrievalTier> for String {
    fn from(tier: RetrievalTier) -> Self {
        tier.as_str().to_string()
    }
}
impl Display for RetrievalTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
