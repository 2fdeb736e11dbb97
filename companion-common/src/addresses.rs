//! Bus addresses of the NLP capabilities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Version of the address set and payload layouts below.
///
/// Bumped whenever an address is renamed or a payload shape changes.
pub const BUS_PROTOCOL_VERSION: u32 = 1;

/// Capabilities reachable on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NlpAddress {
    /// text -> token array
    Tokens,
    /// token array -> POS tag array
    PosTagging,
    /// text -> sentence array
    Sentences,
    /// token array -> person name array
    PersonName,
    /// text (or reference id) -> analyzed text (or reference id)
    Analyze,
}

impl NlpAddress {
    pub const ALL: [NlpAddress; 5] = [
        NlpAddress::Tokens,
        NlpAddress::PosTagging,
        NlpAddress::Sentences,
        NlpAddress::PersonName,
        NlpAddress::Analyze,
    ];

    pub fn address(&self) -> &'static str {
        match self {
            NlpAddress::Tokens => "nlp.tokens",
            NlpAddress::PosTagging => "nlp.postagging",
            NlpAddress::Sentences => "nlp.sentences",
            NlpAddress::PersonName => "nlp.personname",
            NlpAddress::Analyze => "nlp.analyze",
        }
    }
}

impl fmt::Display for NlpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.address())
    }
}

impl FromStr for NlpAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NlpAddress::ALL
            .into_iter()
            .find(|a| a.address() == s)
            .ok_or_else(|| Error::NoHandler(s.to_string()))
    }
}
