use serde::{Deserialize, Serialize};
use std::fmt;

/// A member of a trip who pays for or shares in expenses.
///
/// Participants are identified by name alone. Names must be unique within
/// one trip; the engine never merges or disambiguates them.
///
/// Ordering is lexicographic by name, which is what the settlement optimizer
/// uses to break ties between equal balances.
///
/// # Examples
///
/// ```
/// use settlement_engine::core::participant::Participant;
///
/// let alice = Participant::new("Alice");
/// let bob = Participant::new("Bob");
/// assert_ne!(alice, bob);
/// assert!(alice < bob);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Participant(String);

impl Participant {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The participant's display name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Participant {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Participant {
    fn from(s: String) -> Self {
        Self(s)
    }
}
