//! Rebalancing tactics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Rebalancing policy governing a portfolio. Fixed when the portfolio is
/// created; a portfolio never moves from one tactic to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tactic {
    /// Buy and hold: prices and values refresh, holdings never change
    Static,
    /// Equal-weight reset once the configured interval has elapsed
    Regular,
    /// Equal-weight reset when any holding drops past the threshold
    Trigger,
}

impl Tactic {
    pub const ALL: [Tactic; 3] = [Tactic::Static, Tactic::Regular, Tactic::Trigger];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tactic::Static => "STATIC",
            Tactic::Regular => "REGULAR",
            Tactic::Trigger => "TRIGGER",
        }
    }
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tactic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STATIC" => Ok(Tactic::Static),
            "REGULAR" => Ok(Tactic::Regular),
            "TRIGGER" => Ok(Tactic::Trigger),
            other => Err(format!("unknown tactic `{}`", other)),
        }
    }
}
