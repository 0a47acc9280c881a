// # SPF Qualifier
//
// The prefix on the trailing `all` mechanism. Restrictiveness, most to least:
// `-` (fail), `~` (softfail), `?` (neutral), `+` (pass).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Restrictiveness marker of the catch-all `all` mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Qualifier {
    /// `-all`
    Fail,
    /// `~all`
    SoftFail,
    /// `?all`, the least restrictive default
    #[default]
    Neutral,
    /// `+all` (also written as a bare `all`)
    Pass,
}

impl Qualifier {
    /// The single character written in front of `all`
    pub fn as_char(self) -> char {
        match self {
            Qualifier::Fail => '-',
            Qualifier::SoftFail => '~',
            Qualifier::Neutral => '?',
            Qualifier::Pass => '+',
        }
    }

    /// Map a qualifier character back to its variant
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            '-' => Ok(Qualifier::Fail),
            '~' => Ok(Qualifier::SoftFail),
            '?' => Ok(Qualifier::Neutral),
            '+' => Ok(Qualifier::Pass),
            other => Err(Error::parse(format!("Invalid qualifier '{}'", other))),
        }
    }

    /// Parse an `all` mechanism token such as `-all` or `all`
    pub fn from_all_token(token: &str) -> Result<Self> {
        match token.strip_suffix("all") {
            Some("") => Ok(Qualifier::Pass),
            Some(prefix) => {
                let mut chars = prefix.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Self::from_char(c),
                    _ => Err(Error::parse(format!("Unrecognized SPF mechanism {}", token))),
                }
            }
            None => Err(Error::parse(format!("Unrecognized SPF mechanism {}", token))),
        }
    }

    /// Combine two qualifiers, keeping the stricter outcome.
    ///
    /// `-` on either side wins; otherwise differing qualifiers settle on `~`.
    pub fn combine(self, other: Qualifier) -> Qualifier {
        if self == other {
            self
        } else if self == Qualifier::Fail || other == Qualifier::Fail {
            Qualifier::Fail
        } else {
            Qualifier::SoftFail
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_tokens() {
        assert_eq!(Qualifier::from_all_token("-all").unwrap(), Qualifier::Fail);
        assert_eq!(Qualifier::from_all_token("~all").unwrap(), Qualifier::SoftFail);
        assert_eq!(Qualifier::from_all_token("?all").unwrap(), Qualifier::Neutral);
        assert_eq!(Qualifier::from_all_token("+all").unwrap(), Qualifier::Pass);
        assert_eq!(Qualifier::from_all_token("all").unwrap(), Qualifier::Pass);
    }

    #[test]
    fn test_bad_all_tokens() {
        assert!(Qualifier::from_all_token("xall").is_err());
        assert!(Qualifier::from_all_token("--all").is_err());
        assert!(Qualifier::from_all_token("-al").is_err());
    }

    #[test]
    fn test_combine() {
        use Qualifier::*;
        assert_eq!(Neutral.combine(Neutral), Neutral);
        assert_eq!(Pass.combine(Fail), Fail);
        assert_eq!(Fail.combine(SoftFail), Fail);
        assert_eq!(Neutral.combine(Pass), SoftFail);
        assert_eq!(SoftFail.combine(Neutral), SoftFail);
    }
}
