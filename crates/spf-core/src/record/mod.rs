//! SPF record model
//!
//! In-memory form of a single SPF policy and its TXT wire form:
//!
//! ```text
//! v=spf1 (ip4:<cidr> | ip6:<cidr> | include:<domain>)* <qualifier>all
//! ```
//!
//! Only `ip4`, `ip6`, `include` and the trailing `all` are understood. Any
//! other mechanism or modifier is a [`Error::Parse`]. CIDR text is carried
//! verbatim and never validated.
//!
//! Serialization always emits fields in the fixed order version, ip4, ip6,
//! include, all. Order inside each field is the stored insertion order.

mod qualifier;

pub use qualifier::Qualifier;

use indexmap::IndexSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Protocol version tag
pub const SPF_VERSION: &str = "spf1";

/// Signature every SPF TXT value starts with
pub const SPF_SIGNATURE: &str = "v=spf1";

/// One SPF policy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpfRecord {
    /// `ip4:` entries, unique, insertion-ordered
    pub ip4: IndexSet<String>,

    /// `ip6:` entries, unique, insertion-ordered
    pub ip6: IndexSet<String>,

    /// `include:` domains; duplicates are allowed and order is significant
    pub include: Vec<String>,

    /// Qualifier of the trailing `all`
    pub qualifier: Qualifier,

    /// External lookups performed while flattening into this record
    pub lookup_count: usize,
}

impl SpfRecord {
    /// Create an empty `?all` record
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TXT text into a fresh record
    pub fn parse(txt: &str) -> Result<Self> {
        let mut record = Self::new();
        record.reparse(txt)?;
        Ok(record)
    }

    /// Re-parse `txt` into this record.
    ///
    /// `ip4`, `ip6` and `include` are replaced. The qualifier is only replaced
    /// when `txt` carries an `all` mechanism. On error `self` is left as it was.
    pub fn reparse(&mut self, txt: &str) -> Result<()> {
        if !txt.starts_with(SPF_SIGNATURE) {
            return Err(Error::parse(format!("Not a valid SPF record: {}", txt)));
        }

        let mut ip4 = IndexSet::new();
        let mut ip6 = IndexSet::new();
        let mut include = Vec::new();
        let mut qualifier = self.qualifier;

        for token in txt.split_whitespace() {
            if let Some(version) = token.strip_prefix("v=") {
                if version != SPF_VERSION {
                    return Err(Error::parse(format!("Unsupported SPF version {}", token)));
                }
            } else if let Some(cidr) = token.strip_prefix("ip4:") {
                ip4.insert(cidr.to_string());
            } else if let Some(cidr) = token.strip_prefix("ip6:") {
                ip6.insert(cidr.to_string());
            } else if let Some(domain) = token.strip_prefix("include:") {
                include.push(domain.to_string());
            } else if token.ends_with("all") {
                qualifier = Qualifier::from_all_token(token)?;
            } else {
                return Err(Error::parse(format!("Unrecognized SPF mechanism {}", token)));
            }
        }

        self.ip4 = ip4;
        self.ip6 = ip6;
        self.include = include;
        self.qualifier = qualifier;
        Ok(())
    }

    /// Serialize to the TXT wire form
    pub fn to_txt(&self) -> String {
        self.to_string()
    }

    /// Number of `ip4` plus `ip6` mechanisms
    pub fn cidr_count(&self) -> usize {
        self.ip4.len() + self.ip6.len()
    }

    /// Whether the record still references other domains
    pub fn has_includes(&self) -> bool {
        !self.include.is_empty()
    }

    /// Merge `other` into this record.
    ///
    /// ip4/ip6 entries already present are skipped, includes are appended
    /// unconditionally and the qualifier keeps the stricter outcome.
    /// `lookup_count` is untouched.
    pub fn merge(&mut self, other: &SpfRecord) -> &mut Self {
        for cidr in &other.ip4 {
            if !self.ip4.contains(cidr) {
                self.ip4.insert(cidr.clone());
            }
        }
        for cidr in &other.ip6 {
            if !self.ip6.contains(cidr) {
                self.ip6.insert(cidr.clone());
            }
        }
        self.include.extend(other.include.iter().cloned());
        self.qualifier = self.qualifier.combine(other.qualifier);
        self
    }

    /// Merge every record in `others`, in order
    pub fn merge_all<'a>(&mut self, others: impl IntoIterator<Item = &'a SpfRecord>) -> &mut Self {
        for other in others {
            self.merge(other);
        }
        self
    }

    /// Value-in/value-out form of [`SpfRecord::merge_all`]
    pub fn merged<'a>(mut self, others: impl IntoIterator<Item = &'a SpfRecord>) -> Self {
        self.merge_all(others);
        self
    }
}

impl fmt::Display for SpfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SPF_SIGNATURE)?;
        for cidr in &self.ip4 {
            write!(f, " ip4:{}", cidr)?;
        }
        for cidr in &self.ip6 {
            write!(f, " ip6:{}", cidr)?;
        }
        for domain in &self.include {
            write!(f, " include:{}", domain)?;
        }
        write!(f, " {}all", self.qualifier)
    }
}

impl FromStr for SpfRecord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A TXT value to publish at a DNS name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedRecord {
    name: String,
    content: String,
}

impl NamedRecord {
    /// Pair a DNS name with TXT content
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// DNS name (fully qualified, no trailing dot)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// TXT content
    pub fn content(&self) -> &str {
        &self.content
    }
}
