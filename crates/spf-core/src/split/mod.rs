//! Record splitting
//!
//! A single TXT response should stay under 512 octets, the domain name and
//! sibling TXT records included. A typical mechanism looks like:
//!
//! ```text
//! v=spf1 ip4:123.123.123.123/12 ip6:1234:1234:1234::12 -all
//! [--7--][---------23----------][---------23----------][-4]
//! ```
//!
//! Keeping a record within 450 octets gives `450 >= 7 + 23 * n + 4`, so at
//! most 19 CIDR mechanisms share one record.

use crate::error::{Error, Result};
use crate::record::SpfRecord;

/// CIDR mechanisms allowed in one published record
pub const MAX_MECHANISMS_PER_RECORD: usize = 19;

/// Split `record` into records of at most [`MAX_MECHANISMS_PER_RECORD`] CIDRs
pub fn split(record: &SpfRecord) -> Result<Vec<SpfRecord>> {
    split_with_capacity(record, MAX_MECHANISMS_PER_RECORD)
}

/// Split `record` into records holding at most `capacity` CIDR mechanisms.
///
/// ip4 entries are placed first and remaining room is filled with ip6
/// entries, keeping the original order. Every output inherits the input's
/// qualifier. When everything fits in one record a copy of the input is
/// returned unchanged; a record without any CIDR also yields one record.
///
/// # Errors
///
/// [`Error::Validation`] if `record` still has includes or `capacity` is 0.
pub fn split_with_capacity(record: &SpfRecord, capacity: usize) -> Result<Vec<SpfRecord>> {
    if record.has_includes() {
        return Err(Error::validation("Record cannot have includes when splitting"));
    }
    if capacity == 0 {
        return Err(Error::validation("Split capacity must be at least 1"));
    }

    let total = record.cidr_count();
    if total <= capacity {
        return Ok(vec![record.clone()]);
    }

    let mut ip4 = record.ip4.iter();
    let mut ip6 = record.ip6.iter();
    let mut records = Vec::with_capacity(total.div_ceil(capacity));

    for _ in 0..total.div_ceil(capacity) {
        let mut chunk = SpfRecord {
            qualifier: record.qualifier,
            ..SpfRecord::default()
        };

        while chunk.cidr_count() < capacity {
            if let Some(cidr) = ip4.next() {
                chunk.ip4.insert(cidr.clone());
            } else if let Some(cidr) = ip6.next() {
                chunk.ip6.insert(cidr.clone());
            } else {
                break;
            }
        }

        records.push(chunk);
    }

    Ok(records)
}
