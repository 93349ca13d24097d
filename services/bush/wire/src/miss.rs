//! Miss-field codec for loss reports.
//!
//! A miss field is a sequence of tagged records:
//!
//! ```text
//! tag 0: [0][count:u32][index:u32 * count]   unique indices
//! tag 1: [1][begin:u32][end:u32]             contiguous range
//! ```
//!
//! Encoding emits one range record per range in input order, followed by a
//! single unique record holding every unique index.

use crate::PacketError;
use bytes::{Buf, BufMut, BytesMut};

const TAG_UNIQUE: u8 = 0;
const TAG_RANGE: u8 = 1;

const RANGE_RECORD_SIZE: usize = 8;
const COUNT_SIZE: usize = 4;
const INDEX_SIZE: usize = 4;

/// One missing packet index, or a contiguous run of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MissEntry {
    /// A single missing index
    Unique(u32),
    /// A contiguous range of missing indices
    Range {
        /// First missing index
        begin: u32,
        /// Last missing index
        end: u32,
    },
}

/// Size in bytes of the encoding of `entries`
pub fn encoded_len(entries: &[MissEntry]) -> usize {
    let mut ranges = 0;
    let mut uniques = 0;
    for entry in entries {
        match entry {
            MissEntry::Unique(_) => uniques += 1,
            MissEntry::Range { .. } => ranges += 1,
        }
    }
    let unique_record = if uniques > 0 {
        1 + COUNT_SIZE + uniques * INDEX_SIZE
    } else {
        0
    };
    ranges * (1 + RANGE_RECORD_SIZE) + unique_record
}

/// Reorder `entries` the way the codec lays them out: ranges in input
/// order, then unique indices in input order
pub fn wire_order(mut entries: Vec<MissEntry>) -> Vec<MissEntry> {
    entries.sort_by_key(|entry| matches!(entry, MissEntry::Unique(_)));
    entries
}

/// Encode `entries` into a miss field
pub fn encode(entries: &[MissEntry]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(encoded_len(entries));
    let mut uniques = Vec::new();

    for entry in entries {
        match *entry {
            MissEntry::Range { begin, end } => {
                buf.put_u8(TAG_RANGE);
                buf.put_u32(begin);
                buf.put_u32(end);
            }
            MissEntry::Unique(index) => uniques.push(index),
        }
    }

    if !uniques.is_empty() {
        buf.put_u8(TAG_UNIQUE);
        buf.put_u32(uniques.len() as u32);
        for index in uniques {
            buf.put_u32(index);
        }
    }

    buf
}

/// Decode a miss field, consuming it entirely
pub fn decode(mut field: &[u8]) -> Result<Vec<MissEntry>, PacketError> {
    let mut entries = Vec::new();

    while field.has_remaining() {
        let tag = field.get_u8();
        match tag {
            TAG_UNIQUE => {
                require(tag, COUNT_SIZE, field.remaining())?;
                let count = field.get_u32() as usize;
                let needed = count.saturating_mul(INDEX_SIZE);
                require(tag, needed, field.remaining())?;
                entries.extend((0..count).map(|_| MissEntry::Unique(field.get_u32())));
            }
            TAG_RANGE => {
                require(tag, RANGE_RECORD_SIZE, field.remaining())?;
                let begin = field.get_u32();
                let end = field.get_u32();
                entries.push(MissEntry::Range { begin, end });
            }
            other => return Err(PacketError::MissTag(other)),
        }
    }

    Ok(entries)
}

fn require(tag: u8, needed: usize, remaining: usize) -> Result<(), PacketError> {
    if remaining < needed {
        return Err(PacketError::MissTruncated {
            tag,
            needed,
            remaining,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut entries: Vec<MissEntry>) -> Vec<MissEntry> {
        entries.sort();
        entries
    }

    #[test]
    fn test_wire_order_is_stable() {
        let entries = vec![
            MissEntry::Unique(4),
            MissEntry::Range { begin: 9, end: 12 },
            MissEntry::Unique(2),
            MissEntry::Range { begin: 1, end: 3 },
        ];
        let ordered = wire_order(entries.clone());
        assert_eq!(
            ordered,
            vec![
                MissEntry::Range { begin: 9, end: 12 },
                MissEntry::Range { begin: 1, end: 3 },
                MissEntry::Unique(4),
                MissEntry::Unique(2),
            ]
        );
        assert_eq!(decode(&encode(&entries)).unwrap(), ordered);
    }

    #[test]
    fn test_empty() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_mixed_entries() {
        let entries = vec![
            MissEntry::Unique(3),
            MissEntry::Range { begin: 10, end: 20 },
            MissEntry::Unique(7),
            MissEntry::Range { begin: 30, end: 31 },
            MissEntry::Unique(42),
        ];

        let field = encode(&entries);
        assert_eq!(field.len(), encoded_len(&entries));
        assert_eq!(field.len(), 2 * 9 + 5 + 3 * 4);

        let decoded = decode(&field).unwrap();
        assert_eq!(sorted(decoded), sorted(entries));
    }

    #[test]
    fn test_ranges_precede_grouped_uniques() {
        let entries = [
            MissEntry::Unique(1),
            MissEntry::Range { begin: 5, end: 9 },
            MissEntry::Unique(2),
        ];
        let field = encode(&entries);

        assert_eq!(field[0], TAG_RANGE);
        assert_eq!(field[9], TAG_UNIQUE);
        assert_eq!(&field[10..14], &2u32.to_be_bytes());
        assert_eq!(
            decode(&field).unwrap(),
            vec![
                MissEntry::Range { begin: 5, end: 9 },
                MissEntry::Unique(1),
                MissEntry::Unique(2),
            ]
        );
    }

    #[test]
    fn test_truncated_range() {
        let field = [TAG_RANGE, 0, 0, 0, 1, 0, 0];
        assert_eq!(
            decode(&field).unwrap_err(),
            PacketError::MissTruncated {
                tag: TAG_RANGE,
                needed: 8,
                remaining: 6
            }
        );
    }

    #[test]
    fn test_truncated_unique_run() {
        // Declares three indices but carries one
        let field = [TAG_UNIQUE, 0, 0, 0, 3, 0, 0, 0, 9];
        assert!(matches!(
            decode(&field),
            Err(PacketError::MissTruncated { needed: 12, .. })
        ));

        // Count itself cut short
        assert!(matches!(
            decode(&[TAG_UNIQUE, 0, 0]),
            Err(PacketError::MissTruncated { needed: 4, .. })
        ));
    }

    #[test]
    fn test_unknown_tag() {
        let mut field = encode(&[MissEntry::Range { begin: 1, end: 2 }]).to_vec();
        field.push(2);
        assert_eq!(decode(&field).unwrap_err(), PacketError::MissTag(2));
    }
}
