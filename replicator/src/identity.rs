use std::fmt;
use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// Globally ordered, partition-stable key for one replicated row.
///
/// Formatted as `"{binlog_file}:{position:020}:{row_seq:03}"` so that
/// lexicographic string order equals emission order: positions are
/// monotonic within a file and binlog file names sort with rotation,
/// while the row counter orders rows inside one event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowIdentity(String);

impl RowIdentity {
    pub fn new(binlog_file: &str, position: u64, row_seq: u32) -> RowIdentity {
        RowIdentity(format!("{binlog_file}:{position:020}:{row_seq:03}"))
    }

    /// Wrap an identity recovered verbatim from a stored message.
    pub fn from_string(raw: String) -> RowIdentity {
        RowIdentity(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RowIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Map a table name onto a partition of the destination topic.
///
/// SipHash-1-3 with a fixed key keeps the assignment identical across
/// restarts and toolchain upgrades; per-partition dedup state is only
/// meaningful while rows of a table keep landing on the same partition.
pub fn partition_for(table_name: &str, partition_count: i32) -> i32 {
    debug_assert!(partition_count > 0);
    let mut hasher = SipHasher13::new();
    hasher.write(table_name.as_bytes());
    (hasher.finish() % partition_count as u64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_format_pads_position_and_row_seq() {
        let identity = RowIdentity::new("bin.000007", 154, 0);
        assert_eq!(identity.as_str(), "bin.000007:00000000000000000154:000");
        let next = RowIdentity::new("bin.000007", 154, 1);
        assert_eq!(next.as_str(), "bin.000007:00000000000000000154:001");
    }

    #[test]
    fn identities_order_by_position_then_row_seq() {
        let earlier = RowIdentity::new("bin.000007", 120, 7);
        let first = RowIdentity::new("bin.000007", 154, 0);
        let second = RowIdentity::new("bin.000007", 154, 1);
        let later_file = RowIdentity::new("bin.000008", 4, 0);

        assert!(earlier < first);
        assert!(first < second);
        assert!(second < later_file);
    }

    #[test]
    fn padding_keeps_numeric_and_lexicographic_order_aligned() {
        // Unpadded, "bin.000007:99:..." would sort after "bin.000007:100:...".
        let small = RowIdentity::new("bin.000007", 99, 0);
        let large = RowIdentity::new("bin.000007", 100, 0);
        assert!(small < large);
    }

    #[test]
    fn partition_is_deterministic_and_in_bounds() {
        for count in [1, 2, 6, 12, 64] {
            for table in ["orders", "orders_v2", "users", "a", ""] {
                let partition = partition_for(table, count);
                assert!((0..count).contains(&partition), "{table} -> {partition} with {count} partitions");
                assert_eq!(partition, partition_for(table, count));
            }
        }
    }

    #[test]
    fn partition_spreads_tables() {
        // Not a distribution test, just a guard against a constant function.
        let assignments: std::collections::HashSet<i32> = (0..100)
            .map(|i| partition_for(&format!("table_{i}"), 16))
            .collect();
        assert!(assignments.len() > 4);
    }
}
