//! Chronological ordering and changeset grouping.
//!
//! Grouping is a two-step sort-then-scan rather than a group-by: records are
//! stably sorted by modification time, then a single pass opens a new
//! changeset whenever the timestamp moves past the current boundary.  Records
//! sharing a timestamp keep their enumeration order inside the changeset.

use tracing::debug;

use super::model::{Changeset, VersionRecord};

/// Stable ascending sort by `last_modified`.
pub fn sort_chronologically(records: &mut [VersionRecord]) {
    records.sort_by_key(|r| r.last_modified);
}

/// Partition an already-sorted sequence into changesets.
///
/// The boundary starts at the first record's timestamp.  A record strictly
/// after the boundary flushes the pending buffer and becomes the new
/// boundary; anything else joins the buffer.  The trailing buffer is flushed
/// at end of input.
pub fn group_changesets(sorted: Vec<VersionRecord>) -> Vec<Changeset> {
    let mut changesets = Vec::new();
    let mut iter = sorted.into_iter();

    let Some(first) = iter.next() else {
        return changesets;
    };

    let mut boundary = first.last_modified;
    let mut pending = vec![first];

    for record in iter {
        if record.last_modified > boundary {
            changesets.push(Changeset {
                timestamp: boundary,
                members: std::mem::take(&mut pending),
            });
            boundary = record.last_modified;
        }
        pending.push(record);
    }

    changesets.push(Changeset {
        timestamp: boundary,
        members: pending,
    });

    debug!(changesets = changesets.len(), "grouped versions into changesets");
    changesets
}

/// Sort `records` and group them in one call.
pub fn plan_changesets(mut records: Vec<VersionRecord>) -> Vec<Changeset> {
    sort_chronologically(&mut records);
    group_changesets(records)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{DateTime, Utc};

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
    }

    fn record(key: &str, version: &str, secs: i64) -> VersionRecord {
        VersionRecord {
            key: key.to_string(),
            bucket: "bucket".to_string(),
            version_id: version.to_string(),
            last_modified: at(secs),
            repository_root: PathBuf::from("/tmp/out"),
        }
    }

    fn ids(changeset: &Changeset) -> Vec<&str> {
        changeset
            .members
            .iter()
            .map(|m| m.version_id.as_str())
            .collect()
    }

    #[test]
    fn empty_input_has_no_changesets() {
        assert!(plan_changesets(Vec::new()).is_empty());
    }

    #[test]
    fn single_record_is_flushed() {
        let changesets = plan_changesets(vec![record("a.txt", "a1", 10)]);
        assert_eq!(changesets.len(), 1);
        assert_eq!(changesets[0].timestamp, at(10));
        assert_eq!(ids(&changesets[0]), vec!["a1"]);
    }

    #[test]
    fn shared_timestamp_forms_one_changeset() {
        // a.txt@T1, b.txt@T1, a.txt@T2 arrive in listing order, not time order.
        let changesets = plan_changesets(vec![
            record("a.txt", "a2", 20),
            record("a.txt", "a1", 10),
            record("b.txt", "b1", 10),
        ]);
        assert_eq!(changesets.len(), 2);
        assert_eq!(changesets[0].timestamp, at(10));
        assert_eq!(ids(&changesets[0]), vec!["a1", "b1"]);
        assert_eq!(changesets[1].timestamp, at(20));
        assert_eq!(ids(&changesets[1]), vec!["a2"]);
    }

    #[test]
    fn distinct_timestamps_each_get_a_changeset() {
        let changesets = plan_changesets(vec![
            record("c", "c1", 30),
            record("a", "a1", 10),
            record("b", "b1", 20),
        ]);
        let stamps: Vec<_> = changesets.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![at(10), at(20), at(30)]);
        assert!(changesets.iter().all(|c| c.members.len() == 1));
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let changesets = plan_changesets(vec![
            record("z", "z1", 5),
            record("m", "m1", 5),
            record("a", "a1", 5),
        ]);
        assert_eq!(changesets.len(), 1);
        assert_eq!(ids(&changesets[0]), vec!["z1", "m1", "a1"]);
    }

    #[test]
    fn every_member_matches_its_changeset_timestamp() {
        let changesets = plan_changesets(vec![
            record("a", "1", 3),
            record("b", "2", 1),
            record("c", "3", 3),
            record("d", "4", 2),
            record("e", "5", 1),
        ]);
        for changeset in &changesets {
            assert!(changeset
                .members
                .iter()
                .all(|m| m.last_modified == changeset.timestamp));
            assert_eq!(changeset.commit_time(), Some(changeset.timestamp));
        }
        let stamps: Vec<_> = changesets.iter().map(|c| c.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        let total: usize = changesets.iter().map(|c| c.members.len()).sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn group_trusts_presorted_input() {
        // Without a sort, an earlier timestamp never opens a new changeset.
        let changesets = group_changesets(vec![
            record("a", "1", 10),
            record("b", "2", 5),
            record("c", "3", 11),
        ]);
        assert_eq!(changesets.len(), 2);
        assert_eq!(ids(&changesets[0]), vec!["1", "2"]);
        assert_eq!(changesets[0].timestamp, at(10));
    }
}
