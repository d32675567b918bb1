//! Burst clustering for the photos of a single day.
//!
//! Records are ordered by capture time (filename breaks ties) and split
//! wherever two consecutive shots are more than [`BURST_GAP`] apart.

use chrono::{NaiveDateTime, TimeDelta};
use rand::Rng;

use crate::api::AssetItem;

/// Largest gap between consecutive shots that still counts as the same cluster.
pub const BURST_GAP: TimeDelta = TimeDelta::seconds(2);

/// A cluster needs at least this many shots before it is played as a burst.
pub const BURST_MIN_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub taken_at: NaiveDateTime,
    pub id: String,
    pub filename: String,
    pub path: String,
    /// `originalMimeType` as reported by the server.
    pub mime_type: String,
}

impl PhotoRecord {
    /// Returns `None` when the asset's `localDateTime` cannot be read.
    pub fn from_asset(item: &AssetItem) -> Option<Self> {
        Some(Self {
            taken_at: parse_local_timestamp(&item.local_date_time)?,
            id: item.id.clone(),
            filename: item.original_file_name.clone(),
            path: item.original_path.clone(),
            mime_type: item.original_mime_type.clone().unwrap_or_default(),
        })
    }
}

/// Reads an Immich `localDateTime` as wall-clock time, ignoring any zone suffix.
///
/// Precision is kept to the millisecond.
pub fn parse_local_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    let rest = raw.get(19..)?;
    let mut end = 19;
    if let Some(fraction) = rest.strip_prefix('.') {
        let digits = fraction.bytes().take_while(u8::is_ascii_digit).count();
        end += 1 + digits.min(3);
    }
    NaiveDateTime::parse_from_str(&raw[..end], "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// One burst cluster. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoGroup {
    records: Vec<PhotoRecord>,
}

impl PhotoGroup {
    pub fn new(first: PhotoRecord) -> Self {
        Self {
            records: vec![first],
        }
    }

    pub fn first(&self) -> &PhotoRecord {
        &self.records[0]
    }

    pub fn last(&self) -> &PhotoRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PhotoRecord> {
        self.records.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Large enough to be played back as a burst.
    pub fn is_burst(&self) -> bool {
        self.records.len() >= BURST_MIN_LEN
    }

    fn push(&mut self, record: PhotoRecord, keep_bursts: bool) {
        self.records.push(record);
        if !keep_bursts && self.records.len() > 2 {
            // keep the opening and closing shot only
            self.records.remove(1);
        }
    }
}

impl<'a> IntoIterator for &'a PhotoGroup {
    type Item = &'a PhotoRecord;
    type IntoIter = std::slice::Iter<'a, PhotoRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

pub fn sort_records(records: &mut [PhotoRecord]) {
    records.sort_by(|a, b| {
        a.taken_at
            .cmp(&b.taken_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });
}

/// Sorts `records` and splits them into clusters.
///
/// The gap is always measured against the previous sorted record, even when
/// that record was trimmed out of its group because `keep_bursts` is off.
pub fn group_bursts(mut records: Vec<PhotoRecord>, keep_bursts: bool) -> Vec<PhotoGroup> {
    sort_records(&mut records);

    let mut groups: Vec<PhotoGroup> = Vec::new();
    let mut prev_taken_at: Option<NaiveDateTime> = None;
    for record in records {
        let taken_at = record.taken_at;
        match (prev_taken_at, groups.last_mut()) {
            (Some(prev), Some(group)) if taken_at - prev <= BURST_GAP => {
                group.push(record, keep_bursts);
            }
            _ => groups.push(PhotoGroup::new(record)),
        }
        prev_taken_at = Some(taken_at);
    }
    groups
}

/// Keeps at most `limit` consecutive groups, starting at a random offset.
///
/// A `limit` of zero keeps everything.
pub fn limit_groups<R: Rng>(
    groups: Vec<PhotoGroup>,
    limit: usize,
    rng: &mut R,
) -> Vec<PhotoGroup> {
    if limit == 0 || groups.len() <= limit {
        return groups;
    }
    let offset = rng.random_range(0..=groups.len() - limit);
    groups.into_iter().skip(offset).take(limit).collect()
}

/// Puts a singleton of each burst's first shot in front of the burst.
pub fn insert_burst_lead_ins(groups: Vec<PhotoGroup>) -> Vec<PhotoGroup> {
    let mut out = Vec::with_capacity(groups.len());
    for group in groups {
        if group.is_burst() {
            out.push(PhotoGroup::new(group.first().clone()));
        }
        out.push(group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::{SeedableRng, rngs::StdRng};

    fn at(h: u32, m: u32, s: u32, ms: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2021, 5, 7)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    fn rec(id: &str, taken_at: NaiveDateTime) -> PhotoRecord {
        PhotoRecord {
            taken_at,
            id: id.to_string(),
            filename: format!("{id}.jpg"),
            path: format!("/library/{id}.jpg"),
            mime_type: "image/jpeg".into(),
        }
    }

    fn ids(groups: &[PhotoGroup]) -> Vec<Vec<&str>> {
        groups.iter().map(PhotoGroup::ids).collect()
    }

    #[test]
    fn splits_on_gaps_over_two_seconds() {
        let records = vec![
            rec("c", at(10, 0, 5, 0)),
            rec("a", at(10, 0, 0, 0)),
            rec("b", at(10, 0, 1, 0)),
        ];
        let groups = group_bursts(records, true);
        assert_eq!(ids(&groups), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn groups_report_their_size() {
        let groups = group_bursts(
            vec![rec("a", at(8, 0, 0, 0)), rec("b", at(8, 0, 1, 0)), rec("c", at(8, 0, 2, 0))],
            false,
        );
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert!(!groups[0].is_empty());
        assert_eq!(groups[0].last().id, "c");
    }

    #[test]
    fn exactly_two_seconds_stays_together() {
        let records = vec![rec("a", at(9, 0, 0, 0)), rec("b", at(9, 0, 2, 0))];
        assert_eq!(ids(&group_bursts(records, true)), vec![vec!["a", "b"]]);

        let records = vec![rec("a", at(9, 0, 0, 0)), rec("b", at(9, 0, 2, 1))];
        assert_eq!(ids(&group_bursts(records, true)), vec![vec!["a"], vec!["b"]]);
    }

    #[test]
    fn ties_are_ordered_by_filename() {
        let t = at(12, 30, 0, 0);
        let mut second = rec("x", t);
        second.filename = "IMG_0002.jpg".into();
        let mut first = rec("y", t);
        first.filename = "IMG_0001.jpg".into();
        let groups = group_bursts(vec![second, first], true);
        assert_eq!(ids(&groups), vec![vec!["y", "x"]]);
    }

    #[test]
    fn trimmed_bursts_keep_first_and_last() {
        let records: Vec<_> = (0..6)
            .map(|i| rec(&format!("p{i}"), at(8, 0, i, 0)))
            .collect();
        let groups = group_bursts(records, false);
        assert_eq!(ids(&groups), vec![vec!["p0", "p5"]]);
        assert!(!groups[0].is_burst());
    }

    #[test]
    fn kept_bursts_hold_every_shot() {
        let records: Vec<_> = (0..4)
            .map(|i| rec(&format!("p{i}"), at(8, 0, 0, i * 300)))
            .collect();
        let groups = group_bursts(records, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 4);
        assert!(groups[0].is_burst());
    }

    #[test]
    fn gap_chains_through_trimmed_records() {
        // 0s, 1.5s, 3s, 4.5s: each step is under the gap, the span is not
        let records = vec![
            rec("a", at(7, 0, 0, 0)),
            rec("b", at(7, 0, 1, 500)),
            rec("c", at(7, 0, 3, 0)),
            rec("d", at(7, 0, 4, 500)),
        ];
        let groups = group_bursts(records, false);
        assert_eq!(ids(&groups), vec![vec!["a", "d"]]);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_bursts(Vec::new(), true).is_empty());
    }

    #[test]
    fn random_days_partition_cleanly() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let n = rng.random_range(1..60);
            let mut t = at(6, 0, 0, 0);
            let mut records = Vec::new();
            for i in 0..n {
                t += TimeDelta::milliseconds(rng.random_range(0..5_000));
                records.push(rec(&format!("r{i:03}"), t));
            }
            let groups = group_bursts(records.clone(), true);

            let flat: Vec<&PhotoRecord> = groups.iter().flat_map(|g| g.iter()).collect();
            assert_eq!(flat.len(), records.len());
            for pair in flat.windows(2) {
                assert!(pair[0].taken_at <= pair[1].taken_at);
            }
            for group in &groups {
                for pair in group.records().windows(2) {
                    assert!(pair[1].taken_at - pair[0].taken_at <= BURST_GAP);
                }
            }
            for pair in groups.windows(2) {
                assert!(pair[1].first().taken_at - pair[0].last().taken_at > BURST_GAP);
            }
        }
    }

    fn singletons(n: u32) -> Vec<PhotoGroup> {
        (0..n)
            .map(|i| PhotoGroup::new(rec(&format!("g{i}"), at(10, i, 0, 0))))
            .collect()
    }

    #[test]
    fn limit_keeps_everything_when_under_cap() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(limit_groups(singletons(4), 4, &mut rng).len(), 4);
        assert_eq!(limit_groups(singletons(4), 10, &mut rng).len(), 4);
        assert_eq!(limit_groups(singletons(4), 0, &mut rng).len(), 4);
    }

    #[test]
    fn limit_returns_contiguous_window() {
        let all = singletons(20);
        let mut rng = StdRng::seed_from_u64(99);
        let mut offsets = std::collections::HashSet::new();
        for _ in 0..500 {
            let picked = limit_groups(all.clone(), 5, &mut rng);
            assert_eq!(picked.len(), 5);
            let start = all.iter().position(|g| g == &picked[0]).unwrap();
            assert!(start + 5 <= all.len());
            assert_eq!(&all[start..start + 5], picked.as_slice());
            offsets.insert(start);
        }
        assert!(offsets.contains(&0));
        assert!(offsets.contains(&15));
    }

    #[test]
    fn lead_in_precedes_each_burst() {
        let burst: Vec<_> = (0..4)
            .map(|i| rec(&format!("b{i}"), at(11, 0, 0, i * 100)))
            .collect();
        let mut records = burst;
        records.push(rec("solo", at(11, 5, 0, 0)));
        let groups = insert_burst_lead_ins(group_bursts(records, true));
        assert_eq!(
            ids(&groups),
            vec![vec!["b0"], vec!["b0", "b1", "b2", "b3"], vec!["solo"]]
        );
    }

    #[test]
    fn parses_immich_local_timestamps() {
        assert_eq!(
            parse_local_timestamp("2021-05-07T10:00:01.250Z"),
            Some(at(10, 0, 1, 250))
        );
        assert_eq!(
            parse_local_timestamp("2021-05-07T10:00:01.000+02:00"),
            Some(at(10, 0, 1, 0))
        );
        assert_eq!(
            parse_local_timestamp("2021-05-07T10:00:01"),
            Some(at(10, 0, 1, 0))
        );
        assert_eq!(
            parse_local_timestamp("2021-05-07T10:00:01.123456Z"),
            Some(at(10, 0, 1, 123))
        );
        assert_eq!(parse_local_timestamp("2021-05-07"), None);
        assert_eq!(parse_local_timestamp("not a date at all!!"), None);
    }
}
