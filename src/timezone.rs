use crate::error::TimezoneError;
use crate::events::Event;
use crate::MILLIS_PER_MINUTE;
use chrono::{DateTime, Offset, TimeZone};
use chrono_tz::Tz;
use std::collections::BTreeMap;

/// UTC instant (millis, minute spacing) to the local offset in force at that
/// instant. Built once per request and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimezoneOffsetTable {
    offsets: BTreeMap<i64, i32>,
}

impl TimezoneOffsetTable {
    /// Offsets of an IANA zone over `[start, end)`.
    pub fn from_zone_id(zone_id: &str, start: i64, end: i64) -> Result<Self, TimezoneError> {
        let tz: Tz = zone_id
            .parse()
            .map_err(|_| TimezoneError::UnknownZone(zone_id.to_string()))?;

        let offsets = minutes(start, end)
            .filter_map(|t| {
                let utc = DateTime::from_timestamp_millis(t)?.naive_utc();
                let seconds = tz.offset_from_utc_datetime(&utc).fix().local_minus_utc();
                Some((t, seconds * 1000))
            })
            .collect();
        Ok(Self { offsets })
    }

    pub fn from_fixed_offset(offset_millis: i32, start: i64, end: i64) -> Self {
        Self {
            offsets: minutes(start, end).map(|t| (t, offset_millis)).collect(),
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (i64, i32)>) -> Self {
        Self {
            offsets: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Offset of the entry nearest `timestamp`; on a tie the earlier entry
    /// wins. An empty table resolves everything to 0.
    pub fn get(&self, timestamp: i64) -> i32 {
        let floor = self.offsets.range(..=timestamp).next_back();
        let ceiling = self.offsets.range(timestamp..).next();

        match (floor, ceiling) {
            (Some((&lo, &lo_offset)), Some((&hi, &hi_offset))) => {
                if hi - timestamp < timestamp - lo {
                    hi_offset
                } else {
                    lo_offset
                }
            }
            (Some((_, &offset)), None) | (None, Some((_, &offset))) => offset,
            (None, None) => 0,
        }
    }

    /// Offset for an instant expressed in local wall-clock millis: the first
    /// entry whose local time reaches it, else the last entry.
    pub fn offset_for_local_time(&self, local_millis: i64) -> i32 {
        self.offsets
            .iter()
            .find(|(&t, &offset)| t + offset as i64 >= local_millis)
            .or_else(|| self.offsets.iter().next_back())
            .map(|(_, &offset)| offset)
            .unwrap_or(0)
    }

    /// Copies of `events` re-stamped with the offset at each start time.
    pub fn remap_events(&self, events: &[Event]) -> Vec<Event> {
        if self.is_empty() {
            return events.to_vec();
        }
        events
            .iter()
            .map(|e| e.with_offset(self.get(e.start_timestamp)))
            .collect()
    }
}

fn minutes(start: i64, end: i64) -> impl Iterator<Item = i64> {
    (start..end).step_by(MILLIS_PER_MINUTE as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use pretty_assertions::assert_eq;

    const HOUR: i64 = 60 * MILLIS_PER_MINUTE;
    const PST: i32 = -8 * 3_600_000;
    const PDT: i32 = -7 * 3_600_000;
    // 2015-03-08 02:00 PST, clocks spring forward
    const DST_START: i64 = 1_425_808_800_000;

    #[test]
    fn test_zone_table_follows_dst() {
        let table =
            TimezoneOffsetTable::from_zone_id("America/Los_Angeles", DST_START - HOUR, DST_START + HOUR)
                .unwrap();
        assert_eq!(table.len(), 120);
        assert_eq!(table.get(DST_START - MILLIS_PER_MINUTE), PST);
        assert_eq!(table.get(DST_START), PDT);
        assert_eq!(table.get(DST_START + 10 * MILLIS_PER_MINUTE), PDT);
    }

    #[test]
    fn test_unknown_zone_is_rejected() {
        assert_eq!(
            TimezoneOffsetTable::from_zone_id("Mars/Olympus_Mons", 0, HOUR),
            Err(TimezoneError::UnknownZone("Mars/Olympus_Mons".to_string()))
        );
    }

    #[test]
    fn test_nearest_entry_with_floor_on_tie() {
        let table = TimezoneOffsetTable::from_entries([(1_000, 1), (2_000, 2)]);
        assert_eq!(table.get(1_400), 1);
        assert_eq!(table.get(1_600), 2);
        assert_eq!(table.get(1_500), 1);
        assert_eq!(table.get(0), 1);
        assert_eq!(table.get(9_000), 2);
        assert_eq!(table.get(2_000), 2);
    }

    #[test]
    fn test_empty_table_resolves_to_zero() {
        let table = TimezoneOffsetTable::default();
        assert_eq!(table.get(123), 0);
        assert_eq!(table.offset_for_local_time(123), 0);
    }

    #[test]
    fn test_fixed_offset_table() {
        let table = TimezoneOffsetTable::from_fixed_offset(PDT, 0, 10 * MILLIS_PER_MINUTE);
        assert_eq!(table.len(), 10);
        assert_eq!(table.get(5 * MILLIS_PER_MINUTE + 7), PDT);
    }

    #[test]
    fn test_offset_for_local_time_across_dst() {
        let table = TimezoneOffsetTable::from_zone_id(
            "America/Los_Angeles",
            DST_START - 2 * HOUR,
            DST_START + 2 * HOUR,
        )
        .unwrap();
        // 00:30 local, standard time
        let before = DST_START - 90 * MILLIS_PER_MINUTE + PST as i64;
        assert_eq!(table.offset_for_local_time(before), PST);
        // 04:00 local, daylight time
        let after = DST_START + HOUR + PDT as i64;
        assert_eq!(table.offset_for_local_time(after), PDT);
    }

    #[test]
    fn test_remap_events_keeps_instants() {
        let table = TimezoneOffsetTable::from_entries([(0, PST), (HOUR, PDT)]);
        let events = vec![
            Event::new(0, MILLIS_PER_MINUTE, 0, EventPayload::OutOfBed),
            Event::new(HOUR, HOUR + MILLIS_PER_MINUTE, 0, EventPayload::Alarm),
        ];
        let remapped = table.remap_events(&events);
        assert_eq!(remapped[0].timezone_offset, PST);
        assert_eq!(remapped[1].timezone_offset, PDT);
        assert_eq!(remapped[1].start_timestamp, HOUR);
        assert_eq!(TimezoneOffsetTable::default().remap_events(&events), events);
    }
}
