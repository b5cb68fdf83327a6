use crate::events::{
    Event, EventPayload, FALL_ASLEEP_DISTURBANCE_MESSAGE, FALL_ASLEEP_MESSAGE, IN_BED_MESSAGE,
    WAKESLEEP_DISTURBANCE_MESSAGE, WAKE_UP_DISTURBANCE_MESSAGE, WAKE_UP_MESSAGE,
};
use crate::preprocessing::time_from_bin;
use crate::segments::SegmentWithGaps;
use crate::MILLIS_PER_MINUTE;
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SleepStats {
    pub minutes_in_bed: i64,
    pub minutes_asleep: i64,
    pub times_woken_during_sleep: usize,
    pub num_matched_segments: usize,
}

/// A sleep segment validated against the bed segment containing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPeriod {
    pub in_bed: Event,
    pub fall_asleep: Event,
    pub wake_up: Event,
    pub out_of_bed: Event,
    pub disturbances: Vec<Event>,
}

impl MatchedPeriod {
    /// Events in time order.
    pub fn events(&self) -> Vec<&Event> {
        let mut events = Vec::with_capacity(4 + self.disturbances.len());
        events.push(&self.in_bed);
        events.push(&self.fall_asleep);
        events.extend(self.disturbances.iter());
        events.push(&self.wake_up);
        events.push(&self.out_of_bed);
        events
    }

    fn map_events(&self, f: impl Fn(&Event) -> Event) -> MatchedPeriod {
        MatchedPeriod {
            in_bed: f(&self.in_bed),
            fall_asleep: f(&self.fall_asleep),
            wake_up: f(&self.wake_up),
            out_of_bed: f(&self.out_of_bed),
            disturbances: self.disturbances.iter().map(f).collect(),
        }
    }

    pub(crate) fn with_event_offsets(&self, offset_for: impl Fn(i64) -> i32) -> MatchedPeriod {
        self.map_events(|e| e.with_offset(offset_for(e.start_timestamp)))
    }
}

/// Places events on the bin grid. Every event lasts one minute.
struct EventClock {
    t0: i64,
    timezone_offset: i32,
    minutes_per_bin: i32,
}

impl EventClock {
    fn at(&self, bin: usize, payload: EventPayload) -> Event {
        let start = time_from_bin(bin, self.minutes_per_bin, self.t0);
        Event::new(start, start + MILLIS_PER_MINUTE, self.timezone_offset, payload)
    }

    fn sleep(&self, bin: usize, message: &str) -> Event {
        self.at(
            bin,
            EventPayload::Sleep {
                description: message.to_string(),
            },
        )
    }

    fn wake(&self, bin: usize, message: &str) -> Event {
        self.at(
            bin,
            EventPayload::WakeUp {
                description: Some(message.to_string()),
            },
        )
    }
}

/// Pair each sleep segment with the bed segment containing it and
/// synthesize the timeline events.
///
/// Forward-only two pointer merge: on a match both cursors advance,
/// otherwise the cursor whose segment starts earlier advances. Returns None
/// when either list is empty or nothing matched.
pub fn match_sleep_to_bed(
    sleeps: &[SegmentWithGaps],
    beds: &[SegmentWithGaps],
    t0: i64,
    timezone_offset: i32,
    minutes_per_bin: i32,
) -> Option<(SleepStats, Vec<MatchedPeriod>)> {
    if sleeps.is_empty() || beds.is_empty() {
        return None;
    }

    let clock = EventClock {
        t0,
        timezone_offset,
        minutes_per_bin,
    };
    let bin_minutes = minutes_per_bin as i64;

    let mut stats = SleepStats::default();
    let mut matched = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < sleeps.len() && j < beds.len() {
        let sleep = &sleeps[i];
        let bed = &beds[j];

        if !sleep.is_inside_of(bed) {
            if sleep.bounds.start < bed.bounds.start {
                i += 1;
            } else {
                j += 1;
            }
            continue;
        }

        let mut minutes_asleep = sleep.bounds.bin_count() as i64 * bin_minutes;
        let mut disturbances = Vec::new();

        for gap in &sleep.gaps {
            if gap.start == gap.end {
                disturbances.push(clock.sleep(gap.start, WAKESLEEP_DISTURBANCE_MESSAGE));
            } else {
                disturbances.push(clock.wake(gap.start, WAKE_UP_DISTURBANCE_MESSAGE));
                disturbances.push(clock.sleep(gap.end, FALL_ASLEEP_DISTURBANCE_MESSAGE));
            }
            minutes_asleep -= gap.bin_count() as i64 * bin_minutes;
            stats.times_woken_during_sleep += 1;
        }

        stats.minutes_asleep += minutes_asleep;
        stats.minutes_in_bed += bed.bounds.bin_count() as i64 * bin_minutes;
        stats.num_matched_segments += 1;

        matched.push(MatchedPeriod {
            in_bed: clock.at(
                bed.bounds.start,
                EventPayload::InBed {
                    description: IN_BED_MESSAGE.to_string(),
                },
            ),
            fall_asleep: clock.sleep(sleep.bounds.start, FALL_ASLEEP_MESSAGE),
            wake_up: clock.wake(sleep.bounds.end, WAKE_UP_MESSAGE),
            out_of_bed: clock.at(bed.bounds.end, EventPayload::OutOfBed),
            disturbances,
        });

        i += 1;
        j += 1;
    }

    debug!(
        "matched {} of {} sleep / {} bed segments",
        matched.len(),
        sleeps.len(),
        beds.len()
    );

    if matched.is_empty() {
        return None;
    }
    Some((stats, matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::segments::Interval;
    use pretty_assertions::assert_eq;

    const T0: i64 = 1_420_000_200_000;
    const BIN_MILLIS: i64 = 15 * MILLIS_PER_MINUTE;

    fn t(bin: i64) -> i64 {
        T0 + bin * BIN_MILLIS
    }

    fn seg(start: usize, end: usize, gaps: &[(usize, usize)]) -> SegmentWithGaps {
        SegmentWithGaps {
            bounds: Interval::new(start, end),
            gaps: gaps.iter().map(|&(s, e)| Interval::new(s, e)).collect(),
        }
    }

    #[test]
    fn test_contained_sleep_produces_period() {
        let sleeps = vec![seg(5, 30, &[(12, 14)])];
        let beds = vec![seg(2, 35, &[])];
        let (stats, periods) = match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).unwrap();

        assert_eq!(
            stats,
            SleepStats {
                minutes_in_bed: 510,
                minutes_asleep: 345,
                times_woken_during_sleep: 1,
                num_matched_segments: 1,
            }
        );
        assert_eq!(periods.len(), 1);
        let p = &periods[0];
        assert_eq!(p.in_bed.kind(), EventKind::InBed);
        assert_eq!(p.in_bed.start_timestamp, t(2));
        assert_eq!(p.fall_asleep.start_timestamp, t(5));
        assert_eq!(p.wake_up.start_timestamp, t(30));
        assert_eq!(p.out_of_bed.start_timestamp, t(35));
        assert_eq!(p.out_of_bed.end_timestamp, t(35) + MILLIS_PER_MINUTE);

        let kinds: Vec<_> = p.disturbances.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::WakeUp, EventKind::Sleep]);
        assert_eq!(p.disturbances[0].start_timestamp, t(12));
        assert_eq!(p.disturbances[0].description(), WAKE_UP_DISTURBANCE_MESSAGE);
        assert_eq!(p.disturbances[1].start_timestamp, t(14));
        assert_eq!(p.disturbances[1].description(), FALL_ASLEEP_DISTURBANCE_MESSAGE);
    }

    #[test]
    fn test_single_bin_gap_is_momentary_disturbance() {
        let sleeps = vec![seg(5, 20, &[(10, 10)])];
        let beds = vec![seg(0, 25, &[])];
        let (stats, periods) = match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).unwrap();
        assert_eq!(periods[0].disturbances.len(), 1);
        assert_eq!(periods[0].disturbances[0].kind(), EventKind::Sleep);
        assert_eq!(
            periods[0].disturbances[0].description(),
            WAKESLEEP_DISTURBANCE_MESSAGE
        );
        assert_eq!(stats.minutes_asleep, 16 * 15 - 15);
        assert_eq!(stats.times_woken_during_sleep, 1);
    }

    #[test]
    fn test_disjoint_segments_give_no_result() {
        let sleeps = vec![seg(5, 10, &[])];
        let beds = vec![seg(20, 30, &[])];
        assert!(match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).is_none());
    }

    #[test]
    fn test_empty_inputs_give_no_result() {
        let sleeps = vec![seg(5, 10, &[])];
        assert!(match_sleep_to_bed(&sleeps, &[], T0, 0, 15).is_none());
        assert!(match_sleep_to_bed(&[], &sleeps, T0, 0, 15).is_none());
    }

    #[test]
    fn test_partial_overlap_is_skipped() {
        // first sleep spills past its bed, second fits the next bed
        let sleeps = vec![seg(2, 12, &[]), seg(22, 28, &[])];
        let beds = vec![seg(4, 14, &[]), seg(20, 30, &[])];
        let (stats, periods) = match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).unwrap();
        assert_eq!(stats.num_matched_segments, 1);
        assert_eq!(periods[0].in_bed.start_timestamp, t(20));
        assert_eq!(periods[0].fall_asleep.start_timestamp, t(22));
    }

    #[test]
    fn test_multiple_nights_accumulate() {
        let sleeps = vec![seg(2, 5, &[]), seg(12, 20, &[(14, 16), (17, 18)])];
        let beds = vec![seg(1, 6, &[]), seg(10, 22, &[])];
        let (stats, periods) = match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(stats.num_matched_segments, 2);
        assert_eq!(stats.times_woken_during_sleep, 2);
        assert_eq!(stats.minutes_in_bed, (6 + 13) * 15);
        assert_eq!(stats.minutes_asleep, 4 * 15 + (9 - 3 - 2) * 15);
        assert!(stats.minutes_asleep <= stats.minutes_in_bed);
        assert!(periods.len() <= sleeps.len().min(beds.len()));
    }

    #[test]
    fn test_events_carry_offset_without_shifting_time() {
        let sleeps = vec![seg(5, 10, &[])];
        let beds = vec![seg(4, 12, &[])];
        let (_, periods) = match_sleep_to_bed(&sleeps, &beds, T0, -25_200_000, 15).unwrap();
        let p = &periods[0];
        assert_eq!(p.fall_asleep.start_timestamp, t(5));
        assert!(p.events().iter().all(|e| e.timezone_offset == -25_200_000));
    }

    #[test]
    fn test_events_are_chronological() {
        let sleeps = vec![seg(5, 30, &[(12, 14)])];
        let beds = vec![seg(2, 35, &[])];
        let (_, periods) = match_sleep_to_bed(&sleeps, &beds, T0, 0, 15).unwrap();
        let times: Vec<_> = periods[0].events().iter().map(|e| e.start_timestamp).collect();
        assert_eq!(times, vec![t(2), t(5), t(12), t(14), t(30), t(35)]);
    }
}
