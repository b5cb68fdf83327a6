//! Timeline events.
//!
//! An [`Event`] is a set of common fields (start, end, timezone offset) plus
//! an [`EventPayload`] carrying whatever a given kind needs. Two events are
//! equal when their kind and common fields match; payload text is ignored.

use crate::error::EventError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FALL_ASLEEP_MESSAGE: &str = "You fell asleep.";
pub const WAKE_UP_MESSAGE: &str = "You woke up.";
pub const IN_BED_MESSAGE: &str = "You went to bed.";
pub const OUT_OF_BED_MESSAGE: &str = "You got out of bed.";
pub const FALL_ASLEEP_DISTURBANCE_MESSAGE: &str = "You fell back asleep.";
pub const WAKE_UP_DISTURBANCE_MESSAGE: &str = "You were disturbed and woke up.";
pub const WAKESLEEP_DISTURBANCE_MESSAGE: &str = "You were briefly disturbed.";
pub const MOTION_MESSAGE: &str = "You moved.";
pub const PARTNER_MOTION_MESSAGE: &str = "Your partner moved.";
pub const LIGHTS_OUT_MESSAGE: &str = "Lights out.";
pub const SUNRISE_MESSAGE: &str = "The sun rose.";
pub const SUNSET_MESSAGE: &str = "The sun set.";
pub const ALARM_MESSAGE: &str = "Your alarm rang.";

/// Event kinds, carrying their display priority value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    None,
    Motion,
    SleepMotion,
    PartnerMotion,
    Light,
    LightsOut,
    Sunset,
    Sunrise,
    InBed,
    Sleep,
    OutOfBed,
    WakeUp,
    Alarm,
}

impl EventKind {
    pub const ALL: [EventKind; 13] = [
        EventKind::None,
        EventKind::Motion,
        EventKind::SleepMotion,
        EventKind::PartnerMotion,
        EventKind::Light,
        EventKind::LightsOut,
        EventKind::Sunset,
        EventKind::Sunrise,
        EventKind::InBed,
        EventKind::Sleep,
        EventKind::OutOfBed,
        EventKind::WakeUp,
        EventKind::Alarm,
    ];

    pub fn value(&self) -> i32 {
        match self {
            EventKind::None => -1,
            EventKind::Motion => 0,
            EventKind::SleepMotion => 1,
            EventKind::PartnerMotion => 2,
            EventKind::Light => 6,
            EventKind::LightsOut => 7,
            EventKind::Sunset => 8,
            EventKind::Sunrise => 9,
            EventKind::InBed => 10,
            EventKind::Sleep => 11,
            EventKind::OutOfBed => 12,
            EventKind::WakeUp => 13,
            EventKind::Alarm => 14,
        }
    }

    /// Unknown values map to `None`.
    pub fn from_value(value: i32) -> EventKind {
        Self::ALL
            .into_iter()
            .find(|k| k.value() == value)
            .unwrap_or(EventKind::None)
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::None => "NONE",
            EventKind::Motion => "MOTION",
            EventKind::SleepMotion => "SLEEP_MOTION",
            EventKind::PartnerMotion => "PARTNER_MOTION",
            EventKind::Light => "LIGHT",
            EventKind::LightsOut => "LIGHTS_OUT",
            EventKind::Sunset => "SUNSET",
            EventKind::Sunrise => "SUNRISE",
            EventKind::InBed => "IN_BED",
            EventKind::Sleep => "SLEEP",
            EventKind::OutOfBed => "OUT_OF_BED",
            EventKind::WakeUp => "WAKE_UP",
            EventKind::Alarm => "ALARM",
        }
    }

    /// Case-insensitive; unknown names map to `None`.
    pub fn from_name(name: &str) -> EventKind {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name))
            .unwrap_or(EventKind::None)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::None => Ok(()),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundInfo {
    pub url: String,
    pub duration_millis: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    None { sleep_depth: i32 },
    Motion { sleep_depth: i32 },
    SleepMotion { sleep_depth: i32 },
    PartnerMotion { sleep_depth: i32 },
    Light { description: String },
    LightsOut,
    Sunset { sleep_depth: i32 },
    Sunrise {
        sleep_depth: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sound_info: Option<SoundInfo>,
    },
    InBed { description: String },
    Sleep { description: String },
    OutOfBed,
    WakeUp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    Alarm,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::None { .. } => EventKind::None,
            EventPayload::Motion { .. } => EventKind::Motion,
            EventPayload::SleepMotion { .. } => EventKind::SleepMotion,
            EventPayload::PartnerMotion { .. } => EventKind::PartnerMotion,
            EventPayload::Light { .. } => EventKind::Light,
            EventPayload::LightsOut => EventKind::LightsOut,
            EventPayload::Sunset { .. } => EventKind::Sunset,
            EventPayload::Sunrise { .. } => EventKind::Sunrise,
            EventPayload::InBed { .. } => EventKind::InBed,
            EventPayload::Sleep { .. } => EventKind::Sleep,
            EventPayload::OutOfBed => EventKind::OutOfBed,
            EventPayload::WakeUp { .. } => EventKind::WakeUp,
            EventPayload::Alarm => EventKind::Alarm,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub start_timestamp: i64,
    pub end_timestamp: i64,
    pub timezone_offset: i32,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.start_timestamp == other.start_timestamp
            && self.end_timestamp == other.end_timestamp
            && self.timezone_offset == other.timezone_offset
    }
}

impl Eq for Event {}

fn required<T>(value: Option<T>, kind: EventKind, field: &'static str) -> Result<T, EventError> {
    value.ok_or(EventError::MissingField {
        kind: kind.name(),
        field,
    })
}

impl Event {
    pub fn new(start_timestamp: i64, end_timestamp: i64, timezone_offset: i32, payload: EventPayload) -> Self {
        Self {
            start_timestamp,
            end_timestamp,
            timezone_offset,
            payload,
        }
    }

    /// Build an event of `kind`, failing when that kind's required payload
    /// field is missing. Fields a kind does not use are ignored.
    pub fn from_kind(
        kind: EventKind,
        start_timestamp: i64,
        end_timestamp: i64,
        timezone_offset: i32,
        description: Option<String>,
        sound_info: Option<SoundInfo>,
        sleep_depth: Option<i32>,
    ) -> Result<Event, EventError> {
        let payload = match kind {
            EventKind::None => EventPayload::None {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
            },
            EventKind::Motion => EventPayload::Motion {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
            },
            EventKind::SleepMotion => EventPayload::SleepMotion {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
            },
            EventKind::PartnerMotion => EventPayload::PartnerMotion {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
            },
            EventKind::Light => EventPayload::Light {
                description: required(description, kind, "description")?,
            },
            EventKind::LightsOut => EventPayload::LightsOut,
            EventKind::Sunset => EventPayload::Sunset {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
            },
            EventKind::Sunrise => EventPayload::Sunrise {
                sleep_depth: required(sleep_depth, kind, "sleep depth")?,
                sound_info,
            },
            EventKind::InBed => EventPayload::InBed {
                description: required(description, kind, "description")?,
            },
            EventKind::Sleep => EventPayload::Sleep {
                description: required(description, kind, "description")?,
            },
            EventKind::OutOfBed => EventPayload::OutOfBed,
            EventKind::WakeUp => EventPayload::WakeUp { description },
            EventKind::Alarm => EventPayload::Alarm,
        };
        Ok(Event::new(start_timestamp, end_timestamp, timezone_offset, payload))
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn description(&self) -> &str {
        match &self.payload {
            EventPayload::Light { description }
            | EventPayload::InBed { description }
            | EventPayload::Sleep { description } => description,
            EventPayload::WakeUp { description } => {
                description.as_deref().unwrap_or(WAKE_UP_MESSAGE)
            }
            EventPayload::None { .. } => "",
            EventPayload::Motion { .. } | EventPayload::SleepMotion { .. } => MOTION_MESSAGE,
            EventPayload::PartnerMotion { .. } => PARTNER_MOTION_MESSAGE,
            EventPayload::LightsOut => LIGHTS_OUT_MESSAGE,
            EventPayload::Sunset { .. } => SUNSET_MESSAGE,
            EventPayload::Sunrise { .. } => SUNRISE_MESSAGE,
            EventPayload::OutOfBed => OUT_OF_BED_MESSAGE,
            EventPayload::Alarm => ALARM_MESSAGE,
        }
    }

    pub fn sleep_depth(&self) -> i32 {
        match &self.payload {
            EventPayload::None { sleep_depth }
            | EventPayload::Motion { sleep_depth }
            | EventPayload::SleepMotion { sleep_depth }
            | EventPayload::PartnerMotion { sleep_depth }
            | EventPayload::Sunset { sleep_depth }
            | EventPayload::Sunrise { sleep_depth, .. } => *sleep_depth,
            _ => 0,
        }
    }

    pub fn sound_info(&self) -> Option<&SoundInfo> {
        match &self.payload {
            EventPayload::Sunrise { sound_info, .. } => sound_info.as_ref(),
            _ => None,
        }
    }

    /// Same event over a new time span.
    pub fn extend(&self, start_timestamp: i64, end_timestamp: i64) -> Event {
        Event::new(
            start_timestamp,
            end_timestamp,
            self.timezone_offset,
            self.payload.clone(),
        )
    }

    /// Same event over a new time span, with `sleep_depth` replacing the
    /// depth of kinds that carry one.
    pub fn extend_with_depth(&self, start_timestamp: i64, end_timestamp: i64, sleep_depth: i32) -> Event {
        let payload = match &self.payload {
            EventPayload::None { .. } => EventPayload::None { sleep_depth },
            EventPayload::Motion { .. } => EventPayload::Motion { sleep_depth },
            EventPayload::SleepMotion { .. } => EventPayload::SleepMotion { sleep_depth },
            EventPayload::PartnerMotion { .. } => EventPayload::PartnerMotion { sleep_depth },
            EventPayload::Sunset { .. } => EventPayload::Sunset { sleep_depth },
            EventPayload::Sunrise { sound_info, .. } => EventPayload::Sunrise {
                sleep_depth,
                sound_info: sound_info.clone(),
            },
            other => other.clone(),
        };
        Event::new(start_timestamp, end_timestamp, self.timezone_offset, payload)
    }

    pub fn with_offset(&self, timezone_offset: i32) -> Event {
        Event::new(
            self.start_timestamp,
            self.end_timestamp,
            timezone_offset,
            self.payload.clone(),
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
