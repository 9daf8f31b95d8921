//! The slot grid — business hours divided into fixed-length slots.

use chrono::{Duration, NaiveTime};
use maitre_core::{config::BookingConfig, error::MaitreError};

/// Bookable times derived from configured opening hours and slot length.
#[derive(Debug, Clone)]
pub struct SlotGrid {
    open: NaiveTime,
    close: NaiveTime,
    slot_minutes: u32,
}

impl SlotGrid {
    /// Build the grid from config. Rejects nonsensical hours up front so
    /// availability queries can't silently return an empty calendar.
    pub fn from_config(config: &BookingConfig) -> Result<Self, MaitreError> {
        let open = parse_time(&config.open_time)?;
        let close = parse_time(&config.close_time)?;
        if open >= close {
            return Err(MaitreError::Config(format!(
                "booking open_time {} must be before close_time {}",
                config.open_time, config.close_time
            )));
        }
        if config.slot_minutes == 0 {
            return Err(MaitreError::Config("booking slot_minutes must be > 0".into()));
        }
        Ok(Self {
            open,
            close,
            slot_minutes: config.slot_minutes,
        })
    }

    /// All slot start times, ascending. Slots start strictly before closing.
    pub fn times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(self.slot_minutes as i64);
        let mut times = Vec::new();
        let mut t = self.open;
        while t < self.close {
            times.push(t);
            // NaiveTime arithmetic wraps at midnight; a wrap means we ran
            // off the end of the day.
            let (next, wrapped) = t.overflowing_add_signed(step);
            if wrapped != 0 {
                break;
            }
            t = next;
        }
        times
    }

    /// Whether a time lands exactly on the grid.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if time < self.open || time >= self.close {
            return false;
        }
        let offset = (time - self.open).num_seconds();
        offset % (self.slot_minutes as i64 * 60) == 0
    }
}

fn parse_time(s: &str) -> Result<NaiveTime, MaitreError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| MaitreError::Config(format!("invalid time '{s}': {e}")))
}
