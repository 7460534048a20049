use chrono::Timelike;
use thiserror::Error;

/// Width of a single slot in minutes.
pub const SLOT_WIDTH_MINUTES: u32 = 10;
/// Number of slots in one hour.
pub const SLOTS_PER_HOUR: u32 = 60 / SLOT_WIDTH_MINUTES;
/// Number of slots partitioning a calendar day.
pub const SLOTS_PER_DAY: u32 = 24 * SLOTS_PER_HOUR;
/// Index of the last slot of a day.
pub const LAST_SLOT: u32 = SLOTS_PER_DAY - 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("malformed time label '{0}', expected HH:MM")]
    MalformedLabel(String),
    #[error("slot {0} is outside 0..{SLOTS_PER_DAY}")]
    OutOfRange(u32),
}

/// Convert a wall-clock time to its slot index.
///
/// Sub-slot precision is dropped: 14:37 and 14:30 share slot 87.
pub fn time_to_slot(hour: u32, minute: u32) -> u32 {
    (hour * 60 + minute) / SLOT_WIDTH_MINUTES
}

/// Render a slot as a zero-padded `"HH:MM"` label.
pub fn slot_to_time(slot: u32) -> String {
    let (hour, minute) = slot_to_hour_minute(slot);
    format!("{:02}:{:02}", hour, minute)
}

/// Decode a slot into the hour and minute at which it starts.
pub fn slot_to_hour_minute(slot: u32) -> (u32, u32) {
    (slot / SLOTS_PER_HOUR, (slot % SLOTS_PER_HOUR) * SLOT_WIDTH_MINUTES)
}

/// Slot containing the given wall-clock time.
pub fn slot_of(time: &impl Timelike) -> u32 {
    time_to_slot(time.hour(), time.minute())
}

/// Parse an `"HH:MM"` label back into a slot.
pub fn parse_time_label(label: &str) -> Result<u32, SlotError> {
    let malformed = || SlotError::MalformedLabel(label.to_string());

    let (hour, minute) = label.trim().split_once(':').ok_or_else(malformed)?;
    let hour: u32 = hour.parse().map_err(|_| malformed())?;
    let minute: u32 = minute.parse().map_err(|_| malformed())?;
    if hour > 23 || minute > 59 {
        return Err(malformed());
    }

    Ok(time_to_slot(hour, minute))
}

/// Validate that a slot index lies within a day.
pub fn checked_slot(slot: u32) -> Result<u32, SlotError> {
    if slot < SLOTS_PER_DAY {
        Ok(slot)
    } else {
        Err(SlotError::OutOfRange(slot))
    }
}
