use std::sync::{Arc, Mutex, PoisonError};

use asimov_protocol::{LedTarget, Mode, Note};
use tracing::info;

use super::{
    Device, check_byte, check_event, check_non_negative, check_notes, check_radius, check_song,
    check_velocity, check_wait_time, check_word,
};
use crate::error::{DeviceError, Result};

/// Shared record of the operations a [`LoggingDevice`] received.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, entry: String) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }
}

/// Device that logs every operation instead of driving hardware.
///
/// Used by `asimovd --dry-run` and by tests. Arguments are range-checked the
/// same way the Open Interface adapter checks them; only operations that pass
/// are recorded in the [`Journal`].
#[derive(Debug, Default)]
pub struct LoggingDevice {
    journal: Journal,
    reject_all: bool,
}

impl LoggingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A device that records each operation and then reports failure.
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            journal: Journal::default(),
            reject_all: true,
        }
    }

    #[must_use]
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    fn record(&mut self, entry: String) -> Result<()> {
        info!(operation = %entry, "Robot operation");
        self.journal.push(entry.clone());
        if self.reject_all {
            return Err(DeviceError::Rejected(entry));
        }
        Ok(())
    }
}

impl Device for LoggingDevice {
    fn change_mode(&mut self, mode: Mode) -> Result<()> {
        self.record(format!("mode {}", mode.keyword().to_lowercase()))
    }

    fn drive(&mut self, velocity: i32, radius: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        check_radius(radius)?;
        self.record(format!("drive {velocity} {radius}"))
    }

    fn drive_straight(&mut self, velocity: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        self.record(format!("drive straight {velocity}"))
    }

    fn drive_direct(&mut self, left: i32, right: i32) -> Result<()> {
        check_velocity("left velocity", left)?;
        check_velocity("right velocity", right)?;
        self.record(format!("drive direct {left} {right}"))
    }

    fn spin(&mut self, velocity: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        self.record(format!("spin {velocity}"))
    }

    fn stop(&mut self) -> Result<()> {
        self.record("stop".to_string())
    }

    fn set_led(&mut self, led: LedTarget, on: bool) -> Result<()> {
        let state = if on { "on" } else { "off" };
        self.record(format!("led {} {state}", led.keyword().to_lowercase()))
    }

    fn set_power_led(&mut self, color: i32, intensity: i32) -> Result<()> {
        check_byte("colour", color)?;
        check_byte("intensity", intensity)?;
        self.record(format!("led power {color} {intensity}"))
    }

    fn flash_led(&mut self, led: LedTarget, count: i32, duration_millis: i32) -> Result<()> {
        check_non_negative("flash count", count)?;
        check_non_negative("flash duration", duration_millis)?;
        self.record(format!(
            "flash {} {count} {duration_millis}",
            led.keyword().to_lowercase()
        ))
    }

    fn define_song(&mut self, index: i32, notes: &[Note]) -> Result<()> {
        check_song(index)?;
        check_notes(notes)?;
        self.record(format!("define song {index} with {} notes", notes.len()))
    }

    fn play_song(&mut self, index: i32) -> Result<()> {
        check_song(index)?;
        self.record(format!("play song {index}"))
    }

    fn wait_time(&mut self, millis: i32) -> Result<()> {
        check_wait_time(millis)?;
        self.record(format!("wait time {millis}"))
    }

    fn wait_distance(&mut self, millimetres: i32) -> Result<()> {
        check_word("distance", millimetres)?;
        self.record(format!("wait distance {millimetres}"))
    }

    fn wait_angle(&mut self, degrees: i32) -> Result<()> {
        check_word("angle", degrees)?;
        self.record(format!("wait angle {degrees}"))
    }

    fn wait_event(&mut self, event: i32) -> Result<()> {
        check_event(event)?;
        self.record(format!("wait event {event}"))
    }

    fn beep(&mut self) -> Result<()> {
        self.record("beep".to_string())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.record("disconnect".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_operations_in_order() {
        let mut device = LoggingDevice::new();
        let journal = device.journal();

        device.change_mode(Mode::Full).unwrap();
        device.set_led(LedTarget::Play, true).unwrap();
        device.beep().unwrap();

        assert_eq!(journal.entries(), vec!["mode full", "led play on", "beep"]);
        assert_eq!(journal.len(), 3);
    }

    #[test]
    fn test_out_of_range_is_not_recorded() {
        let mut device = LoggingDevice::new();
        let journal = device.journal();

        let result = device.drive(900, 0);
        assert!(matches!(
            result,
            Err(DeviceError::OutOfRange {
                name: "velocity",
                ..
            })
        ));
        assert!(device.set_power_led(0, 300).is_err());
        assert!(device.wait_event(22).is_err());
        assert!(device.wait_distance(40_000).is_err());
        assert!(device.wait_angle(-40_000).is_err());
        assert!(device.wait_time(i32::MAX).is_err());
        assert!(journal.is_empty());
    }

    #[test]
    fn test_rejecting_device_records_then_fails() {
        let mut device = LoggingDevice::rejecting();
        let journal = device.journal();

        let result = device.beep();
        assert!(matches!(result, Err(DeviceError::Rejected(op)) if op == "beep"));
        assert_eq!(journal.entries(), vec!["beep"]);
    }

    #[test]
    fn test_journal_is_shared_between_clones() {
        let device = LoggingDevice::new();
        let journal = device.journal();
        let other = journal.clone();

        journal.push("stop".to_string());
        assert_eq!(other.entries(), vec!["stop"]);
    }

    #[test]
    fn test_power_led_off_uses_zero_intensity() {
        let mut device = LoggingDevice::new();
        let journal = device.journal();

        device.power_led_off().unwrap();
        assert_eq!(journal.entries(), vec!["led power 0 0"]);
    }
}
