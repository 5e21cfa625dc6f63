//! Robot device adapters.
//!
//! [`Device`] is the seam between the command dispatcher and the hardware. Every
//! operation blocks until the robot has been told what to do and reports
//! success or a [`DeviceError`](crate::DeviceError).

mod interrupt;
mod logging;
mod open_interface;

pub use interrupt::Interrupt;
pub use logging::{Journal, LoggingDevice};
pub use open_interface::OpenInterface;

use asimov_protocol::{LedTarget, Mode, Note};
use tracing::warn;

use crate::error::{DeviceError, Result};

/// Serial device used when none is given.
pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";

pub const VELOCITY_MAX: i32 = 500;
pub const RADIUS_MAX: i32 = 2000;
pub const SONG_SLOTS: i32 = 16;
pub const SONG_MAX_NOTES: usize = 16;
/// Wait events are numbered from zero on the wire.
pub const WAIT_EVENT_COUNT: i32 = 22;

/// Longest wait one command may ask for: an hour.
pub const WAIT_TIME_MAX_MILLIS: i32 = 3_600_000;

/// Song slot used by [`Device::beep`].
pub const BEEP_SONG: u8 = 15;

pub(crate) fn check_velocity(name: &'static str, velocity: i32) -> Result<()> {
    DeviceError::check(
        name,
        i64::from(velocity),
        i64::from(-VELOCITY_MAX),
        i64::from(VELOCITY_MAX),
    )
}

pub(crate) fn check_radius(radius: i32) -> Result<()> {
    DeviceError::check(
        "radius",
        i64::from(radius),
        i64::from(-RADIUS_MAX),
        i64::from(RADIUS_MAX),
    )
}

pub(crate) fn check_byte(name: &'static str, value: i32) -> Result<u8> {
    DeviceError::check(name, i64::from(value), 0, 255)?;
    Ok(u8::try_from(value).unwrap_or(u8::MAX))
}

pub(crate) fn check_song(index: i32) -> Result<u8> {
    DeviceError::check("song index", i64::from(index), 0, i64::from(SONG_SLOTS - 1))?;
    Ok(u8::try_from(index).unwrap_or(u8::MAX))
}

pub(crate) fn check_notes(notes: &[Note]) -> Result<()> {
    let len = i64::try_from(notes.len()).unwrap_or(i64::MAX);
    DeviceError::check("song length", len, 1, i64::try_from(SONG_MAX_NOTES).unwrap_or(16))
}

pub(crate) fn check_event(event: i32) -> Result<()> {
    DeviceError::check(
        "wait event",
        i64::from(event),
        0,
        i64::from(WAIT_EVENT_COUNT - 1),
    )
}

pub(crate) fn check_non_negative(name: &'static str, value: i32) -> Result<()> {
    DeviceError::check(name, i64::from(value), 0, i64::from(i32::MAX))
}

pub(crate) fn check_wait_time(millis: i32) -> Result<()> {
    DeviceError::check("time", i64::from(millis), 0, i64::from(WAIT_TIME_MAX_MILLIS))
}

/// Distances and angles travel as signed 16-bit words.
pub(crate) fn check_word(name: &'static str, value: i32) -> Result<()> {
    DeviceError::check(
        name,
        i64::from(value),
        i64::from(i16::MIN),
        i64::from(i16::MAX),
    )
}

/// Stop after a manoeuvre's wait, even when the wait itself failed.
fn stop_after<D: Device + ?Sized>(device: &mut D, waited: Result<()>) -> Result<()> {
    match waited {
        Ok(()) => device.stop(),
        Err(e) => {
            if let Err(stop_error) = device.stop() {
                warn!("Failed to stop robot after {}: {}", e, stop_error);
            }
            Err(e)
        }
    }
}

/// Blocking adapter for one robot.
///
/// Compound manoeuvres (timed or measured drives and spins) are provided on
/// top of the primitives as drive, wait, stop.
pub trait Device: Send {
    fn change_mode(&mut self, mode: Mode) -> Result<()>;

    /// Drive at `velocity` mm/s along an arc of `radius` mm.
    fn drive(&mut self, velocity: i32, radius: i32) -> Result<()>;

    fn drive_straight(&mut self, velocity: i32) -> Result<()>;

    /// Set each wheel's velocity in mm/s.
    fn drive_direct(&mut self, left: i32, right: i32) -> Result<()>;

    /// Turn in place; positive velocity turns counter-clockwise.
    fn spin(&mut self, velocity: i32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Switch the advance or play LED.
    fn set_led(&mut self, led: LedTarget, on: bool) -> Result<()>;

    fn set_power_led(&mut self, color: i32, intensity: i32) -> Result<()>;

    /// Toggle an LED `count` times, holding each state for `duration_millis`.
    fn flash_led(&mut self, led: LedTarget, count: i32, duration_millis: i32) -> Result<()>;

    fn define_song(&mut self, index: i32, notes: &[Note]) -> Result<()>;

    fn play_song(&mut self, index: i32) -> Result<()>;

    fn wait_time(&mut self, millis: i32) -> Result<()>;

    fn wait_distance(&mut self, millimetres: i32) -> Result<()>;

    fn wait_angle(&mut self, degrees: i32) -> Result<()>;

    /// Wait for one of the 22 robot events, numbered from zero.
    fn wait_event(&mut self, event: i32) -> Result<()>;

    fn beep(&mut self) -> Result<()>;

    /// Stop the robot and release the device.
    fn disconnect(&mut self) -> Result<()>;

    fn power_led_off(&mut self) -> Result<()> {
        self.set_power_led(0, 0)
    }

    fn drive_time(&mut self, velocity: i32, radius: i32, millis: i32) -> Result<()> {
        check_wait_time(millis)?;
        self.drive(velocity, radius)?;
        let waited = self.wait_time(millis);
        stop_after(self, waited)
    }

    fn drive_distance(&mut self, velocity: i32, radius: i32, millimetres: i32) -> Result<()> {
        check_word("distance", millimetres)?;
        self.drive(velocity, radius)?;
        let waited = self.wait_distance(millimetres);
        stop_after(self, waited)
    }

    fn drive_straight_time(&mut self, velocity: i32, millis: i32) -> Result<()> {
        check_wait_time(millis)?;
        self.drive_straight(velocity)?;
        let waited = self.wait_time(millis);
        stop_after(self, waited)
    }

    fn drive_straight_distance(&mut self, velocity: i32, millimetres: i32) -> Result<()> {
        check_word("distance", millimetres)?;
        self.drive_straight(velocity)?;
        let waited = self.wait_distance(millimetres);
        stop_after(self, waited)
    }

    fn spin_time(&mut self, velocity: i32, millis: i32) -> Result<()> {
        check_wait_time(millis)?;
        self.spin(velocity)?;
        let waited = self.wait_time(millis);
        stop_after(self, waited)
    }

    fn spin_angle(&mut self, velocity: i32, degrees: i32) -> Result<()> {
        check_word("angle", degrees)?;
        self.spin(velocity)?;
        let waited = self.wait_angle(degrees);
        stop_after(self, waited)
    }
}
