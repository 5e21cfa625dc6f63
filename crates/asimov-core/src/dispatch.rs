//! Command dispatch: one line in, one device call, one reply out.

use asimov_protocol::{
    ArgPolicy, Command, CommandError, Drive, LedCommand, Reply, SongCommand, WaitKind,
};
use tracing::{debug, warn};

use crate::device::Device;
use crate::error::{DeviceError, Result};

/// Result of dispatching one command line.
#[derive(Debug)]
pub enum Outcome {
    Executed(Command),
    /// The line did not parse; the device was not touched.
    Malformed(CommandError),
    DeviceFailed(DeviceError),
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Executed(_))
    }

    #[must_use]
    pub fn reply(&self) -> Reply {
        Reply::from_success(self.is_success())
    }
}

/// Parses command lines and drives a [`Device`] with them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    policy: ArgPolicy,
}

impl Dispatcher {
    #[must_use]
    pub fn new(policy: ArgPolicy) -> Self {
        Self { policy }
    }

    /// Parse `line` and run it on `device`.
    pub fn dispatch(&self, device: &mut dyn Device, line: &str) -> Outcome {
        let command = match Command::parse(line, self.policy) {
            Ok(command) => command,
            Err(e) => {
                debug!(line, error = %e, "Malformed command");
                return Outcome::Malformed(e);
            }
        };

        match execute(device, &command) {
            Ok(()) => {
                debug!(family = command.family(), %command, "Command executed");
                Outcome::Executed(command)
            }
            Err(e) => {
                warn!(%command, error = %e, "Device rejected command");
                Outcome::DeviceFailed(e)
            }
        }
    }
}

/// Run an already parsed command on `device`.
///
/// # Errors
///
/// Returns the device's error unchanged.
pub fn execute(device: &mut dyn Device, command: &Command) -> Result<()> {
    match command {
        Command::Beep => device.beep(),
        Command::Drive(drive) => execute_drive(device, *drive),
        Command::Led(led) => match *led {
            LedCommand::Switch { led, on } => device.set_led(led, on),
            LedCommand::PowerOff => device.power_led_off(),
            LedCommand::Power { color, intensity } => device.set_power_led(color, intensity),
            LedCommand::Flash {
                led,
                count,
                duration_millis,
            } => device.flash_led(led, count, duration_millis),
        },
        Command::Song(SongCommand::Define { index, notes }) => device.define_song(*index, notes),
        Command::Song(SongCommand::Play { index }) => device.play_song(*index),
        Command::Wait { kind, magnitude } => match kind {
            WaitKind::Time => device.wait_time(*magnitude),
            WaitKind::Distance => device.wait_distance(*magnitude),
            WaitKind::Angle => device.wait_angle(*magnitude),
            WaitKind::Event => device.wait_event(*magnitude),
        },
        Command::Mode(mode) => device.change_mode(*mode),
    }
}

fn execute_drive(device: &mut dyn Device, drive: Drive) -> Result<()> {
    match drive {
        Drive::Normal { velocity, radius } => device.drive(velocity, radius),
        Drive::Time {
            velocity,
            radius,
            millis,
        } => device.drive_time(velocity, radius, millis),
        Drive::Distance {
            velocity,
            radius,
            millimetres,
        } => device.drive_distance(velocity, radius, millimetres),
        Drive::Straight { velocity } => device.drive_straight(velocity),
        Drive::StraightTime { velocity, millis } => device.drive_straight_time(velocity, millis),
        Drive::StraightDistance {
            velocity,
            millimetres,
        } => device.drive_straight_distance(velocity, millimetres),
        Drive::Direct { left, right } => device.drive_direct(left, right),
        Drive::Spin { velocity } => device.spin(velocity),
        Drive::SpinTime { velocity, millis } => device.spin_time(velocity, millis),
        Drive::SpinAngle { velocity, degrees } => device.spin_angle(velocity, degrees),
        Drive::Stop => device.stop(),
    }
}
