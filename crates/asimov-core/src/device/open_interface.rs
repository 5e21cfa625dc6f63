//! iRobot Create Open Interface adapter.
//!
//! Each operation is encoded as an opcode followed by its data bytes and
//! written straight to the serial port. 16-bit values are big-endian two's
//! complement. The port runs raw at 57600 baud, 8N1, without flow control.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use asimov_protocol::{LedTarget, Mode, Note};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use super::{
    BEEP_SONG, Device, Interrupt, check_byte, check_event, check_non_negative, check_notes,
    check_radius, check_song, check_velocity, check_wait_time, check_word,
};
use crate::error::Result;

const BAUD_RATE: u32 = 57_600;
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

const START: u8 = 128;
const SAFE: u8 = 131;
const FULL: u8 = 132;
const DRIVE: u8 = 137;
const LEDS: u8 = 139;
const SONG: u8 = 140;
const PLAY: u8 = 141;
const DRIVE_DIRECT: u8 = 145;
const WAIT_TIME: u8 = 155;
const WAIT_DISTANCE: u8 = 156;
const WAIT_ANGLE: u8 = 157;
const WAIT_EVENT: u8 = 158;

/// Special radius for driving straight.
const RADIUS_STRAIGHT: u16 = 0x8000;
/// Special radius for turning in place counter-clockwise.
const RADIUS_SPIN: i16 = 1;

const ADVANCE_BIT: u8 = 0x08;
const PLAY_BIT: u8 = 0x02;

/// Longest single wait-time command, in tenths of a second.
const WAIT_TIME_MAX_TENTHS: i32 = 255;

const BEEP_NOTE: Note = Note {
    pitch: 72,
    duration: 12,
};

/// Last LED state sent, so changing one LED keeps the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LedState {
    advance: bool,
    play: bool,
    color: u8,
    intensity: u8,
}

impl LedState {
    fn bits(self) -> u8 {
        let mut bits = 0;
        if self.advance {
            bits |= ADVANCE_BIT;
        }
        if self.play {
            bits |= PLAY_BIT;
        }
        bits
    }

    fn with(self, led: LedTarget, on: bool) -> Self {
        let mut leds = self;
        match led {
            LedTarget::Advance => leds.advance = on,
            LedTarget::Play => leds.play = on,
            LedTarget::Power => {
                leds.intensity = match (on, leds.intensity) {
                    (false, _) => 0,
                    (true, 0) => u8::MAX,
                    (true, intensity) => intensity,
                };
            }
        }
        leds
    }
}

fn word(value: i32) -> [u8; 2] {
    let clamped = value.clamp(i32::from(i16::MIN), i32::from(i16::MAX));
    i16::try_from(clamped).unwrap_or_default().to_be_bytes()
}

/// Create robot on a serial port.
#[derive(Debug)]
pub struct OpenInterface<W: Write + Send> {
    port: W,
    leds: LedState,
    interrupt: Interrupt,
}

impl OpenInterface<Box<dyn SerialPort>> {
    /// Open and configure the serial device, then put the robot in safe mode.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Serial` if the device cannot be opened or
    /// configured, and `DeviceError::Io` if it cannot be written.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let port = serialport::new(path.to_string_lossy(), BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(WRITE_TIMEOUT)
            .open()?;
        info!(device = %path.display(), baud = BAUD_RATE, "Opened robot serial port");

        let mut robot = Self::new(port);
        robot.init()?;
        Ok(robot)
    }
}

impl<W: Write + Send> OpenInterface<W> {
    /// Wrap an already opened port without sending anything.
    #[must_use]
    pub fn new(port: W) -> Self {
        Self {
            port,
            leds: LedState::default(),
            interrupt: Interrupt::new(),
        }
    }

    /// Let `interrupt` cut LED flashing short.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Start the Open Interface and enter safe mode.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Io` if the port cannot be written.
    pub fn init(&mut self) -> Result<()> {
        self.send(&[START, SAFE])
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.port
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        debug!(?bytes, "Writing to robot");
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn send_drive(&mut self, velocity: i32, radius: [u8; 2]) -> Result<()> {
        let [vh, vl] = word(velocity);
        let [rh, rl] = radius;
        self.send(&[DRIVE, vh, vl, rh, rl])
    }

    fn send_leds(&mut self, leds: LedState) -> Result<()> {
        self.send(&[LEDS, leds.bits(), leds.color, leds.intensity])?;
        self.leds = leds;
        Ok(())
    }

    fn send_song(&mut self, index: u8, notes: &[Note]) -> Result<()> {
        let mut bytes = Vec::with_capacity(3 + notes.len() * 2);
        bytes.push(SONG);
        bytes.push(index);
        bytes.push(u8::try_from(notes.len()).unwrap_or(u8::MAX));
        for note in notes {
            bytes.push(note.pitch);
            bytes.push(note.duration);
        }
        self.send(&bytes)
    }
}

impl<W: Write + Send> Device for OpenInterface<W> {
    fn change_mode(&mut self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Full => self.send(&[FULL]),
            Mode::Safe => self.send(&[SAFE]),
            // Start drops any mode back to passive
            Mode::Passive => self.send(&[START]),
        }
    }

    fn drive(&mut self, velocity: i32, radius: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        check_radius(radius)?;
        self.send_drive(velocity, word(radius))
    }

    fn drive_straight(&mut self, velocity: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        self.send_drive(velocity, RADIUS_STRAIGHT.to_be_bytes())
    }

    fn drive_direct(&mut self, left: i32, right: i32) -> Result<()> {
        check_velocity("left velocity", left)?;
        check_velocity("right velocity", right)?;
        let [rh, rl] = word(right);
        let [lh, ll] = word(left);
        self.send(&[DRIVE_DIRECT, rh, rl, lh, ll])
    }

    fn spin(&mut self, velocity: i32) -> Result<()> {
        check_velocity("velocity", velocity)?;
        self.send_drive(velocity, RADIUS_SPIN.to_be_bytes())
    }

    fn stop(&mut self) -> Result<()> {
        self.send_drive(0, [0, 0])
    }

    fn set_led(&mut self, led: LedTarget, on: bool) -> Result<()> {
        self.send_leds(self.leds.with(led, on))
    }

    fn set_power_led(&mut self, color: i32, intensity: i32) -> Result<()> {
        let color = check_byte("colour", color)?;
        let intensity = check_byte("intensity", intensity)?;
        let leds = LedState {
            color,
            intensity,
            ..self.leds
        };
        self.send_leds(leds)
    }

    fn flash_led(&mut self, led: LedTarget, count: i32, duration_millis: i32) -> Result<()> {
        check_non_negative("flash count", count)?;
        check_non_negative("flash duration", duration_millis)?;

        let original = self.leds;
        let hold = Duration::from_millis(u64::try_from(duration_millis).unwrap_or_default());
        let lit = match led {
            LedTarget::Advance => original.advance,
            LedTarget::Play => original.play,
            LedTarget::Power => original.intensity > 0,
        };
        let (on, off) = (original.with(led, true), original.with(led, false));
        let (first, second) = if lit { (off, on) } else { (on, off) };

        for _ in 0..count {
            self.send_leds(first)?;
            self.interrupt.sleep(hold)?;
            self.send_leds(second)?;
            self.interrupt.sleep(hold)?;
        }

        self.send_leds(original)
    }

    fn define_song(&mut self, index: i32, notes: &[Note]) -> Result<()> {
        let index = check_song(index)?;
        check_notes(notes)?;
        self.send_song(index, notes)
    }

    fn play_song(&mut self, index: i32) -> Result<()> {
        let index = check_song(index)?;
        self.send(&[PLAY, index])
    }

    fn wait_time(&mut self, millis: i32) -> Result<()> {
        check_wait_time(millis)?;

        // The robot counts tenths of a second in one byte, so long waits are
        // sent as several commands.
        let mut remaining = millis / 100 + i32::from(millis % 100 >= 50);
        loop {
            let chunk = remaining.min(WAIT_TIME_MAX_TENTHS);
            self.send(&[WAIT_TIME, u8::try_from(chunk).unwrap_or(u8::MAX)])?;
            remaining -= chunk;
            if remaining == 0 {
                return Ok(());
            }
        }
    }

    fn wait_distance(&mut self, millimetres: i32) -> Result<()> {
        check_word("distance", millimetres)?;
        let [h, l] = word(millimetres);
        self.send(&[WAIT_DISTANCE, h, l])
    }

    fn wait_angle(&mut self, degrees: i32) -> Result<()> {
        check_word("angle", degrees)?;
        let [h, l] = word(degrees);
        self.send(&[WAIT_ANGLE, h, l])
    }

    fn wait_event(&mut self, event: i32) -> Result<()> {
        check_event(event)?;
        // Robot event ids start at one
        let id = u8::try_from(event + 1).unwrap_or(u8::MAX);
        self.send(&[WAIT_EVENT, id])
    }

    fn beep(&mut self) -> Result<()> {
        self.send_song(BEEP_SONG, &[BEEP_NOTE])?;
        self.send(&[PLAY, BEEP_SONG])
    }

    fn disconnect(&mut self) -> Result<()> {
        self.stop()?;
        self.send(&[START])?;
        info!("Robot returned to passive mode");
        Ok(())
    }
}
