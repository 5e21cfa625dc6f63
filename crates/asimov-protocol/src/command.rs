//! Command grammar for the gateway protocol.
//!
//! A command line is split on whitespace into an ordered token sequence. The
//! first token selects the command family and the rest are consumed by index
//! by the family's sub-parser:
//!
//! ```text
//! BEEP
//! DRIVE NORMAL <velocity> <radius>
//! DRIVE TIME <velocity> <radius> <millis>
//! DRIVE DISTANCE <velocity> <radius> <millimetres>
//! DRIVE STRAIGHT NORMAL <velocity>
//! DRIVE STRAIGHT TIME <velocity> <millis>
//! DRIVE STRAIGHT DISTANCE <velocity> <millimetres>
//! DRIVE DIRECT <left velocity> <right velocity>
//! DRIVE SPIN NORMAL <velocity>
//! DRIVE SPIN TIME <velocity> <millis>
//! DRIVE SPIN ANGLE <velocity> <degrees>
//! DRIVE STOP
//! LED ADVANCE|PLAY ON|OFF
//! LED POWER OFF
//! LED POWER <colour> <intensity>
//! LED FLASH ADVANCE|PLAY|POWER <count> <duration millis>
//! SONG DEFINE <index> <note,note,...> <duration,duration,...>
//! SONG PLAY <index>
//! WAIT TIME|DISTANCE|ANGLE|EVENT <magnitude>
//! MODE FULL|SAFE|PASSIVE
//! ```
//!
//! Keywords match exactly (case-sensitive). Tokens after a complete command
//! are ignored.

use std::fmt;
use std::str::FromStr;

pub const BEEP: &str = "BEEP";
pub const DRIVE: &str = "DRIVE";
pub const LED: &str = "LED";
pub const SONG: &str = "SONG";
pub const WAIT: &str = "WAIT";
pub const MODE: &str = "MODE";

/// How integer arguments are converted.
///
/// `Lenient` reads an optional sign and leading digits and ignores the rest,
/// so `12abc` is 12 and `abc` is 0. `Strict` requires the whole token to be a
/// decimal integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgPolicy {
    #[default]
    Lenient,
    Strict,
}

impl ArgPolicy {
    /// Convert one integer token.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidInteger` under `Strict` when the token is
    /// not a complete decimal integer in `i32` range.
    pub fn integer(self, name: &'static str, token: &str) -> Result<i32, CommandError> {
        match self {
            ArgPolicy::Lenient => Ok(lenient_integer(token)),
            ArgPolicy::Strict => token
                .parse::<i32>()
                .map_err(|_| CommandError::InvalidInteger {
                    name,
                    token: token.to_string(),
                }),
        }
    }
}

/// C `atoi` semantics, saturating instead of overflowing.
fn lenient_integer(token: &str) -> i32 {
    let trimmed = token.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, trimmed.get(1..).unwrap_or_default()),
        Some(b'+') => (false, trimmed.get(1..).unwrap_or_default()),
        _ => (false, trimmed),
    };

    let limit = i64::from(i32::MAX) + 1;
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0_i64, |acc, digit| {
            (acc * 10 + i64::from(digit - b'0')).min(limit)
        });

    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).unwrap_or(if negative { i32::MIN } else { i32::MAX })
}

/// Ordered whitespace-separated tokens of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens<'a> {
    items: Vec<&'a str>,
}

impl<'a> Tokens<'a> {
    #[must_use]
    pub fn split(line: &'a str) -> Self {
        Self {
            items: line.split_whitespace().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&'a str> {
        self.items.get(index).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reasons a line fails to parse as a command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown {expected}: {token}")]
    UnknownKeyword {
        expected: &'static str,
        token: String,
    },

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid integer for {name}: {token}")]
    InvalidInteger { name: &'static str, token: String },

    #[error("Value for {name} does not fit in a byte: {value}")]
    ByteOutOfRange { name: &'static str, value: i32 },

    #[error("Song has {notes} notes but {durations} durations")]
    SongLengthMismatch { notes: usize, durations: usize },
}

/// Drive manoeuvres. Velocities are mm/s, radii mm, times ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Normal { velocity: i32, radius: i32 },
    Time { velocity: i32, radius: i32, millis: i32 },
    Distance { velocity: i32, radius: i32, millimetres: i32 },
    Straight { velocity: i32 },
    StraightTime { velocity: i32, millis: i32 },
    StraightDistance { velocity: i32, millimetres: i32 },
    Direct { left: i32, right: i32 },
    Spin { velocity: i32 },
    SpinTime { velocity: i32, millis: i32 },
    SpinAngle { velocity: i32, degrees: i32 },
    Stop,
}

/// The robot's three LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedTarget {
    Advance,
    Play,
    Power,
}

impl LedTarget {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            LedTarget::Advance => "ADVANCE",
            LedTarget::Play => "PLAY",
            LedTarget::Power => "POWER",
        }
    }

    fn parse(token: &str) -> Result<Self, CommandError> {
        match token {
            "ADVANCE" => Ok(LedTarget::Advance),
            "PLAY" => Ok(LedTarget::Play),
            "POWER" => Ok(LedTarget::Power),
            other => Err(CommandError::UnknownKeyword {
                expected: "LED",
                token: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for LedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedCommand {
    /// Advance or play LED on or off.
    Switch { led: LedTarget, on: bool },
    PowerOff,
    Power { color: i32, intensity: i32 },
    Flash {
        led: LedTarget,
        count: i32,
        duration_millis: i32,
    },
}

/// One note of a song, both values in Open Interface units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub pitch: u8,
    /// Duration in 1/64ths of a second.
    pub duration: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongCommand {
    Define { index: i32, notes: Vec<Note> },
    Play { index: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitKind {
    Time,
    Distance,
    Angle,
    Event,
}

impl WaitKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            WaitKind::Time => "TIME",
            WaitKind::Distance => "DISTANCE",
            WaitKind::Angle => "ANGLE",
            WaitKind::Event => "EVENT",
        }
    }
}

/// Robot operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Full,
    Safe,
    Passive,
}

impl Mode {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Mode::Full => "FULL",
            Mode::Safe => "SAFE",
            Mode::Passive => "PASSIVE",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A decoded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Beep,
    Drive(Drive),
    Led(LedCommand),
    Song(SongCommand),
    Wait { kind: WaitKind, magnitude: i32 },
    Mode(Mode),
}

impl Command {
    /// Parse one line with the given integer policy.
    ///
    /// # Errors
    ///
    /// Returns a `CommandError` describing the first missing or malformed token.
    pub fn parse(line: &str, policy: ArgPolicy) -> Result<Self, CommandError> {
        let tokens = Tokens::split(line);
        let mut args = Cursor::new(&tokens, policy);

        let family = args.next_token().ok_or(CommandError::Empty)?;
        match family {
            BEEP => Ok(Command::Beep),
            DRIVE => parse_drive(&mut args).map(Command::Drive),
            LED => parse_led(&mut args).map(Command::Led),
            SONG => parse_song(&mut args).map(Command::Song),
            WAIT => parse_wait(&mut args),
            MODE => parse_mode(&mut args).map(Command::Mode),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    /// The command family keyword.
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            Command::Beep => BEEP,
            Command::Drive(_) => DRIVE,
            Command::Led(_) => LED,
            Command::Song(_) => SONG,
            Command::Wait { .. } => WAIT,
            Command::Mode(_) => MODE,
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::parse(s, ArgPolicy::Strict)
    }
}

/// Reads tokens by index, starting after the family keyword.
struct Cursor<'t, 'a> {
    tokens: &'t Tokens<'a>,
    index: usize,
    policy: ArgPolicy,
}

impl<'t, 'a> Cursor<'t, 'a> {
    fn new(tokens: &'t Tokens<'a>, policy: ArgPolicy) -> Self {
        Self {
            tokens,
            index: 0,
            policy,
        }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let token = self.tokens.get(self.index)?;
        self.index += 1;
        Some(token)
    }

    fn word(&mut self, name: &'static str) -> Result<&'a str, CommandError> {
        self.next_token().ok_or(CommandError::MissingArgument(name))
    }

    fn int(&mut self, name: &'static str) -> Result<i32, CommandError> {
        let token = self.word(name)?;
        self.policy.integer(name, token)
    }

    fn byte_list(&mut self, name: &'static str) -> Result<Vec<u8>, CommandError> {
        let token = self.word(name)?;
        token
            .split(',')
            .map(|entry| {
                let value = self.policy.integer(name, entry)?;
                u8::try_from(value).map_err(|_| CommandError::ByteOutOfRange { name, value })
            })
            .collect()
    }
}

fn unknown(expected: &'static str, token: &str) -> CommandError {
    CommandError::UnknownKeyword {
        expected,
        token: token.to_string(),
    }
}

fn parse_drive(args: &mut Cursor<'_, '_>) -> Result<Drive, CommandError> {
    let drive = match args.word("drive mode")? {
        "NORMAL" => Drive::Normal {
            velocity: args.int("velocity")?,
            radius: args.int("radius")?,
        },
        "TIME" => Drive::Time {
            velocity: args.int("velocity")?,
            radius: args.int("radius")?,
            millis: args.int("time")?,
        },
        "DISTANCE" => Drive::Distance {
            velocity: args.int("velocity")?,
            radius: args.int("radius")?,
            millimetres: args.int("distance")?,
        },
        "STRAIGHT" => match args.word("straight mode")? {
            "NORMAL" => Drive::Straight {
                velocity: args.int("velocity")?,
            },
            "TIME" => Drive::StraightTime {
                velocity: args.int("velocity")?,
                millis: args.int("time")?,
            },
            "DISTANCE" => Drive::StraightDistance {
                velocity: args.int("velocity")?,
                millimetres: args.int("distance")?,
            },
            other => return Err(unknown("straight mode", other)),
        },
        "DIRECT" => Drive::Direct {
            left: args.int("left velocity")?,
            right: args.int("right velocity")?,
        },
        "SPIN" => match args.word("spin mode")? {
            "NORMAL" => Drive::Spin {
                velocity: args.int("velocity")?,
            },
            "TIME" => Drive::SpinTime {
                velocity: args.int("velocity")?,
                millis: args.int("time")?,
            },
            "ANGLE" => Drive::SpinAngle {
                velocity: args.int("velocity")?,
                degrees: args.int("angle")?,
            },
            other => return Err(unknown("spin mode", other)),
        },
        "STOP" => Drive::Stop,
        other => return Err(unknown("drive mode", other)),
    };
    Ok(drive)
}

fn parse_led(args: &mut Cursor<'_, '_>) -> Result<LedCommand, CommandError> {
    let target = args.word("LED")?;
    match target {
        "ADVANCE" | "PLAY" => {
            let led = LedTarget::parse(target)?;
            let on = match args.word("LED state")? {
                "ON" => true,
                "OFF" => false,
                other => return Err(unknown("LED state", other)),
            };
            Ok(LedCommand::Switch { led, on })
        }
        "POWER" => {
            let first = args.word("colour")?;
            if first == "OFF" {
                return Ok(LedCommand::PowerOff);
            }
            let color = args.policy.integer("colour", first)?;
            let intensity = args.int("intensity")?;
            Ok(LedCommand::Power { color, intensity })
        }
        "FLASH" => Ok(LedCommand::Flash {
            led: LedTarget::parse(args.word("flash target")?)?,
            count: args.int("flash count")?,
            duration_millis: args.int("flash duration")?,
        }),
        other => Err(unknown("LED", other)),
    }
}

fn parse_song(args: &mut Cursor<'_, '_>) -> Result<SongCommand, CommandError> {
    match args.word("song action")? {
        "DEFINE" => {
            let index = args.int("song index")?;
            let pitches = args.byte_list("notes")?;
            let durations = args.byte_list("durations")?;
            if pitches.len() != durations.len() {
                return Err(CommandError::SongLengthMismatch {
                    notes: pitches.len(),
                    durations: durations.len(),
                });
            }
            let notes = pitches
                .into_iter()
                .zip(durations)
                .map(|(pitch, duration)| Note { pitch, duration })
                .collect();
            Ok(SongCommand::Define { index, notes })
        }
        "PLAY" => Ok(SongCommand::Play {
            index: args.int("song index")?,
        }),
        other => Err(unknown("song action", other)),
    }
}

fn parse_wait(args: &mut Cursor<'_, '_>) -> Result<Command, CommandError> {
    let kind = match args.word("wait kind")? {
        "TIME" => WaitKind::Time,
        "DISTANCE" => WaitKind::Distance,
        "ANGLE" => WaitKind::Angle,
        "EVENT" => WaitKind::Event,
        other => return Err(unknown("wait kind", other)),
    };
    let magnitude = args.int("wait magnitude")?;
    Ok(Command::Wait { kind, magnitude })
}

fn parse_mode(args: &mut Cursor<'_, '_>) -> Result<Mode, CommandError> {
    match args.word("mode")? {
        "FULL" => Ok(Mode::Full),
        "SAFE" => Ok(Mode::Safe),
        "PASSIVE" => Ok(Mode::Passive),
        other => Err(unknown("mode", other)),
    }
}

fn join_bytes(values: impl Iterator<Item = u8>) -> String {
    values
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drive::Normal { velocity, radius } => write!(f, "NORMAL {velocity} {radius}"),
            Drive::Time {
                velocity,
                radius,
                millis,
            } => write!(f, "TIME {velocity} {radius} {millis}"),
            Drive::Distance {
                velocity,
                radius,
                millimetres,
            } => write!(f, "DISTANCE {velocity} {radius} {millimetres}"),
            Drive::Straight { velocity } => write!(f, "STRAIGHT NORMAL {velocity}"),
            Drive::StraightTime { velocity, millis } => {
                write!(f, "STRAIGHT TIME {velocity} {millis}")
            }
            Drive::StraightDistance {
                velocity,
                millimetres,
            } => write!(f, "STRAIGHT DISTANCE {velocity} {millimetres}"),
            Drive::Direct { left, right } => write!(f, "DIRECT {left} {right}"),
            Drive::Spin { velocity } => write!(f, "SPIN NORMAL {velocity}"),
            Drive::SpinTime { velocity, millis } => write!(f, "SPIN TIME {velocity} {millis}"),
            Drive::SpinAngle { velocity, degrees } => {
                write!(f, "SPIN ANGLE {velocity} {degrees}")
            }
            Drive::Stop => f.write_str("STOP"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Beep => f.write_str(BEEP),
            Command::Drive(drive) => write!(f, "{DRIVE} {drive}"),
            Command::Led(LedCommand::Switch { led, on }) => {
                write!(f, "{LED} {led} {}", if *on { "ON" } else { "OFF" })
            }
            Command::Led(LedCommand::PowerOff) => write!(f, "{LED} POWER OFF"),
            Command::Led(LedCommand::Power { color, intensity }) => {
                write!(f, "{LED} POWER {color} {intensity}")
            }
            Command::Led(LedCommand::Flash {
                led,
                count,
                duration_millis,
            }) => write!(f, "{LED} FLASH {led} {count} {duration_millis}"),
            Command::Song(SongCommand::Define { index, notes }) => write!(
                f,
                "{SONG} DEFINE {index} {} {}",
                join_bytes(notes.iter().map(|note| note.pitch)),
                join_bytes(notes.iter().map(|note| note.duration))
            ),
            Command::Song(SongCommand::Play { index }) => write!(f, "{SONG} PLAY {index}"),
            Command::Wait { kind, magnitude } => {
                write!(f, "{WAIT} {} {magnitude}", kind.keyword())
            }
            Command::Mode(mode) => write!(f, "{MODE} {mode}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient(line: &str) -> Result<Command, CommandError> {
        Command::parse(line, ArgPolicy::Lenient)
    }

    fn strict(line: &str) -> Result<Command, CommandError> {
        Command::parse(line, ArgPolicy::Strict)
    }

    #[test]
    fn test_tokens_split_on_any_whitespace() {
        let tokens = Tokens::split("  DRIVE\tNORMAL   100 0 ");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens.get(0), Some("DRIVE"));
        assert_eq!(tokens.get(3), Some("0"));
        assert_eq!(tokens.get(4), None);
        assert!(Tokens::split("   ").is_empty());
    }

    #[test]
    fn test_lenient_integer_matches_atoi() {
        assert_eq!(lenient_integer("250"), 250);
        assert_eq!(lenient_integer("-250"), -250);
        assert_eq!(lenient_integer("+7"), 7);
        assert_eq!(lenient_integer("12abc"), 12);
        assert_eq!(lenient_integer("abc"), 0);
        assert_eq!(lenient_integer("-"), 0);
        assert_eq!(lenient_integer(""), 0);
        assert_eq!(lenient_integer("99999999999"), i32::MAX);
        assert_eq!(lenient_integer("-99999999999"), i32::MIN);
    }

    #[test]
    fn test_strict_integer_rejects_garbage() {
        assert_eq!(ArgPolicy::Strict.integer("velocity", "-20"), Ok(-20));
        assert_eq!(
            ArgPolicy::Strict.integer("velocity", "12abc"),
            Err(CommandError::InvalidInteger {
                name: "velocity",
                token: "12abc".to_string()
            })
        );
        assert!(ArgPolicy::Strict.integer("velocity", "99999999999").is_err());
    }

    #[test]
    fn test_parse_beep_ignores_trailing_tokens() {
        assert_eq!(lenient("BEEP"), Ok(Command::Beep));
        assert_eq!(lenient("BEEP BEEP"), Ok(Command::Beep));
    }

    #[test]
    fn test_parse_empty_and_unknown() {
        assert_eq!(lenient(""), Err(CommandError::Empty));
        assert_eq!(lenient("  \t "), Err(CommandError::Empty));
        assert_eq!(
            lenient("FLY AWAY"),
            Err(CommandError::UnknownCommand("FLY".to_string()))
        );
        assert_eq!(
            lenient("beep"),
            Err(CommandError::UnknownCommand("beep".to_string()))
        );
    }

    #[test]
    fn test_parse_drive_modes() {
        assert_eq!(
            lenient("DRIVE NORMAL 200 -500"),
            Ok(Command::Drive(Drive::Normal {
                velocity: 200,
                radius: -500
            }))
        );
        assert_eq!(
            lenient("DRIVE TIME 200 0 1500"),
            Ok(Command::Drive(Drive::Time {
                velocity: 200,
                radius: 0,
                millis: 1500
            }))
        );
        assert_eq!(
            lenient("DRIVE DISTANCE -100 300 400"),
            Ok(Command::Drive(Drive::Distance {
                velocity: -100,
                radius: 300,
                millimetres: 400
            }))
        );
        assert_eq!(
            lenient("DRIVE DIRECT 100 -100"),
            Ok(Command::Drive(Drive::Direct {
                left: 100,
                right: -100
            }))
        );
        assert_eq!(lenient("DRIVE STOP"), Ok(Command::Drive(Drive::Stop)));
    }

    #[test]
    fn test_parse_drive_straight_and_spin() {
        assert_eq!(
            lenient("DRIVE STRAIGHT NORMAL 300"),
            Ok(Command::Drive(Drive::Straight { velocity: 300 }))
        );
        assert_eq!(
            lenient("DRIVE STRAIGHT TIME 300 2000"),
            Ok(Command::Drive(Drive::StraightTime {
                velocity: 300,
                millis: 2000
            }))
        );
        assert_eq!(
            lenient("DRIVE STRAIGHT DISTANCE 300 1000"),
            Ok(Command::Drive(Drive::StraightDistance {
                velocity: 300,
                millimetres: 1000
            }))
        );
        assert_eq!(
            lenient("DRIVE SPIN NORMAL -150"),
            Ok(Command::Drive(Drive::Spin { velocity: -150 }))
        );
        assert_eq!(
            lenient("DRIVE SPIN TIME 150 800"),
            Ok(Command::Drive(Drive::SpinTime {
                velocity: 150,
                millis: 800
            }))
        );
        assert_eq!(
            lenient("DRIVE SPIN ANGLE 150 90"),
            Ok(Command::Drive(Drive::SpinAngle {
                velocity: 150,
                degrees: 90
            }))
        );
    }

    #[test]
    fn test_parse_drive_missing_arguments() {
        assert_eq!(
            lenient("DRIVE"),
            Err(CommandError::MissingArgument("drive mode"))
        );
        assert_eq!(
            lenient("DRIVE NORMAL 100"),
            Err(CommandError::MissingArgument("radius"))
        );
        assert_eq!(
            lenient("DRIVE TIME 100 0"),
            Err(CommandError::MissingArgument("time"))
        );
        assert_eq!(
            lenient("DRIVE STRAIGHT"),
            Err(CommandError::MissingArgument("straight mode"))
        );
        assert_eq!(
            lenient("DRIVE SPIN ANGLE 100"),
            Err(CommandError::MissingArgument("angle"))
        );
        assert_eq!(
            lenient("DRIVE DIRECT 100"),
            Err(CommandError::MissingArgument("right velocity"))
        );
    }

    #[test]
    fn test_parse_drive_unknown_mode() {
        assert_eq!(
            lenient("DRIVE SIDEWAYS 100"),
            Err(CommandError::UnknownKeyword {
                expected: "drive mode",
                token: "SIDEWAYS".to_string()
            })
        );
        assert!(lenient("DRIVE SPIN DISTANCE 100 10").is_err());
    }

    #[test]
    fn test_non_numeric_arguments_depend_on_policy() {
        // Lenient conversion keeps the historical atoi behaviour
        assert_eq!(
            lenient("DRIVE NORMAL fast 0"),
            Ok(Command::Drive(Drive::Normal {
                velocity: 0,
                radius: 0
            }))
        );
        assert_eq!(
            strict("DRIVE NORMAL fast 0"),
            Err(CommandError::InvalidInteger {
                name: "velocity",
                token: "fast".to_string()
            })
        );
    }

    #[test]
    fn test_parse_led_switch() {
        assert_eq!(
            lenient("LED ADVANCE ON"),
            Ok(Command::Led(LedCommand::Switch {
                led: LedTarget::Advance,
                on: true
            }))
        );
        assert_eq!(
            lenient("LED PLAY OFF"),
            Ok(Command::Led(LedCommand::Switch {
                led: LedTarget::Play,
                on: false
            }))
        );
        assert_eq!(
            lenient("LED PLAY DIM"),
            Err(CommandError::UnknownKeyword {
                expected: "LED state",
                token: "DIM".to_string()
            })
        );
        assert_eq!(
            lenient("LED ADVANCE"),
            Err(CommandError::MissingArgument("LED state"))
        );
    }

    #[test]
    fn test_parse_led_power() {
        assert_eq!(lenient("LED POWER OFF"), Ok(Command::Led(LedCommand::PowerOff)));
        assert_eq!(
            lenient("LED POWER 255 128"),
            Ok(Command::Led(LedCommand::Power {
                color: 255,
                intensity: 128
            }))
        );
        assert_eq!(
            lenient("LED POWER"),
            Err(CommandError::MissingArgument("colour"))
        );
        assert_eq!(
            lenient("LED POWER 255"),
            Err(CommandError::MissingArgument("intensity"))
        );
    }

    #[test]
    fn test_parse_led_flash() {
        assert_eq!(
            lenient("LED FLASH PLAY 5 500"),
            Ok(Command::Led(LedCommand::Flash {
                led: LedTarget::Play,
                count: 5,
                duration_millis: 500
            }))
        );
        assert_eq!(
            lenient("LED FLASH TAIL 5 500"),
            Err(CommandError::UnknownKeyword {
                expected: "LED",
                token: "TAIL".to_string()
            })
        );
        assert_eq!(
            lenient("LED FLASH POWER 5"),
            Err(CommandError::MissingArgument("flash duration"))
        );
    }

    #[test]
    fn test_parse_song_define() {
        assert_eq!(
            lenient("SONG DEFINE 2 60,64,67 16,16,32"),
            Ok(Command::Song(SongCommand::Define {
                index: 2,
                notes: vec![
                    Note {
                        pitch: 60,
                        duration: 16
                    },
                    Note {
                        pitch: 64,
                        duration: 16
                    },
                    Note {
                        pitch: 67,
                        duration: 32
                    },
                ],
            }))
        );
    }

    #[test]
    fn test_parse_song_define_errors() {
        assert_eq!(
            lenient("SONG DEFINE 2 60,64 16"),
            Err(CommandError::SongLengthMismatch {
                notes: 2,
                durations: 1
            })
        );
        assert_eq!(
            lenient("SONG DEFINE 2 60,64"),
            Err(CommandError::MissingArgument("durations"))
        );
        assert_eq!(
            lenient("SONG DEFINE 2 300 16"),
            Err(CommandError::ByteOutOfRange {
                name: "notes",
                value: 300
            })
        );
        assert!(strict("SONG DEFINE 2 60,,64 16,16,16").is_err());
    }

    #[test]
    fn test_parse_song_play() {
        assert_eq!(
            lenient("SONG PLAY 3"),
            Ok(Command::Song(SongCommand::Play { index: 3 }))
        );
        assert_eq!(
            lenient("SONG PLAY"),
            Err(CommandError::MissingArgument("song index"))
        );
        assert!(lenient("SONG REWIND 3").is_err());
    }

    #[test]
    fn test_parse_wait() {
        assert_eq!(
            lenient("WAIT TIME 1500"),
            Ok(Command::Wait {
                kind: WaitKind::Time,
                magnitude: 1500
            })
        );
        assert_eq!(
            lenient("WAIT EVENT 4"),
            Ok(Command::Wait {
                kind: WaitKind::Event,
                magnitude: 4
            })
        );
        assert_eq!(
            lenient("WAIT ANGLE"),
            Err(CommandError::MissingArgument("wait magnitude"))
        );
        assert!(lenient("WAIT FOREVER 1").is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(lenient("MODE FULL"), Ok(Command::Mode(Mode::Full)));
        assert_eq!(lenient("MODE SAFE"), Ok(Command::Mode(Mode::Safe)));
        assert_eq!(lenient("MODE PASSIVE"), Ok(Command::Mode(Mode::Passive)));
        assert_eq!(
            lenient("MODE TURBO"),
            Err(CommandError::UnknownKeyword {
                expected: "mode",
                token: "TURBO".to_string()
            })
        );
        assert_eq!(lenient("MODE"), Err(CommandError::MissingArgument("mode")));
    }

    #[test]
    fn test_display_renders_wire_form() {
        let lines = [
            "BEEP",
            "DRIVE STRAIGHT DISTANCE 300 1000",
            "DRIVE SPIN ANGLE -150 90",
            "LED POWER OFF",
            "LED FLASH ADVANCE 3 250",
            "SONG DEFINE 0 60,62 8,8",
            "WAIT DISTANCE 500",
            "MODE SAFE",
        ];
        for line in lines {
            let command: Command = line.parse().unwrap();
            assert_eq!(command.to_string(), line);
        }
    }

    #[test]
    fn test_family() {
        assert_eq!(Command::Beep.family(), "BEEP");
        assert_eq!(Command::Mode(Mode::Full).family(), "MODE");
        assert_eq!(
            lenient("WAIT TIME 1").map(|command| command.family()),
            Ok("WAIT")
        );
    }

    #[test]
    fn test_command_error_display() {
        assert_eq!(
            CommandError::MissingArgument("radius").to_string(),
            "Missing argument: radius"
        );
        assert_eq!(
            CommandError::UnknownCommand("FLY".to_string()).to_string(),
            "Unknown command: FLY"
        );
    }
}
