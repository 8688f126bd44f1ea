use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;

use crate::util::error::{ControlError, Result};

/// Highest area number the controller knows about.
pub const MAX_NO_AREAS: u8 = 29;
/// Highest device-native intensity step.
pub const MAX_INTENSITY: u8 = 10;

/// A validated area number in `1..=MAX_NO_AREAS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Area(u8);

impl Area {
    pub fn new(area: u8) -> Result<Self> {
        if (1..=MAX_NO_AREAS).contains(&area) {
            Ok(Area(area))
        } else {
            Err(ControlError::InvalidArea {
                area,
                max: MAX_NO_AREAS,
            })
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated intensity step in `1..=MAX_INTENSITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Intensity(u8);

impl Intensity {
    pub fn new(intensity: u8) -> Result<Self> {
        if (1..=MAX_INTENSITY).contains(&intensity) {
            Ok(Intensity(intensity))
        } else {
            Err(ControlError::InvalidIntensity {
                intensity,
                max: MAX_INTENSITY,
            })
        }
    }

    /// Maps a brightness percentage (0..=100) onto intensity steps by
    /// truncating division by ten. Anything below 10% has no step and fails.
    pub fn from_brightness(percent: u8) -> Result<Self> {
        Intensity::new(percent / 10)
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One command in the controller's text line protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightingCommand {
    All { on: bool },
    Area { area: Area, on: bool },
    Intensity { area: Area, intensity: Intensity },
}

impl LightingCommand {
    /// The bytes put on the wire: the protocol text plus a CRLF terminator.
    pub fn to_datagram(&self) -> Vec<u8> {
        format!("{}\r\n", self).into_bytes()
    }
}

impl fmt::Display for LightingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightingCommand::All { on } => write!(f, "all_{}", on_off(*on)),
            LightingCommand::Area { area, on } => write!(f, "area_{} {}", on_off(*on), area),
            LightingCommand::Intensity { area, intensity } => {
                write!(f, "inten_{}_{}", area, intensity)
            }
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

/// Failure to read a [`LightingCommand`] from text.
#[derive(Debug, thiserror::Error)]
pub enum ParseCommandError {
    #[error("unrecognised command: {0:?}")]
    Unknown(String),
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),
    #[error(transparent)]
    Invalid(#[from] ControlError),
}

fn parse_number(s: &str) -> std::result::Result<u8, ParseCommandError> {
    s.parse::<u8>()
        .map_err(|_| ParseCommandError::InvalidNumber(s.to_string()))
}

fn parse_power(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

/// Accepts the protocol text (`all_on`, `area_off 3`, `inten_5_7`) as well as
/// the spelled-out forms `all on`, `area 3 off` and `intensity 5 7`.
/// `area 0 on|off` addresses every area and becomes [`LightingCommand::All`].
impl FromStr for LightingCommand {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let unknown = || ParseCommandError::Unknown(s.to_string());
        let words: Vec<&str> = s.split_whitespace().collect();

        match words.as_slice() {
            ["all_on"] => Ok(LightingCommand::All { on: true }),
            ["all_off"] => Ok(LightingCommand::All { on: false }),
            ["all", power] => {
                let on = parse_power(power).ok_or_else(unknown)?;
                Ok(LightingCommand::All { on })
            }
            ["area_on", area] | ["area_off", area] => {
                let area = Area::new(parse_number(area)?)?;
                Ok(LightingCommand::Area {
                    area,
                    on: words[0] == "area_on",
                })
            }
            ["area", area, power] => {
                let on = parse_power(power).ok_or_else(unknown)?;
                match parse_number(area)? {
                    0 => Ok(LightingCommand::All { on }),
                    number => Ok(LightingCommand::Area {
                        area: Area::new(number)?,
                        on,
                    }),
                }
            }
            ["intensity", area, intensity] => Ok(LightingCommand::Intensity {
                area: Area::new(parse_number(area)?)?,
                intensity: Intensity::new(parse_number(intensity)?)?,
            }),
            [word] => {
                let rest = word.strip_prefix("inten_").ok_or_else(unknown)?;
                let mut parts = rest.split('_');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(area), Some(intensity), None) => Ok(LightingCommand::Intensity {
                        area: Area::new(parse_number(area)?)?,
                        intensity: Intensity::new(parse_number(intensity)?)?,
                    }),
                    _ => Err(unknown()),
                }
            }
            _ => Err(unknown()),
        }
    }
}

/// Power state as taken on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CliPowerState {
    On,
    Off,
}

impl From<CliPowerState> for bool {
    fn from(state: CliPowerState) -> Self {
        state == CliPowerState::On
    }
}
