//! Permission modes and bit masks.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use quizgate_core::DomainError;

/// Access mode checked against an ACL.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Read,
    Write,
    Share,
    Administration,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Read, Mode::Write, Mode::Share, Mode::Administration];

    pub const fn mask(self) -> u32 {
        match self {
            Mode::Read => 1,
            Mode::Write => 2,
            Mode::Share => 4,
            Mode::Administration => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Read => "read",
            Mode::Write => "write",
            Mode::Share => "share",
            Mode::Administration => "administration",
        }
    }

    /// Parse a mode name or its one-letter abbreviation, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "r" | "read" => Ok(Mode::Read),
            "w" | "write" => Ok(Mode::Write),
            "s" | "share" => Ok(Mode::Share),
            "a" | "administration" => Ok(Mode::Administration),
            other => Err(DomainError::validation(format!("unknown permission mode '{other}'"))),
        }
    }
}

impl core::fmt::Display for Mode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Set of modes held on one resource.
///
/// A mask grants a mode iff every bit of the mode is set.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionMask(u32);

impl PermissionMask {
    pub const EMPTY: PermissionMask = PermissionMask(0);
    pub const ALL: PermissionMask = PermissionMask(1 | 2 | 4 | 16);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn of(modes: &[Mode]) -> Self {
        modes.iter().fold(Self::EMPTY, |acc, m| acc.with(*m))
    }

    pub const fn with(self, mode: Mode) -> Self {
        Self(self.0 | mode.mask())
    }

    pub const fn union(self, other: PermissionMask) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn grants(self, mode: Mode) -> bool {
        self.0 & mode.mask() == mode.mask()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn modes(self) -> impl Iterator<Item = Mode> {
        Mode::ALL.into_iter().filter(move |m| self.grants(*m))
    }
}

impl From<Mode> for PermissionMask {
    fn from(mode: Mode) -> Self {
        Self(mode.mask())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_names_and_abbreviations() {
        assert_eq!(Mode::parse("r").unwrap(), Mode::Read);
        assert_eq!(Mode::parse("WRITE").unwrap(), Mode::Write);
        assert_eq!("s".parse::<Mode>().unwrap(), Mode::Share);
        assert_eq!(Mode::parse(" Administration ").unwrap(), Mode::Administration);
        assert!(Mode::parse("delete").is_err());
    }

    #[test]
    fn mask_grants_only_held_bits() {
        let mask = PermissionMask::of(&[Mode::Read, Mode::Share]);

        assert!(mask.grants(Mode::Read));
        assert!(mask.grants(Mode::Share));
        assert!(!mask.grants(Mode::Write));
        assert!(!mask.grants(Mode::Administration));
        assert_eq!(mask.bits(), 5);
    }

    #[test]
    fn all_grants_every_mode() {
        assert!(Mode::ALL.iter().all(|m| PermissionMask::ALL.grants(*m)));
        assert_eq!(PermissionMask::ALL.modes().count(), 4);
        assert!(PermissionMask::EMPTY.is_empty());
    }
}
