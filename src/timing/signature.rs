// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Time signature catalog and sound selection.

use std::fmt;
use std::str::FromStr;

use super::TimingError;

/// Supported time signatures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeSignature {
    TwoFour,
    #[default]
    ThreeFour,
    FourFour,
    SixEight,
    NineEight,
    TwelveEight,
}

impl TimeSignature {
    /// Every signature, in display order
    pub const ALL: [TimeSignature; 6] = [
        TimeSignature::TwoFour,
        TimeSignature::ThreeFour,
        TimeSignature::FourFour,
        TimeSignature::SixEight,
        TimeSignature::NineEight,
        TimeSignature::TwelveEight,
    ];

    /// Pulses counted per bar. Compound meters pulse on the dotted beat.
    pub fn pulses_per_bar(self) -> u32 {
        match self {
            TimeSignature::TwoFour | TimeSignature::SixEight => 2,
            TimeSignature::ThreeFour | TimeSignature::NineEight => 3,
            TimeSignature::FourFour | TimeSignature::TwelveEight => 4,
        }
    }

    /// Identifier used by the UI and the preference store
    pub fn as_str(self) -> &'static str {
        match self {
            TimeSignature::TwoFour => "2/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::FourFour => "4/4",
            TimeSignature::SixEight => "6/8",
            TimeSignature::NineEight => "9/8",
            TimeSignature::TwelveEight => "12/8",
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSignature {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSignature::ALL
            .into_iter()
            .find(|sig| sig.as_str() == s.trim())
            .ok_or_else(|| TimingError::UnknownSignature(s.to_string()))
    }
}

/// Which synthesis routine the audio port uses for a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoundKind {
    #[default]
    Click,
    Wood,
    HiHat,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [SoundKind::Click, SoundKind::Wood, SoundKind::HiHat];

    pub fn as_str(self) -> &'static str {
        match self {
            SoundKind::Click => "click",
            SoundKind::Wood => "wood",
            SoundKind::HiHat => "hihat",
        }
    }
}

impl fmt::Display for SoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SoundKind {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| TimingError::UnknownSound(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulses_per_bar() {
        let pulses: Vec<u32> = TimeSignature::ALL.iter().map(|s| s.pulses_per_bar()).collect();
        assert_eq!(pulses, vec![2, 3, 4, 2, 3, 4]);
    }

    #[test]
    fn test_parse_signature() {
        assert_eq!("6/8".parse::<TimeSignature>().unwrap(), TimeSignature::SixEight);
        assert_eq!("12/8".parse::<TimeSignature>().unwrap(), TimeSignature::TwelveEight);
        assert!("5/4".parse::<TimeSignature>().is_err());
        assert!("".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_signature_identifiers_round_trip() {
        for sig in TimeSignature::ALL {
            assert_eq!(sig.to_string().parse::<TimeSignature>().unwrap(), sig);
        }
    }

    #[test]
    fn test_default_signature() {
        assert_eq!(TimeSignature::default(), TimeSignature::ThreeFour);
    }

    #[test]
    fn test_parse_sound() {
        assert_eq!("wood".parse::<SoundKind>().unwrap(), SoundKind::Wood);
        assert_eq!("hihat".parse::<SoundKind>().unwrap(), SoundKind::HiHat);
        assert!("cowbell".parse::<SoundKind>().is_err());
        assert_eq!(SoundKind::default(), SoundKind::Click);
    }
}
