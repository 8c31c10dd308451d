use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Age band a child belongs to. Features that vary by age treat a missing
/// band as "not yet configured".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "8-10")]
    EightToTen,
    #[serde(rename = "10-12")]
    TenToTwelve,
    #[serde(rename = "13-15")]
    ThirteenToFifteen,
    #[serde(rename = "15+")]
    FifteenPlus,
}

impl AgeGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::EightToTen => "8-10",
            AgeGroup::TenToTwelve => "10-12",
            AgeGroup::ThirteenToFifteen => "13-15",
            AgeGroup::FifteenPlus => "15+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown age group: {0}")]
pub struct ParseAgeGroupError(String);

impl FromStr for AgeGroup {
    type Err = ParseAgeGroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "8-10" => Ok(AgeGroup::EightToTen),
            "10-12" => Ok(AgeGroup::TenToTwelve),
            "13-15" => Ok(AgeGroup::ThirteenToFifteen),
            "15+" => Ok(AgeGroup::FifteenPlus),
            other => Err(ParseAgeGroupError(other.to_string())),
        }
    }
}

/// A gated application feature. Parents toggle these per child; the server
/// resolves them through the access settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Tutors,
    HabitTracker,
    Journal,
    Tasks,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Tutors => "tutors",
            Feature::HabitTracker => "habit_tracker",
            Feature::Journal => "journal",
            Feature::Tasks => "tasks",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_group_wire_names_round_trip() {
        for (group, wire) in [
            (AgeGroup::EightToTen, "\"8-10\""),
            (AgeGroup::TenToTwelve, "\"10-12\""),
            (AgeGroup::ThirteenToFifteen, "\"13-15\""),
            (AgeGroup::FifteenPlus, "\"15+\""),
        ] {
            assert_eq!(serde_json::to_string(&group).unwrap(), wire);
            let parsed: AgeGroup = serde_json::from_str(wire).unwrap();
            assert_eq!(parsed, group);
            assert_eq!(group.as_str().parse::<AgeGroup>().unwrap(), group);
        }
    }

    #[test]
    fn unknown_age_group_is_rejected() {
        assert!("5-7".parse::<AgeGroup>().is_err());
    }
}
