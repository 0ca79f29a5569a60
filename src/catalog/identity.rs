use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::ops::RangeInclusive;

/// Proficiency levels shared by skills, roles and the level definitions.
pub const LEVELS: RangeInclusive<u8> = 1..=7;

/// Stable skill code (e.g. `ARCH`), shared by the CSV `Code` column and role references.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(pub String);

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub String);

/// Identifier of a progression track; also the key of the role block for that track.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathwayId(pub String);

/// Category identifier derived from a category display name.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    /// Id used for rows whose category name is blank. No category entry is
    /// ever created for it, so such skills surface as a validation warning.
    pub const UNKNOWN: &'static str = "UNKNOWN";

    /// Derive an id from a display name: uppercase, runs of anything outside
    /// `[A-Z0-9]` collapse to one `_`, and edge underscores are dropped.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Self(Self::UNKNOWN.to_string());
        }

        let mut id = String::with_capacity(trimmed.len());
        let mut pending_separator = false;
        for ch in trimmed.to_uppercase().chars() {
            if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
                if pending_separator && !id.is_empty() {
                    id.push('_');
                }
                pending_separator = false;
                id.push(ch);
            } else {
                pending_separator = true;
            }
        }
        if id.is_empty() {
            return Self(Self::UNKNOWN.to_string());
        }
        Self(id)
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PathwayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A level number as it arrived from a source, coerced to an integer when possible.
///
/// File and database backends disagree on types (`3`, `"3"`, `3.0`), so every
/// level-like value passes through here once. Values that cannot be read as a
/// whole number keep their original JSON so validation can quote them.
#[derive(Clone, Debug, PartialEq)]
pub enum LevelValue {
    Number(i64),
    Invalid(Value),
}

impl LevelValue {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(number) => {
                if let Some(n) = number.as_i64() {
                    return LevelValue::Number(n);
                }
                match number.as_f64() {
                    Some(f) if f.is_finite() && f.fract() == 0.0 => LevelValue::Number(f as i64),
                    _ => LevelValue::Invalid(value.clone()),
                }
            }
            Value::String(raw) => {
                let trimmed = raw.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    return LevelValue::Number(n);
                }
                match trimmed.parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => LevelValue::Number(f as i64),
                    _ => LevelValue::Invalid(value.clone()),
                }
            }
            other => LevelValue::Invalid(other.clone()),
        }
    }

    /// The level when it is a whole number inside `LEVELS`.
    pub fn in_range(&self) -> Option<u8> {
        match self {
            LevelValue::Number(n) => u8::try_from(*n).ok().filter(|lvl| LEVELS.contains(lvl)),
            LevelValue::Invalid(_) => None,
        }
    }
}

impl From<i64> for LevelValue {
    fn from(value: i64) -> Self {
        LevelValue::Number(value)
    }
}

impl fmt::Display for LevelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelValue::Number(n) => write!(f, "{n}"),
            LevelValue::Invalid(Value::String(raw)) => f.write_str(raw),
            LevelValue::Invalid(other) => write!(f, "{other}"),
        }
    }
}

impl Serialize for LevelValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            LevelValue::Number(n) => serializer.serialize_i64(*n),
            LevelValue::Invalid(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LevelValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Parse a level id taken from a lookup key (`"3"`, `"03"`) into a level in `LEVELS`.
pub fn parse_level_id(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|level| LEVELS.contains(level))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn category_id_collapses_separators() {
        assert_eq!(CategoryId::from_name("Business Change").0, "BUSINESS_CHANGE");
        assert_eq!(
            CategoryId::from_name("  Strategy & architecture ").0,
            "STRATEGY_ARCHITECTURE"
        );
        assert_eq!(CategoryId::from_name("--Data/AI--").0, "DATA_AI");
        assert_eq!(CategoryId::from_name("   ").0, CategoryId::UNKNOWN);
        assert_eq!(CategoryId::from_name("&&").0, CategoryId::UNKNOWN);
    }

    #[test]
    fn level_value_coerces_strings_and_whole_floats() {
        assert_eq!(LevelValue::from_value(&json!(4)), LevelValue::Number(4));
        assert_eq!(LevelValue::from_value(&json!("5")), LevelValue::Number(5));
        assert_eq!(LevelValue::from_value(&json!(" 2 ")), LevelValue::Number(2));
        assert_eq!(LevelValue::from_value(&json!(3.0)), LevelValue::Number(3));
        assert_eq!(
            LevelValue::from_value(&json!(2.5)),
            LevelValue::Invalid(json!(2.5))
        );
        assert_eq!(
            LevelValue::from_value(&json!("expert")),
            LevelValue::Invalid(json!("expert"))
        );
        assert_eq!(
            LevelValue::from_value(&Value::Null),
            LevelValue::Invalid(Value::Null)
        );
    }

    #[test]
    fn level_value_range_check() {
        assert_eq!(LevelValue::Number(1).in_range(), Some(1));
        assert_eq!(LevelValue::Number(7).in_range(), Some(7));
        assert_eq!(LevelValue::Number(0).in_range(), None);
        assert_eq!(LevelValue::Number(8).in_range(), None);
        assert_eq!(LevelValue::Number(-3).in_range(), None);
        assert_eq!(LevelValue::Invalid(json!("x")).in_range(), None);
    }

    #[test]
    fn level_value_serializes_number_or_original() {
        assert_eq!(serde_json::to_value(LevelValue::Number(3)).unwrap(), json!(3));
        assert_eq!(
            serde_json::to_value(LevelValue::Invalid(json!("high"))).unwrap(),
            json!("high")
        );
        assert_eq!(LevelValue::Invalid(json!("high")).to_string(), "high");
        assert_eq!(LevelValue::Invalid(json!(2.5)).to_string(), "2.5");
    }

    #[test]
    fn parse_level_id_rejects_out_of_range() {
        assert_eq!(parse_level_id("3"), Some(3));
        assert_eq!(parse_level_id("07"), Some(7));
        assert_eq!(parse_level_id("0"), None);
        assert_eq!(parse_level_id("8"), None);
        assert_eq!(parse_level_id("two"), None);
    }
}
