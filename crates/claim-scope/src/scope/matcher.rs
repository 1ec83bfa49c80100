use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::catalog::{LineItemRule, ScopeCatalog};
use super::domain::{DamageSeverity, DamageType, Surface, WaterCategory, WaterClass, Zone, ZoneType};

/// A single predicate over a zone; rule conditions are a conjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchCondition {
    ZoneType { values: Vec<ZoneType> },
    DamageType { values: Vec<DamageType> },
    SeverityAtLeast { severity: DamageSeverity },
    SeverityAtMost { severity: DamageSeverity },
    WaterCategory { min: WaterCategory, max: WaterCategory },
    WaterClass { min: WaterClass, max: WaterClass },
    SurfacesAny { surfaces: Vec<Surface> },
    SurfacesAll { surfaces: Vec<Surface> },
}

impl MatchCondition {
    /// Conditions on an attribute the zone does not record never hold.
    pub fn holds(&self, zone: &Zone) -> bool {
        match self {
            Self::ZoneType { values } => values.contains(&zone.zone_type),
            Self::DamageType { values } => zone
                .damage_type
                .is_some_and(|damage| values.contains(&damage)),
            Self::SeverityAtLeast { severity } => zone
                .damage_severity
                .is_some_and(|actual| actual >= *severity),
            Self::SeverityAtMost { severity } => zone
                .damage_severity
                .is_some_and(|actual| actual <= *severity),
            Self::WaterCategory { min, max } => zone
                .water_category
                .is_some_and(|category| (*min..=*max).contains(&category)),
            Self::WaterClass { min, max } => zone
                .water_class
                .is_some_and(|class| (*min..=*max).contains(&class)),
            Self::SurfacesAny { surfaces } => surfaces
                .iter()
                .any(|surface| zone.affected_surfaces.contains(surface)),
            Self::SurfacesAll { surfaces } => surfaces
                .iter()
                .all(|surface| zone.affected_surfaces.contains(surface)),
        }
    }

    /// Structural checks applied when a catalog is compiled.
    pub(crate) fn check(&self) -> Result<(), String> {
        let empty = match self {
            Self::ZoneType { values } => values.is_empty(),
            Self::DamageType { values } => values.is_empty(),
            Self::SurfacesAny { surfaces } | Self::SurfacesAll { surfaces } => surfaces.is_empty(),
            Self::WaterCategory { min, max } if min > max => {
                return Err(format!("range {}-{} is inverted", min.value(), max.value()));
            }
            Self::WaterClass { min, max } if min > max => {
                return Err(format!("range {}-{} is inverted", min.value(), max.value()));
            }
            _ => false,
        };
        if empty {
            Err("lists no values".to_string())
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZoneType { values } => {
                write!(f, "zone={}", join(values.iter().map(|v| v.label()), "|"))
            }
            Self::DamageType { values } => {
                write!(f, "damage={}", join(values.iter().map(|v| v.label()), "|"))
            }
            Self::SeverityAtLeast { severity } => {
                write!(f, "severity>={}", severity.label().to_ascii_lowercase())
            }
            Self::SeverityAtMost { severity } => {
                write!(f, "severity<={}", severity.label().to_ascii_lowercase())
            }
            Self::WaterCategory { min, max } => {
                write_range(f, "category", min.value(), max.value())
            }
            Self::WaterClass { min, max } => write_range(f, "class", min.value(), max.value()),
            Self::SurfacesAny { surfaces } => {
                write!(f, "surface={}", join(surfaces.iter().map(|s| s.label()), "|"))
            }
            Self::SurfacesAll { surfaces } => {
                write!(f, "surfaces={}", join(surfaces.iter().map(|s| s.label()), "&"))
            }
        }
    }
}

fn join<'a>(labels: impl Iterator<Item = &'a str>, separator: &str) -> String {
    labels
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(separator)
}

fn write_range(f: &mut fmt::Formatter<'_>, key: &str, min: u8, max: u8) -> fmt::Result {
    if min == max {
        write!(f, "{key}={min}")
    } else {
        write!(f, "{key}={min}-{max}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid condition '{condition}': {reason}")]
pub struct ConditionParseError {
    pub condition: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    AtLeast,
    AtMost,
}

impl FromStr for MatchCondition {
    type Err = ConditionParseError;

    /// Parses the compact spreadsheet syntax, e.g. `damage=water|fire` or `category>=2`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| ConditionParseError {
            condition: text.trim().to_string(),
            reason,
        };

        let (key, comparison, value) = split_condition(text).ok_or_else(|| {
            fail("expected <key>=<value>, <key>>=<value> or <key><=<value>".to_string())
        })?;

        match (key.as_str(), comparison) {
            ("zone", Comparison::Eq) => Ok(Self::ZoneType {
                values: parse_list(value, '|', ZoneType::parse, "zone type").map_err(fail)?,
            }),
            ("damage", Comparison::Eq) => Ok(Self::DamageType {
                values: parse_list(value, '|', DamageType::parse, "damage type").map_err(fail)?,
            }),
            ("severity", Comparison::AtLeast) => Ok(Self::SeverityAtLeast {
                severity: parse_severity(value).map_err(fail)?,
            }),
            ("severity", Comparison::AtMost) => Ok(Self::SeverityAtMost {
                severity: parse_severity(value).map_err(fail)?,
            }),
            ("category", comparison) => {
                let (min, max) =
                    parse_range(value, comparison, WaterCategory::MIN, WaterCategory::MAX)
                        .map_err(fail)?;
                Ok(Self::WaterCategory {
                    min: WaterCategory::new(min).map_err(|err| fail(err.to_string()))?,
                    max: WaterCategory::new(max).map_err(|err| fail(err.to_string()))?,
                })
            }
            ("class", comparison) => {
                let (min, max) = parse_range(value, comparison, WaterClass::MIN, WaterClass::MAX)
                    .map_err(fail)?;
                Ok(Self::WaterClass {
                    min: WaterClass::new(min).map_err(|err| fail(err.to_string()))?,
                    max: WaterClass::new(max).map_err(|err| fail(err.to_string()))?,
                })
            }
            ("surface", Comparison::Eq) => Ok(Self::SurfacesAny {
                surfaces: parse_list(value, '|', Surface::parse, "surface").map_err(fail)?,
            }),
            ("surfaces", Comparison::Eq) => Ok(Self::SurfacesAll {
                surfaces: parse_list(value, '&', Surface::parse, "surface").map_err(fail)?,
            }),
            (key, _) => Err(fail(format!("unsupported key or comparison for '{key}'"))),
        }
    }
}

fn split_condition(text: &str) -> Option<(String, Comparison, &str)> {
    let text = text.trim();
    let (position, comparison, width) = if let Some(position) = text.find(">=") {
        (position, Comparison::AtLeast, 2)
    } else if let Some(position) = text.find("<=") {
        (position, Comparison::AtMost, 2)
    } else {
        (text.find('=')?, Comparison::Eq, 1)
    };

    let key = text[..position].trim().to_ascii_lowercase();
    let value = text[position + width..].trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key, comparison, value))
}

fn parse_list<T>(
    value: &str,
    separator: char,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> Result<Vec<T>, String> {
    value
        .split(separator)
        .map(|part| parse(part).ok_or_else(|| format!("unknown {what} '{}'", part.trim())))
        .collect()
}

fn parse_severity(value: &str) -> Result<DamageSeverity, String> {
    DamageSeverity::parse(value).ok_or_else(|| format!("unknown severity '{value}'"))
}

fn parse_range(value: &str, comparison: Comparison, lowest: u8, highest: u8) -> Result<(u8, u8), String> {
    let number = |text: &str| {
        text.trim()
            .parse::<u8>()
            .map_err(|_| format!("'{}' is not a whole number", text.trim()))
    };

    match comparison {
        Comparison::AtLeast => Ok((number(value)?, highest)),
        Comparison::AtMost => Ok((lowest, number(value)?)),
        Comparison::Eq => match value.split_once('-') {
            Some((min, max)) => {
                let (min, max) = (number(min)?, number(max)?);
                if min > max {
                    return Err(format!("range {min}-{max} is inverted"));
                }
                Ok((min, max))
            }
            None => {
                let exact = number(value)?;
                Ok((exact, exact))
            }
        },
    }
}

/// Rules whose conditions all hold for the zone, highest priority first.
///
/// Auto-add-only rules are never returned. Rules sharing a priority keep
/// their catalog declaration order.
pub fn match_rules<'c>(zone: &Zone, catalog: &'c ScopeCatalog) -> Vec<&'c LineItemRule> {
    let mut candidates: Vec<&LineItemRule> = catalog
        .rules()
        .iter()
        .filter(|rule| !rule.auto_add_only)
        .filter(|rule| rule.conditions.iter().all(|condition| condition.holds(zone)))
        .collect();
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
    candidates
}
