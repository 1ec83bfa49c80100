use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::metrics::{compute_zone_metrics, ZoneMetrics};

/// Stable identifier of an inspected zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub String);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    #[default]
    Room,
    Roof,
    Other,
}

impl ZoneType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Room => "Room",
            Self::Roof => "Roof",
            Self::Other => "Other",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "room" => Some(Self::Room),
            "roof" => Some(Self::Roof),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Water,
    Fire,
    Smoke,
    Mold,
    Wind,
    Hail,
    Impact,
    Other,
}

impl DamageType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Water => "Water",
            Self::Fire => "Fire",
            Self::Smoke => "Smoke",
            Self::Mold => "Mold",
            Self::Wind => "Wind",
            Self::Hail => "Hail",
            Self::Impact => "Impact",
            Self::Other => "Other",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "water" => Some(Self::Water),
            "fire" => Some(Self::Fire),
            "smoke" => Some(Self::Smoke),
            "mold" => Some(Self::Mold),
            "wind" => Some(Self::Wind),
            "hail" => Some(Self::Hail),
            "impact" => Some(Self::Impact),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Ordinal damage severity; comparisons follow declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageSeverity {
    Minor,
    Moderate,
    Severe,
}

impl DamageSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Minor => "Minor",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "severe" => Some(Self::Severe),
            _ => None,
        }
    }
}

/// IICRC water contamination category (1 clean, 2 grey, 3 black).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WaterCategory(u8);

impl WaterCategory {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 3;

    pub fn new(value: u8) -> Result<Self, RatingOutOfRange> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingOutOfRange {
                rating: "water category",
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for WaterCategory {
    type Error = RatingOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WaterCategory> for u8 {
    fn from(value: WaterCategory) -> Self {
        value.0
    }
}

/// IICRC water class (1 least to 4 most material saturation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WaterClass(u8);

impl WaterClass {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Result<Self, RatingOutOfRange> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RatingOutOfRange {
                rating: "water class",
                value,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for WaterClass {
    type Error = RatingOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WaterClass> for u8 {
    fn from(value: WaterClass) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{rating} {value} outside {min}..={max}")]
pub struct RatingOutOfRange {
    pub rating: &'static str,
    pub value: u8,
    pub min: u8,
    pub max: u8,
}

/// Building surfaces an adjuster can mark as affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Floor,
    Wall,
    Ceiling,
    Baseboard,
    Cabinet,
    Countertop,
    Insulation,
    Trim,
    Door,
    Window,
    Roof,
    Gutter,
}

impl Surface {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Floor => "Floor",
            Self::Wall => "Wall",
            Self::Ceiling => "Ceiling",
            Self::Baseboard => "Baseboard",
            Self::Cabinet => "Cabinet",
            Self::Countertop => "Countertop",
            Self::Insulation => "Insulation",
            Self::Trim => "Trim",
            Self::Door => "Door",
            Self::Window => "Window",
            Self::Roof => "Roof",
            Self::Gutter => "Gutter",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "floor" => Some(Self::Floor),
            "wall" => Some(Self::Wall),
            "ceiling" => Some(Self::Ceiling),
            "baseboard" => Some(Self::Baseboard),
            "cabinet" => Some(Self::Cabinet),
            "countertop" => Some(Self::Countertop),
            "insulation" => Some(Self::Insulation),
            "trim" => Some(Self::Trim),
            "door" => Some(Self::Door),
            "window" => Some(Self::Window),
            "roof" => Some(Self::Roof),
            "gutter" => Some(Self::Gutter),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningKind {
    Door,
    Window,
    Other,
}

/// A door or window cut into the walls of a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opening {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OpeningKind>,
    pub width_ft: f64,
    pub height_ft: f64,
    #[serde(default = "default_opening_quantity")]
    pub quantity: u32,
}

fn default_opening_quantity() -> u32 {
    1
}

impl Opening {
    pub fn new(width_ft: f64, height_ft: f64, quantity: u32) -> Self {
        Self {
            kind: None,
            width_ft,
            height_ft,
            quantity,
        }
    }

    pub fn area(&self) -> f64 {
        self.width_ft * self.height_ft * f64::from(self.quantity)
    }
}

/// Closet, bay, or cut-out geometry added to or removed from the parent footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subroom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub length_ft: f64,
    pub width_ft: f64,
    #[serde(default)]
    pub is_addition: bool,
}

impl Subroom {
    pub fn signed_area(&self) -> f64 {
        let area = self.length_ft * self.width_ft;
        if self.is_addition {
            area
        } else {
            -area
        }
    }
}

/// An inspected area together with its geometry and damage characterization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub id: ZoneId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub zone_type: ZoneType,
    #[serde(default)]
    pub length_ft: Option<f64>,
    #[serde(default)]
    pub width_ft: Option<f64>,
    #[serde(default)]
    pub height_ft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<String>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    #[serde(default)]
    pub damage_severity: Option<DamageSeverity>,
    #[serde(default)]
    pub water_category: Option<WaterCategory>,
    #[serde(default)]
    pub water_class: Option<WaterClass>,
    #[serde(default)]
    pub affected_surfaces: BTreeSet<Surface>,
    #[serde(default)]
    pub openings: Vec<Opening>,
    #[serde(default)]
    pub subrooms: Vec<Subroom>,
}

impl Zone {
    /// Undamaged, dimensionless zone; callers fill in what the inspection captured.
    pub fn new(id: impl Into<String>, zone_type: ZoneType) -> Self {
        Self {
            id: ZoneId(id.into()),
            name: None,
            zone_type,
            length_ft: None,
            width_ft: None,
            height_ft: None,
            pitch: None,
            damage_type: None,
            damage_severity: None,
            water_category: None,
            water_class: None,
            affected_surfaces: BTreeSet::new(),
            openings: Vec::new(),
            subrooms: Vec::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id.0)
    }

    pub fn metrics(&self) -> ZoneMetrics {
        compute_zone_metrics(self, &self.openings, &self.subrooms)
    }

    pub fn has_damage(&self) -> bool {
        self.damage_type.is_some() || !self.affected_surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zone_deserializes_from_camel_case_payload() {
        let zone: Zone = serde_json::from_value(json!({
            "id": "kitchen",
            "zoneType": "room",
            "lengthFt": 12.0,
            "widthFt": 14.0,
            "damageType": "water",
            "damageSeverity": "moderate",
            "waterCategory": 2,
            "waterClass": 3,
            "affectedSurfaces": ["cabinet", "floor"],
            "openings": [{ "widthFt": 3.0, "heightFt": 7.0 }],
        }))
        .expect("zone parses");

        assert_eq!(zone.id, ZoneId("kitchen".to_string()));
        assert_eq!(zone.water_category.map(WaterCategory::value), Some(2));
        assert_eq!(zone.openings[0].quantity, 1);
        assert!(zone.affected_surfaces.contains(&Surface::Cabinet));
        assert!(zone.height_ft.is_none());
    }

    #[test]
    fn out_of_range_ratings_are_rejected() {
        let err = serde_json::from_value::<Zone>(json!({
            "id": "basement",
            "waterCategory": 4,
        }))
        .expect_err("category 4 is invalid");
        assert!(err.to_string().contains("water category 4"));

        assert!(WaterClass::new(4).is_ok());
        assert!(WaterClass::new(0).is_err());
    }

    #[test]
    fn severity_is_ordinal() {
        assert!(DamageSeverity::Minor < DamageSeverity::Moderate);
        assert!(DamageSeverity::Severe > DamageSeverity::Moderate);
    }

    #[test]
    fn subroom_sign_follows_addition_flag() {
        let closet = Subroom {
            name: Some("closet".to_string()),
            length_ft: 3.0,
            width_ft: 4.0,
            is_addition: true,
        };
        let chase = Subroom {
            is_addition: false,
            ..closet.clone()
        };
        assert_eq!(closet.signed_area(), 12.0);
        assert_eq!(chase.signed_area(), -12.0);
    }
}
