//! Derived zone measurements.
//!
//! Everything here is pure: the same zone, openings, and subrooms always yield
//! bit-identical metrics, and missing geometry degrades to zeros tagged
//! [`ComputedFrom::Unknown`] instead of failing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::domain::{Opening, Subroom, Zone, ZoneType};

/// Ceiling height assumed when the inspection did not capture one.
pub const DEFAULT_HEIGHT_FT: f64 = 8.0;

/// Run used when a pitch is given as a bare rise (`"6"` reads as 6/12).
const STANDARD_PITCH_RUN: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedFrom {
    Dimensions,
    Unknown,
}

/// Immutable snapshot of a zone's measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneMetrics {
    pub length_feet: f64,
    pub width_feet: f64,
    pub floor_square_feet: f64,
    pub ceiling_square_feet: f64,
    pub wall_square_feet: f64,
    pub opening_square_feet: f64,
    pub wall_square_feet_net: f64,
    pub perimeter_linear_feet: f64,
    pub subroom_net_square_feet: f64,
    pub height_feet: f64,
    pub default_height_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roof_square_feet: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roof_squares: Option<f64>,
    pub computed_from: ComputedFrom,
}

impl ZoneMetrics {
    fn unknown(zone: &Zone) -> Self {
        let roof = zone.zone_type == ZoneType::Roof;
        Self {
            length_feet: 0.0,
            width_feet: 0.0,
            floor_square_feet: 0.0,
            ceiling_square_feet: 0.0,
            wall_square_feet: 0.0,
            opening_square_feet: 0.0,
            wall_square_feet_net: 0.0,
            perimeter_linear_feet: 0.0,
            subroom_net_square_feet: 0.0,
            height_feet: 0.0,
            default_height_used: false,
            pitch_multiplier: roof.then(|| pitch_multiplier(zone.pitch.as_deref())),
            roof_square_feet: roof.then_some(0.0),
            roof_squares: roof.then_some(0.0),
            computed_from: ComputedFrom::Unknown,
        }
    }

    pub fn has_dimensions(&self) -> bool {
        self.computed_from == ComputedFrom::Dimensions
    }

    /// Value bound to a formula alias.
    pub fn value(&self, alias: MetricAlias) -> f64 {
        match alias {
            MetricAlias::FloorSf => self.floor_square_feet,
            MetricAlias::CeilSf => self.ceiling_square_feet,
            MetricAlias::WallSf => self.wall_square_feet,
            MetricAlias::WallSfNet => self.wall_square_feet_net,
            MetricAlias::OpeningSf => self.opening_square_feet,
            MetricAlias::PerimeterLf => self.perimeter_linear_feet,
            MetricAlias::HeightFt => self.height_feet,
            MetricAlias::RoofSf => self.roof_square_feet.unwrap_or(0.0),
            MetricAlias::RoofSq => self.roof_squares.unwrap_or(0.0),
            MetricAlias::PitchMult => self.pitch_multiplier.unwrap_or(1.0),
        }
    }

    /// Plain-language derivation of an alias, reproducing the arithmetic.
    pub fn describe(&self, alias: MetricAlias) -> String {
        let value = format_decimal(self.value(alias), 2);
        if !self.has_dimensions() && alias != MetricAlias::PitchMult {
            return format!("{}: dimensions unavailable = {} {}", alias.label(), value, alias.unit());
        }

        match alias {
            MetricAlias::FloorSf => {
                let base = format!(
                    "{}ft × {}ft",
                    format_decimal(self.length_feet, 2),
                    format_decimal(self.width_feet, 2)
                );
                let adjustment = if self.subroom_net_square_feet > 0.0 {
                    format!(
                        " + {} SF subrooms",
                        format_decimal(self.subroom_net_square_feet, 2)
                    )
                } else if self.subroom_net_square_feet < 0.0 {
                    format!(
                        " - {} SF subrooms",
                        format_decimal(-self.subroom_net_square_feet, 2)
                    )
                } else {
                    String::new()
                };
                format!("Floor area: {base}{adjustment} = {value} SF")
            }
            MetricAlias::CeilSf => format!("Ceiling area: {value} SF (matches floor area)"),
            MetricAlias::WallSf => format!(
                "Wall area: {} LF × {}ft{} = {value} SF",
                format_decimal(self.perimeter_linear_feet, 2),
                format_decimal(self.height_feet, 2),
                if self.default_height_used {
                    " (default height)"
                } else {
                    ""
                }
            ),
            MetricAlias::WallSfNet => format!(
                "Net wall area: {} SF - {} SF openings = {value} SF",
                format_decimal(self.wall_square_feet, 2),
                format_decimal(self.opening_square_feet, 2)
            ),
            MetricAlias::OpeningSf => format!("Opening area: {value} SF"),
            MetricAlias::PerimeterLf => format!(
                "Perimeter: 2 × ({}ft + {}ft) = {value} LF",
                format_decimal(self.length_feet, 2),
                format_decimal(self.width_feet, 2)
            ),
            MetricAlias::HeightFt => {
                if self.default_height_used {
                    format!("Height: {value}ft (default)")
                } else {
                    format!("Height: {value}ft")
                }
            }
            MetricAlias::RoofSf => match self.pitch_multiplier {
                Some(multiplier) => format!(
                    "Roof area: {} SF × {} pitch factor = {value} SF",
                    format_decimal(self.floor_square_feet, 2),
                    format_decimal(multiplier, 3)
                ),
                None => format!("Roof area: not a roof zone = {value} SF"),
            },
            MetricAlias::RoofSq => match self.roof_square_feet {
                Some(roof_area) => format!(
                    "Roof squares: {} SF / 100 = {value} SQ",
                    format_decimal(roof_area, 2)
                ),
                None => format!("Roof squares: not a roof zone = {value} SQ"),
            },
            MetricAlias::PitchMult => format!(
                "Pitch factor: {}",
                format_decimal(self.value(MetricAlias::PitchMult), 3)
            ),
        }
    }
}

/// Derives the canonical measurement set for a zone.
pub fn compute_zone_metrics(zone: &Zone, openings: &[Opening], subrooms: &[Subroom]) -> ZoneMetrics {
    let (length, width) = match (zone.length_ft, zone.width_ft) {
        (Some(length), Some(width))
            if length.is_finite() && width.is_finite() && length > 0.0 && width > 0.0 =>
        {
            (length, width)
        }
        _ => return ZoneMetrics::unknown(zone),
    };

    let subroom_net: f64 = subrooms.iter().map(Subroom::signed_area).sum();
    let floor = (length * width + subroom_net).max(0.0);
    let perimeter = 2.0 * (length + width);

    let (height, default_height_used) = match zone.height_ft {
        Some(height) if height.is_finite() && height > 0.0 => (height, false),
        _ => (DEFAULT_HEIGHT_FT, true),
    };

    let gross_wall = perimeter * height;
    let opening_area: f64 = openings.iter().map(Opening::area).sum();
    let net_wall = (gross_wall - opening_area).max(0.0);

    let (pitch_multiplier, roof_square_feet, roof_squares) = if zone.zone_type == ZoneType::Roof {
        let multiplier = pitch_multiplier(zone.pitch.as_deref());
        let roof_area = floor * multiplier;
        (Some(multiplier), Some(roof_area), Some(roof_area / 100.0))
    } else {
        (None, None, None)
    };

    ZoneMetrics {
        length_feet: length,
        width_feet: width,
        floor_square_feet: floor,
        ceiling_square_feet: floor,
        wall_square_feet: gross_wall,
        opening_square_feet: opening_area,
        wall_square_feet_net: net_wall,
        perimeter_linear_feet: perimeter,
        subroom_net_square_feet: subroom_net,
        height_feet: height,
        default_height_used,
        pitch_multiplier,
        roof_square_feet,
        roof_squares,
        computed_from: ComputedFrom::Dimensions,
    }
}

/// Slope factor `sqrt(1 + (rise/run)^2)`; unparseable or absent pitches read as flat.
pub fn pitch_multiplier(pitch: Option<&str>) -> f64 {
    pitch
        .and_then(parse_pitch)
        .map(|(rise, run)| (1.0 + (rise / run).powi(2)).sqrt())
        .unwrap_or(1.0)
}

fn parse_pitch(raw: &str) -> Option<(f64, f64)> {
    let raw = raw.trim();
    let (rise, run) = match raw.split_once(['/', ':']) {
        Some((rise, run)) => (rise.trim().parse::<f64>().ok()?, run.trim().parse::<f64>().ok()?),
        None => (raw.parse::<f64>().ok()?, STANDARD_PITCH_RUN),
    };

    (rise.is_finite() && run.is_finite() && rise >= 0.0 && run > 0.0).then_some((rise, run))
}

/// Closed set of metric names a quantity formula may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricAlias {
    #[serde(rename = "FLOOR_SF")]
    FloorSf,
    #[serde(rename = "CEIL_SF")]
    CeilSf,
    #[serde(rename = "WALL_SF")]
    WallSf,
    #[serde(rename = "WALL_SF_NET")]
    WallSfNet,
    #[serde(rename = "OPENING_SF")]
    OpeningSf,
    #[serde(rename = "PERIMETER_LF")]
    PerimeterLf,
    #[serde(rename = "HEIGHT_FT")]
    HeightFt,
    #[serde(rename = "ROOF_SF")]
    RoofSf,
    #[serde(rename = "ROOF_SQ")]
    RoofSq,
    #[serde(rename = "PITCH_MULT")]
    PitchMult,
}

impl MetricAlias {
    pub const ALL: [Self; 10] = [
        Self::FloorSf,
        Self::CeilSf,
        Self::WallSf,
        Self::WallSfNet,
        Self::OpeningSf,
        Self::PerimeterLf,
        Self::HeightFt,
        Self::RoofSf,
        Self::RoofSq,
        Self::PitchMult,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FloorSf => "FLOOR_SF",
            Self::CeilSf => "CEIL_SF",
            Self::WallSf => "WALL_SF",
            Self::WallSfNet => "WALL_SF_NET",
            Self::OpeningSf => "OPENING_SF",
            Self::PerimeterLf => "PERIMETER_LF",
            Self::HeightFt => "HEIGHT_FT",
            Self::RoofSf => "ROOF_SF",
            Self::RoofSq => "ROOF_SQ",
            Self::PitchMult => "PITCH_MULT",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FloorSf => "Floor area",
            Self::CeilSf => "Ceiling area",
            Self::WallSf => "Wall area",
            Self::WallSfNet => "Net wall area",
            Self::OpeningSf => "Opening area",
            Self::PerimeterLf => "Perimeter",
            Self::HeightFt => "Height",
            Self::RoofSf => "Roof area",
            Self::RoofSq => "Roof squares",
            Self::PitchMult => "Pitch factor",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::FloorSf
            | Self::CeilSf
            | Self::WallSf
            | Self::WallSfNet
            | Self::OpeningSf
            | Self::RoofSf => "SF",
            Self::PerimeterLf => "LF",
            Self::HeightFt => "FT",
            Self::RoofSq => "SQ",
            Self::PitchMult => "x",
        }
    }
}

impl fmt::Display for MetricAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric alias '{0}'")]
pub struct UnknownMetricAlias(pub String);

impl FromStr for MetricAlias {
    type Err = UnknownMetricAlias;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Self::ALL
            .into_iter()
            .find(|alias| alias.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMetricAlias(wanted.to_string()))
    }
}

/// Renders a number with at most `places` decimals and no trailing zeros.
pub(crate) fn format_decimal(value: f64, places: usize) -> String {
    let mut rendered = format!("{:.*}", places, value);
    if rendered.contains('.') {
        while rendered.ends_with('0') {
            rendered.pop();
        }
        if rendered.ends_with('.') {
            rendered.pop();
        }
    }
    if rendered == "-0" {
        rendered = "0".to_string();
    }
    rendered
}
