use glam::DVec3;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

pub use plane::{PlaneData, PlaneType, SizeMode};

pub mod plane;

/// Runtime type of a markup, as written to the `type` key
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Display, EnumString, VariantNames)]
pub enum MarkupType {
    Fiducial,
    Line,
    Angle,
    Curve,
    ClosedCurve,
    #[strum(serialize = "ROI")]
    Roi,
    Plane,
}

/// Anatomical coordinate convention of a file
///
/// Markups are always kept in RAS in memory; LPS differs by the sign of the
/// first two axes.
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumString,
    VariantNames,
    Serialize,
    Deserialize,
)]
pub enum CoordinateSystem {
    #[strum(serialize = "RAS")]
    #[serde(rename = "RAS")]
    Ras,
    #[default]
    #[strum(serialize = "LPS")]
    #[serde(rename = "LPS")]
    Lps,
}

impl CoordinateSystem {
    /// Converts a position or direction between RAS and this system.
    /// The conversion is its own inverse.
    pub fn convert(self, v: DVec3) -> DVec3 {
        match self {
            CoordinateSystem::Ras => v,
            CoordinateSystem::Lps => DVec3::new(-v.x, -v.y, v.z),
        }
    }

    /// Converts a row-major 3x3 orientation matrix between RAS and this system
    pub fn convert_orientation(self, m: [f64; 9]) -> [f64; 9] {
        match self {
            CoordinateSystem::Ras => m,
            CoordinateSystem::Lps => {
                const SIGN: [f64; 3] = [-1.0, -1.0, 1.0];
                let mut out = m;
                for (i, value) in out.iter_mut().enumerate() {
                    *value *= SIGN[i / 3] * SIGN[i % 3];
                }
                out
            }
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "camelCase")]
pub enum PositionStatus {
    Undefined,
    Preview,
    #[default]
    Defined,
}

pub const IDENTITY_ORIENTATION: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct ControlPoint {
    pub id: String,
    pub label: String,
    pub description: String,
    pub associated_node_id: String,
    pub position: DVec3,
    /// Row-major 3x3 matrix
    pub orientation: [f64; 9],
    pub selected: bool,
    pub locked: bool,
    pub visibility: bool,
    pub position_status: PositionStatus,
}

impl ControlPoint {
    pub fn new(id: impl Into<String>, label: impl Into<String>, position: DVec3) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: String::new(),
            associated_node_id: String::new(),
            position,
            orientation: IDENTITY_ORIENTATION,
            selected: true,
            locked: false,
            visibility: true,
            position_status: PositionStatus::Defined,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.position_status == PositionStatus::Defined
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayProperties {
    pub visibility: bool,
    pub opacity: f64,
    pub color: [f64; 3],
    pub selected_color: [f64; 3],
    pub glyph_type: String,
    pub glyph_scale: f64,
    pub text_scale: f64,
}

impl Default for DisplayProperties {
    fn default() -> Self {
        Self {
            visibility: true,
            opacity: 1.0,
            color: [0.4, 1.0, 1.0],
            selected_color: [1.0, 0.5, 0.5],
            glyph_type: "Sphere3D".to_string(),
            glyph_scale: 3.0,
            text_scale: 3.0,
        }
    }
}

/// Type-specific part of a markup
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupKind {
    Fiducial,
    Line,
    Angle,
    Curve,
    ClosedCurve,
    Roi,
    Plane(PlaneData),
}

impl MarkupKind {
    pub fn for_type(ty: MarkupType) -> Self {
        match ty {
            MarkupType::Fiducial => MarkupKind::Fiducial,
            MarkupType::Line => MarkupKind::Line,
            MarkupType::Angle => MarkupKind::Angle,
            MarkupType::Curve => MarkupKind::Curve,
            MarkupType::ClosedCurve => MarkupKind::ClosedCurve,
            MarkupType::Roi => MarkupKind::Roi,
            MarkupType::Plane => MarkupKind::Plane(PlaneData::default()),
        }
    }

    pub fn markup_type(&self) -> MarkupType {
        match self {
            MarkupKind::Fiducial => MarkupType::Fiducial,
            MarkupKind::Line => MarkupType::Line,
            MarkupKind::Angle => MarkupType::Angle,
            MarkupKind::Curve => MarkupType::Curve,
            MarkupKind::ClosedCurve => MarkupType::ClosedCurve,
            MarkupKind::Roi => MarkupType::Roi,
            MarkupKind::Plane(_) => MarkupType::Plane,
        }
    }
}

/// In-memory markup, always in RAS coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupsNode {
    pub name: String,
    pub coordinate_units: String,
    pub locked: bool,
    pub fixed_number_of_control_points: bool,
    /// `%N` is replaced with the markup name and `%d` with the point number
    pub label_format: String,
    pub last_used_control_point_number: u64,
    pub control_points: Vec<ControlPoint>,
    pub display: Option<DisplayProperties>,
    pub kind: MarkupKind,
}

impl MarkupsNode {
    pub fn new(ty: MarkupType) -> Self {
        Self {
            name: String::new(),
            coordinate_units: "mm".to_string(),
            locked: false,
            fixed_number_of_control_points: false,
            label_format: "%N-%d".to_string(),
            last_used_control_point_number: 0,
            control_points: vec![],
            display: None,
            kind: MarkupKind::for_type(ty),
        }
    }

    pub fn new_plane(name: impl Into<String>) -> Self {
        let mut node = Self::new(MarkupType::Plane);
        node.name = name.into();
        node
    }

    pub fn markup_type(&self) -> MarkupType {
        self.kind.markup_type()
    }

    pub fn as_plane(&self) -> Option<&PlaneData> {
        match &self.kind {
            MarkupKind::Plane(plane) => Some(plane),
            _ => None,
        }
    }

    pub fn as_plane_mut(&mut self) -> Option<&mut PlaneData> {
        match &mut self.kind {
            MarkupKind::Plane(plane) => Some(plane),
            _ => None,
        }
    }

    /// Appends a defined control point labeled according to `label_format`
    pub fn add_control_point(&mut self, position: DVec3) -> &mut ControlPoint {
        self.last_used_control_point_number += 1;
        let number = self.last_used_control_point_number;
        let label = self
            .label_format
            .replace("%N", &self.name)
            .replace("%d", &number.to_string());
        self.control_points
            .push(ControlPoint::new(number.to_string(), label, position));
        let last = self.control_points.len() - 1;
        &mut self.control_points[last]
    }

    /// Positions of control points that are fully placed
    pub fn defined_positions(&self) -> Vec<DVec3> {
        self.control_points
            .iter()
            .filter(|p| p.is_defined())
            .map(|p| p.position)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{CoordinateSystem, MarkupType, MarkupsNode, PositionStatus};
    use glam::DVec3;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("Plane", MarkupType::Plane)]
    #[case("ROI", MarkupType::Roi)]
    #[case("ClosedCurve", MarkupType::ClosedCurve)]
    fn should_parse_markup_types(#[case] raw: &str, #[case] ty: MarkupType) {
        assert_eq!(MarkupType::from_str(raw).unwrap(), ty);
        assert_eq!(ty.to_string(), raw);
    }

    #[test]
    fn should_flip_lps_axes() {
        let v = DVec3::new(1.0, -2.0, 3.0);
        assert_eq!(CoordinateSystem::Lps.convert(v), DVec3::new(-1.0, 2.0, 3.0));
        assert_eq!(CoordinateSystem::Ras.convert(v), v);
        assert_eq!(
            CoordinateSystem::Lps.convert(CoordinateSystem::Lps.convert(v)),
            v
        );
    }

    #[test]
    fn should_convert_orientation_as_similarity_transform() {
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let converted = CoordinateSystem::Lps.convert_orientation(m);
        assert_eq!(converted, [1.0, 2.0, -3.0, 4.0, 5.0, -6.0, -7.0, -8.0, 9.0]);
        assert_eq!(CoordinateSystem::Lps.convert_orientation(converted), m);
    }

    #[test]
    fn should_label_new_control_points() {
        let mut node = MarkupsNode::new_plane("P");
        node.add_control_point(DVec3::ZERO);
        let second = node.add_control_point(DVec3::X);
        assert_eq!(second.label, "P-2");
        assert_eq!(second.id, "2");
        assert_eq!(node.last_used_control_point_number, 2);
    }

    #[test]
    fn should_skip_undefined_points() {
        let mut node = MarkupsNode::new_plane("P");
        node.add_control_point(DVec3::ZERO);
        node.add_control_point(DVec3::X).position_status = PositionStatus::Preview;
        assert_eq!(node.defined_positions(), vec![DVec3::ZERO]);
    }

    #[test]
    fn should_default_to_lps() {
        assert_eq!(CoordinateSystem::default(), CoordinateSystem::Lps);
        assert_eq!(
            CoordinateSystem::from_str("RAS").unwrap(),
            CoordinateSystem::Ras
        );
    }
}
