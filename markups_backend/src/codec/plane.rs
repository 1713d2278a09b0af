use crate::codec::common::{self, read_coordinate_system};
use crate::codec::{CodecError, MarkupCodec};
use crate::json_utils::element::JsonElement;
use crate::json_utils::writer::JsonWriter;
use crate::json_utils::{JsonFieldError, JsonValue};
use crate::markup::plane::{in_plane_direction, unit_direction, ExplicitGeometry};
use crate::markup::{MarkupType, MarkupsNode, PlaneData, PlaneType, SizeMode};
use glam::DVec3;
use miette::Context;
use tracing::warn;

pub const PLANE_TAG_NAME: &str = "MarkupsPlaneJsonStorage";

const PLANE_KEYS: &[&str] = &[
    "planeType",
    "sizeMode",
    "autoScalingSizeFactor",
    "origin",
    "normal",
    "orientation",
    "size",
];

/// Storage codec for plane markups
#[derive(Debug, Clone, Default)]
pub struct PlaneJsonCodec;

impl MarkupCodec for PlaneJsonCodec {
    fn tag_name(&self) -> &'static str {
        PLANE_TAG_NAME
    }

    fn can_read_in_reference_node(&self, node: Option<&MarkupsNode>) -> bool {
        node.is_some_and(|node| node.markup_type() == MarkupType::Plane)
    }

    fn create_node_instance(&self) -> Box<dyn MarkupCodec> {
        Box::new(PlaneJsonCodec)
    }

    fn write_basic_properties(
        &self,
        writer: &mut JsonWriter,
        node: &MarkupsNode,
    ) -> miette::Result<()> {
        let plane = self.expect_plane(node)?;

        common::write_basic_properties(writer, node)?;

        let cs = writer.coordinate_system();
        let [x_axis, y_axis, normal] = plane.orientation().map(|axis| cs.convert(axis));
        let mut orientation = [0.0; 9];
        for (row, axis) in [x_axis, y_axis, normal].iter().enumerate() {
            orientation[row * 3..row * 3 + 3].copy_from_slice(&axis.to_array());
        }

        // everything fallible is formatted before the writer is touched
        let mut values: Vec<(&str, JsonValue)> = vec![
            (
                "autoScalingSizeFactor",
                writer.number("autoScalingSizeFactor", plane.auto_scaling_size_factor)?,
            ),
            (
                "origin",
                writer.vector("origin", &cs.convert(plane.origin).to_array())?,
            ),
            ("normal", writer.vector("normal", &normal.to_array())?),
            ("orientation", writer.vector("orientation", &orientation)?),
        ];
        if plane.size_mode == SizeMode::Absolute {
            values.push(("size", writer.vector("size", &plane.size)?));
        }

        writer.write_string("planeType", plane.plane_type.to_string());
        writer.write_string("sizeMode", plane.size_mode.to_string());
        for (key, value) in values {
            writer.insert(key, value);
        }

        Ok(())
    }

    fn update_markups_node_from_json_value(
        &self,
        node: &mut MarkupsNode,
        element: JsonElement<'_>,
    ) -> miette::Result<()> {
        let current_normal = self.expect_plane(node)?.normal();

        common::update_markups_node_from_json_value(node, element)?;

        let patch = PlanePatch::parse(element, current_normal)
            .context("failed to read plane properties")?;
        let points = node.defined_positions();
        let ty = node.markup_type();
        let Some(plane) = node.as_plane_mut() else {
            return Err(self.mismatch(ty).into());
        };
        patch.apply(plane, &points);

        Ok(())
    }

    fn known_keys(&self) -> &'static [&'static str] {
        PLANE_KEYS
    }
}

impl PlaneJsonCodec {
    fn expect_plane<'a>(&self, node: &'a MarkupsNode) -> Result<&'a PlaneData, CodecError> {
        node.as_plane()
            .ok_or_else(|| self.mismatch(node.markup_type()))
    }

    fn mismatch(&self, actual: MarkupType) -> CodecError {
        CodecError::TypeMismatch {
            codec: PLANE_TAG_NAME,
            actual,
        }
    }
}

/// Plane keys of a markup object, validated and converted to RAS
#[derive(Debug, Default)]
struct PlanePatch {
    plane_type: Option<PlaneType>,
    size_mode: Option<SizeMode>,
    auto_scaling_size_factor: Option<f64>,
    origin: Option<DVec3>,
    normal: Option<DVec3>,
    x_axis: Option<DVec3>,
    size: Option<[f64; 2]>,
}

impl PlanePatch {
    /// Parses and validates the plane keys. An in-plane axis is checked
    /// against the file's normal, or `current_normal` when the file has none.
    fn parse(element: JsonElement<'_>, current_normal: DVec3) -> miette::Result<Self> {
        let cs = read_coordinate_system(element)?;
        let vector = |key: &str| -> miette::Result<Option<DVec3>> {
            Ok(element
                .get_vector::<3>(key)?
                .map(|v| cs.convert(DVec3::from_array(v))))
        };

        let normal = vector("normal")?
            .map(|normal| {
                unit_direction(normal).ok_or_else(|| JsonFieldError::Degenerate {
                    key: "normal".to_string(),
                    reason: "normal has zero length",
                })
            })
            .transpose()?;

        let x_axis = element
            .get_vector::<9>("orientation")?
            .map(|m| {
                let axis = cs.convert(DVec3::new(m[0], m[1], m[2]));
                in_plane_direction(axis, normal.unwrap_or(current_normal)).ok_or_else(|| {
                    JsonFieldError::Degenerate {
                        key: "orientation".to_string(),
                        reason: "x axis is zero or parallel to the normal",
                    }
                })
            })
            .transpose()?;

        let auto_scaling_size_factor = element.get_f64("autoScalingSizeFactor")?;
        if let Some(value) = auto_scaling_size_factor.filter(|f| *f <= 0.0) {
            return Err(JsonFieldError::NotPositive {
                key: "autoScalingSizeFactor".to_string(),
                value,
            }
            .into());
        }

        Ok(Self {
            plane_type: element.get_enum("planeType")?,
            size_mode: element.get_enum("sizeMode")?,
            auto_scaling_size_factor,
            origin: vector("origin")?,
            normal,
            x_axis,
            size: element.get_vector::<2>("size")?,
        })
    }

    fn apply(self, plane: &mut PlaneData, points: &[DVec3]) {
        if let Some(plane_type) = self.plane_type {
            plane.plane_type = plane_type;
        }
        if let Some(size_mode) = self.size_mode {
            plane.size_mode = size_mode;
        }
        if let Some(factor) = self.auto_scaling_size_factor {
            plane.auto_scaling_size_factor = factor;
        }
        if let Some(origin) = self.origin {
            plane.origin = origin;
        }
        let normal_set = self.normal.is_some_and(|normal| plane.set_normal(normal));
        let x_axis_set = self.x_axis.is_some_and(|axis| plane.set_x_axis(axis));

        plane.derive_from_points(
            points,
            ExplicitGeometry {
                origin: self.origin.is_some(),
                normal: normal_set,
                x_axis: x_axis_set,
            },
        );

        match (plane.size_mode, self.size) {
            (SizeMode::Absolute, Some(size)) => plane.size = size,
            (SizeMode::Absolute, None) => {
                warn!("plane has absolute size mode but no `size`, deriving size from control points");
                plane.size = plane.auto_size(points);
            }
            (SizeMode::Auto, size) => {
                if size.is_some() {
                    warn!("plane has automatic size mode, ignoring its `size`");
                }
                plane.update_auto_size(points);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaneJsonCodec, PLANE_TAG_NAME};
    use crate::codec::{CodecError, MarkupCodec};
    use crate::json_utils::element::JsonElement;
    use crate::json_utils::writer::JsonWriter;
    use crate::json_utils::{JsonFieldError, JsonValue};
    use crate::markup::{
        CoordinateSystem, MarkupType, MarkupsNode, PlaneData, PlaneType, SizeMode,
    };
    use glam::DVec3;
    use rstest::rstest;
    use serde_json::json;

    const TOLERANCE: f64 = 1e-6;

    fn write(node: &MarkupsNode, cs: CoordinateSystem) -> JsonValue {
        let mut writer = JsonWriter::new(12, cs);
        PlaneJsonCodec
            .write_basic_properties(&mut writer, node)
            .expect("Should write plane");
        writer.finish()
    }

    fn read(json: &JsonValue) -> miette::Result<MarkupsNode> {
        let mut node = MarkupsNode::new(MarkupType::Plane);
        PlaneJsonCodec.update_markups_node_from_json_value(
            &mut node,
            JsonElement::new(json).expect("Should be an object"),
        )?;
        Ok(node)
    }

    fn plane(node: &MarkupsNode) -> &PlaneData {
        node.as_plane().expect("Should be a plane")
    }

    fn assert_planes_close(actual: &PlaneData, expected: &PlaneData) {
        assert_eq!(actual.plane_type, expected.plane_type);
        assert_eq!(actual.size_mode, expected.size_mode);
        assert!(actual.origin.abs_diff_eq(expected.origin, TOLERANCE));
        assert!(actual.normal().abs_diff_eq(expected.normal(), TOLERANCE));
        assert!(actual.x_axis().abs_diff_eq(expected.x_axis(), TOLERANCE));
        assert!((actual.size[0] - expected.size[0]).abs() < TOLERANCE);
        assert!((actual.size[1] - expected.size[1]).abs() < TOLERANCE);
    }

    fn sample(plane_type: PlaneType, size_mode: SizeMode) -> MarkupsNode {
        let mut node = MarkupsNode::new_plane("P");
        node.add_control_point(DVec3::new(10.5, -3.25, 7.0));
        node.add_control_point(DVec3::new(14.0, -3.25, 7.5));
        node.add_control_point(DVec3::new(10.5, 1.0, 6.0));
        let points = node.defined_positions();
        let plane = node.as_plane_mut().unwrap();
        plane.plane_type = plane_type;
        plane.size_mode = size_mode;
        plane.origin = DVec3::new(11.0, -1.0, 6.5);
        plane.set_normal(DVec3::new(0.2, 0.3, 0.9));
        plane.set_x_axis(DVec3::new(1.0, 0.0, 0.0));
        plane.auto_scaling_size_factor = 1.5;
        match size_mode {
            SizeMode::Auto => plane.update_auto_size(&points),
            SizeMode::Absolute => plane.size = [40.0, 25.5],
        }
        node
    }

    #[rstest]
    fn should_round_trip(
        #[values(
            PlaneType::PointNormal,
            PlaneType::ThreePoints,
            PlaneType::Extents,
            PlaneType::Plane
        )]
        plane_type: PlaneType,
        #[values(SizeMode::Auto, SizeMode::Absolute)] size_mode: SizeMode,
        #[values(CoordinateSystem::Lps, CoordinateSystem::Ras)] cs: CoordinateSystem,
    ) {
        let node = sample(plane_type, size_mode);
        let restored = read(&write(&node, cs)).expect("Should read plane");
        assert_planes_close(plane(&restored), plane(&node));
        assert_eq!(restored.control_points.len(), 3);
        assert_eq!(restored.name, "P");
    }

    #[test]
    fn should_write_point_normal_scenario() {
        let mut node = MarkupsNode::new_plane("P");
        *node.as_plane_mut().unwrap() =
            PlaneData::new(PlaneType::PointNormal, DVec3::ZERO, DVec3::Z);

        let json = write(&node, CoordinateSystem::Ras);
        assert_eq!(json["planeType"], json!("pointNormal"));
        assert_eq!(json["sizeMode"], json!("auto"));
        assert_eq!(json["origin"], json!([0.0, 0.0, 0.0]));
        assert_eq!(json["normal"], json!([0.0, 0.0, 1.0]));
        assert!(json.get("size").is_none());

        let restored = read(&json).unwrap();
        let restored = plane(&restored);
        assert_eq!(restored.plane_type, PlaneType::PointNormal);
        assert_eq!(restored.origin, DVec3::ZERO);
        assert_eq!(restored.normal(), DVec3::Z);
    }

    #[test]
    fn should_write_size_only_when_absolute() {
        let json = write(
            &sample(PlaneType::Plane, SizeMode::Absolute),
            CoordinateSystem::Lps,
        );
        assert_eq!(json["size"], json!([40.0, 25.5]));
        assert_eq!(json["sizeMode"], json!("absolute"));
    }

    #[test]
    fn should_write_lps_vectors() {
        let mut node = MarkupsNode::new_plane("P");
        *node.as_plane_mut().unwrap() = PlaneData::new(
            PlaneType::Plane,
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(1.0, 0.0, 0.0),
        );
        let json = write(&node, CoordinateSystem::Lps);
        assert_eq!(json["origin"], json!([-1.0, -2.0, 3.0]));
        assert_eq!(json["normal"], json!([-1.0, 0.0, 0.0]));
    }

    #[test]
    fn should_derive_missing_size_from_control_points() {
        let json = json!({
            "type": "Plane",
            "coordinateSystem": "RAS",
            "controlPoints": [
                {"position": [0.0, 0.0, 0.0]},
                {"position": [3.0, 0.0, 0.0]},
                {"position": [0.0, -2.0, 0.0]}
            ],
            "planeType": "pointNormal",
            "origin": [0.0, 0.0, 0.0],
            "normal": [0.0, 0.0, 1.0]
        });
        let node = read(&json).unwrap();
        assert_eq!(plane(&node).size, [6.0, 4.0]);
    }

    #[test]
    fn should_derive_absolute_size_when_missing() {
        let json = json!({
            "coordinateSystem": "RAS",
            "controlPoints": [{"position": [0.0, 0.0, 0.0]}, {"position": [1.0, 1.0, 0.0]}],
            "sizeMode": "absolute",
            "normal": [0.0, 0.0, 1.0]
        });
        let node = read(&json).unwrap();
        assert_eq!(plane(&node).size_mode, SizeMode::Absolute);
        assert_eq!(plane(&node).size, [2.0, 2.0]);
    }

    #[test]
    fn should_default_missing_plane_type() {
        let json = json!({"name": "P", "normal": [0.0, 1.0, 0.0]});
        let node = read(&json).unwrap();
        assert_eq!(plane(&node).plane_type, PlaneType::PointNormal);
        assert_eq!(plane(&node).size_mode, SizeMode::Auto);
    }

    #[test]
    fn should_reject_short_normal_without_touching_generic_fields() {
        let mut node = MarkupsNode::new_plane("old");
        let before = plane(&node).clone();
        let json = json!({
            "name": "new",
            "coordinateSystem": "RAS",
            "origin": [5.0, 5.0, 5.0],
            "normal": [1, 0]
        });
        let err = PlaneJsonCodec
            .update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JsonFieldError>(),
            Some(JsonFieldError::WrongLength {
                expected: 3,
                actual: 2,
                ..
            })
        ));
        assert_eq!(node.name, "new");
        assert_eq!(plane(&node), &before);
    }

    #[rstest]
    #[case(json!({"planeType": 3}))]
    #[case(json!({"planeType": "fourPoints"}))]
    #[case(json!({"sizeMode": "huge"}))]
    #[case(json!({"origin": "0,0,0"}))]
    #[case(json!({"size": [1.0, 2.0, 3.0]}))]
    #[case(json!({"orientation": [1.0, 0.0, 0.0]}))]
    #[case(json!({"autoScalingSizeFactor": "big"}))]
    #[case(json!({"autoScalingSizeFactor": 0.0}))]
    #[case(json!({"autoScalingSizeFactor": -2.0}))]
    #[case(json!({"planeType": "plane", "normal": [0.0, 0.0, 0.0]}))]
    #[case(json!({"normal": [0, 0, 1], "orientation": [0, 0, 1, 0, 1, 0, 0, 0, 1]}))]
    #[case(json!({"orientation": [0, 0, -3, 0, 1, 0, 0, 0, 1]}))]
    #[case(json!({"normal": [1, 0, 0], "orientation": [0, 0, 0, 0, 1, 0, 0, 0, 1]}))]
    fn should_reject_malformed_fields(#[case] json: JsonValue) {
        assert!(read(&json).is_err());
    }

    #[rstest]
    #[case(json!({"normal": [0.0, 0.0, 0.0]}), "normal")]
    #[case(json!({"normal": [0, 1, 0], "orientation": [0, 2, 0, 1, 0, 0, 0, 0, 1]}), "orientation")]
    fn should_reject_degenerate_directions_without_touching_plane(
        #[case] json: JsonValue,
        #[case] field: &str,
    ) {
        let mut node = MarkupsNode::new_plane("P");
        let before = plane(&node).clone();
        let err = PlaneJsonCodec
            .update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JsonFieldError>(),
            Some(JsonFieldError::Degenerate { key, .. }) if key == field
        ));
        assert_eq!(plane(&node), &before);
    }

    #[test]
    fn should_reject_non_positive_scaling_factor() {
        let err = read(&json!({"autoScalingSizeFactor": -1.5})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JsonFieldError>(),
            Some(JsonFieldError::NotPositive { value, .. }) if *value == -1.5
        ));
    }

    #[test]
    fn should_place_extents_origin_at_defined_points_only() {
        let json = json!({
            "coordinateSystem": "RAS",
            "planeType": "extents",
            "controlPoints": [
                {"positionStatus": "defined"},
                {"position": [10.0, 0.0, 0.0]},
                {"position": [20.0, 4.0, 0.0]}
            ]
        });
        let node = read(&json).unwrap();
        assert_eq!(plane(&node).origin, DVec3::new(15.0, 2.0, 0.0));
    }

    #[test]
    fn should_ignore_size_in_auto_mode() {
        let json = json!({
            "coordinateSystem": "RAS",
            "controlPoints": [{"position": [0.0, 0.0, 0.0]}, {"position": [2.0, 1.0, 0.0]}],
            "normal": [0.0, 0.0, 1.0],
            "size": [100.0, 100.0]
        });
        let node = read(&json).unwrap();
        assert_eq!(plane(&node).size_mode, SizeMode::Auto);
        assert_eq!(plane(&node).size, [4.0, 2.0]);
    }

    #[test]
    fn should_refuse_non_plane_nodes() {
        let mut line = MarkupsNode::new(MarkupType::Line);
        let mut writer = JsonWriter::new(12, CoordinateSystem::Lps);
        let err = PlaneJsonCodec
            .write_basic_properties(&mut writer, &line)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::TypeMismatch { .. })
        ));
        assert!(writer.is_empty());

        let json = json!({"name": "changed"});
        assert!(PlaneJsonCodec
            .update_markups_node_from_json_value(&mut line, JsonElement::new(&json).unwrap())
            .is_err());
        assert_eq!(line.name, "");
    }

    #[test]
    fn should_check_reference_node_type() {
        let codec = PlaneJsonCodec;
        assert!(codec.can_read_in_reference_node(Some(&MarkupsNode::new_plane("P"))));
        assert!(!codec.can_read_in_reference_node(Some(&MarkupsNode::new(MarkupType::Fiducial))));
        assert!(!codec.can_read_in_reference_node(None));
    }

    #[test]
    fn should_have_stable_tag_name() {
        let codec = PlaneJsonCodec;
        assert_eq!(codec.tag_name(), "MarkupsPlaneJsonStorage");
        let instance = codec.create_node_instance();
        assert_eq!(instance.clone().tag_name(), PLANE_TAG_NAME);
    }
}
