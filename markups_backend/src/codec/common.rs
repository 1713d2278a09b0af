//! Fields shared by every markup type

use crate::codec::CodecError;
use crate::json_utils::element::JsonElement;
use crate::json_utils::writer::JsonWriter;
use crate::markup::{
    ControlPoint, CoordinateSystem, DisplayProperties, MarkupsNode, PositionStatus,
};
use glam::DVec3;
use miette::Context;

pub const COMMON_KEYS: &[&str] = &[
    "type",
    "name",
    "coordinateSystem",
    "coordinateUnits",
    "locked",
    "fixedNumberOfControlPoints",
    "labelFormat",
    "lastUsedControlPointNumber",
    "controlPoints",
    "display",
];

pub fn write_basic_properties(writer: &mut JsonWriter, node: &MarkupsNode) -> miette::Result<()> {
    let cs = writer.coordinate_system();

    writer.write_string("type", node.markup_type().to_string());
    writer.write_string("name", node.name.as_str());
    writer.write_string("coordinateSystem", cs.to_string());
    writer.write_string("coordinateUnits", node.coordinate_units.as_str());
    writer.write_bool("locked", node.locked);
    writer.write_bool(
        "fixedNumberOfControlPoints",
        node.fixed_number_of_control_points,
    );
    writer.write_string("labelFormat", node.label_format.as_str());
    writer.write_u64(
        "lastUsedControlPointNumber",
        node.last_used_control_point_number,
    );

    writer.write_object_array(
        "controlPoints",
        node.control_points.iter().enumerate(),
        |w, (i, point)| {
            write_control_point(w, point, cs).with_context(|| format!("in control point #{i}"))
        },
    )?;

    if let Some(display) = &node.display {
        writer
            .write_object("display", |w| write_display(w, display))
            .context("in display properties")?;
    }

    Ok(())
}

fn write_control_point(
    w: &mut JsonWriter,
    point: &ControlPoint,
    cs: CoordinateSystem,
) -> miette::Result<()> {
    w.write_string("id", point.id.as_str());
    w.write_string("label", point.label.as_str());
    w.write_string("description", point.description.as_str());
    w.write_string("associatedNodeID", point.associated_node_id.as_str());
    w.write_vector("position", &cs.convert(point.position).to_array())?;
    w.write_vector("orientation", &cs.convert_orientation(point.orientation))?;
    w.write_bool("selected", point.selected);
    w.write_bool("locked", point.locked);
    w.write_bool("visibility", point.visibility);
    w.write_string("positionStatus", point.position_status.to_string());
    Ok(())
}

fn write_display(w: &mut JsonWriter, display: &DisplayProperties) -> miette::Result<()> {
    w.write_bool("visibility", display.visibility);
    w.write_number("opacity", display.opacity)?;
    w.write_vector("color", &display.color)?;
    w.write_vector("selectedColor", &display.selected_color)?;
    w.write_string("glyphType", display.glyph_type.as_str());
    w.write_number("glyphScale", display.glyph_scale)?;
    w.write_number("textScale", display.text_scale)?;
    Ok(())
}

/// Coordinate system of a markup object. Files without one are LPS.
pub fn read_coordinate_system(element: JsonElement<'_>) -> miette::Result<CoordinateSystem> {
    Ok(element
        .get_enum::<CoordinateSystem>("coordinateSystem")?
        .unwrap_or_default())
}

/// Reads the shared fields into `node`
///
/// Every field is parsed before the node is touched, so a malformed object
/// leaves the node as it was.
pub fn update_markups_node_from_json_value(
    node: &mut MarkupsNode,
    element: JsonElement<'_>,
) -> miette::Result<()> {
    if let Some(ty) = element.get_string("type")? {
        let expected = node.markup_type();
        if ty != expected.to_string() {
            return Err(CodecError::UnexpectedMarkupType {
                expected,
                found: ty.to_string(),
            }
            .into());
        }
    }

    let cs = read_coordinate_system(element)?;

    let control_points = match element.get_object_array("controlPoints")? {
        None => None,
        Some(items) => Some(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    read_control_point(item, cs)
                        .with_context(|| format!("in control point #{i}"))
                })
                .collect::<miette::Result<Vec<_>>>()?,
        ),
    };

    let display = match element.get_object("display")? {
        None => None,
        Some(item) => Some(
            read_display(item, node.display.clone().unwrap_or_default())
                .context("in display properties")?,
        ),
    };

    let name = element.get_string("name")?;
    let units = element.get_string("coordinateUnits")?;
    let locked = element.get_bool("locked")?;
    let fixed = element.get_bool("fixedNumberOfControlPoints")?;
    let label_format = element.get_string("labelFormat")?;
    let last_used = element.get_u64("lastUsedControlPointNumber")?;

    if let Some(name) = name {
        node.name = name.to_string();
    }
    if let Some(units) = units {
        node.coordinate_units = units.to_string();
    }
    if let Some(locked) = locked {
        node.locked = locked;
    }
    if let Some(fixed) = fixed {
        node.fixed_number_of_control_points = fixed;
    }
    if let Some(label_format) = label_format {
        node.label_format = label_format.to_string();
    }
    if let Some(points) = control_points {
        node.control_points = points;
    }
    if display.is_some() {
        node.display = display;
    }
    node.last_used_control_point_number = match last_used {
        Some(n) => n,
        None => node
            .last_used_control_point_number
            .max(node.control_points.len() as u64),
    };

    Ok(())
}

fn read_control_point(p: JsonElement<'_>, cs: CoordinateSystem) -> miette::Result<ControlPoint> {
    let mut point = ControlPoint::new("", "", DVec3::ZERO);
    if let Some(id) = p.get_string("id")? {
        point.id = id.to_string();
    }
    if let Some(label) = p.get_string("label")? {
        point.label = label.to_string();
    }
    if let Some(description) = p.get_string("description")? {
        point.description = description.to_string();
    }
    if let Some(associated) = p.get_string("associatedNodeID")? {
        point.associated_node_id = associated.to_string();
    }
    if let Some(orientation) = p.get_vector::<9>("orientation")? {
        point.orientation = cs.convert_orientation(orientation);
    }
    if let Some(selected) = p.get_bool("selected")? {
        point.selected = selected;
    }
    if let Some(locked) = p.get_bool("locked")? {
        point.locked = locked;
    }
    if let Some(visibility) = p.get_bool("visibility")? {
        point.visibility = visibility;
    }
    if let Some(status) = p.get_enum::<PositionStatus>("positionStatus")? {
        point.position_status = status;
    }
    match p.get_vector::<3>("position")? {
        Some(position) => point.position = cs.convert(DVec3::from_array(position)),
        // a point without position can't be placed in the scene, whatever its status says
        None => point.position_status = PositionStatus::Undefined,
    }
    Ok(point)
}

fn read_display(
    d: JsonElement<'_>,
    mut display: DisplayProperties,
) -> miette::Result<DisplayProperties> {
    if let Some(visibility) = d.get_bool("visibility")? {
        display.visibility = visibility;
    }
    if let Some(opacity) = d.get_f64("opacity")? {
        display.opacity = opacity;
    }
    if let Some(color) = d.get_vector::<3>("color")? {
        display.color = color;
    }
    if let Some(color) = d.get_vector::<3>("selectedColor")? {
        display.selected_color = color;
    }
    if let Some(glyph) = d.get_string("glyphType")? {
        display.glyph_type = glyph.to_string();
    }
    if let Some(scale) = d.get_f64("glyphScale")? {
        display.glyph_scale = scale;
    }
    if let Some(scale) = d.get_f64("textScale")? {
        display.text_scale = scale;
    }
    Ok(display)
}

#[cfg(test)]
mod tests {
    use super::{update_markups_node_from_json_value, write_basic_properties};
    use crate::codec::CodecError;
    use crate::json_utils::element::JsonElement;
    use crate::json_utils::writer::JsonWriter;
    use crate::json_utils::{JsonFieldError, JsonValue};
    use crate::markup::{
        CoordinateSystem, DisplayProperties, MarkupType, MarkupsNode, PositionStatus,
    };
    use glam::DVec3;
    use rstest::rstest;
    use serde_json::json;

    fn sample_node() -> MarkupsNode {
        let mut node = MarkupsNode::new_plane("P");
        node.locked = true;
        node.add_control_point(DVec3::new(1.0, 2.0, 3.0)).description = "tip".to_string();
        node.add_control_point(DVec3::new(-4.0, 5.5, 0.25)).selected = false;
        node.display = Some(DisplayProperties {
            opacity: 0.5,
            ..Default::default()
        });
        node
    }

    #[test]
    fn should_write_positions_in_writer_coordinates() {
        let node = sample_node();
        let mut writer = JsonWriter::new(12, CoordinateSystem::Lps);
        write_basic_properties(&mut writer, &node).unwrap();
        let json = writer.finish();

        assert_eq!(json["type"], json!("Plane"));
        assert_eq!(json["coordinateSystem"], json!("LPS"));
        assert_eq!(
            json["controlPoints"][0]["position"],
            json!([-1.0, -2.0, 3.0])
        );
        assert_eq!(json["controlPoints"][1]["label"], json!("P-2"));
        assert_eq!(json["display"]["opacity"], json!(0.5));
    }

    #[test]
    fn should_read_back_written_fields() {
        let node = sample_node();
        for cs in [CoordinateSystem::Lps, CoordinateSystem::Ras] {
            let mut writer = JsonWriter::new(12, cs);
            write_basic_properties(&mut writer, &node).unwrap();
            let json = writer.finish();

            let mut restored = MarkupsNode::new(MarkupType::Plane);
            update_markups_node_from_json_value(&mut restored, JsonElement::new(&json).unwrap())
                .unwrap();
            assert_eq!(restored, node, "{cs}");
        }
    }

    #[test]
    fn should_reject_other_markup_types() {
        let json = json!({"type": "Line", "name": "L"});
        let mut node = MarkupsNode::new_plane("P");
        let err =
            update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap())
                .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::UnexpectedMarkupType { .. })
        ));
        assert_eq!(node.name, "P");
    }

    #[test]
    fn should_treat_missing_coordinate_system_as_lps() {
        let json = json!({"controlPoints": [{"position": [1.0, 2.0, 3.0]}]});
        let mut node = MarkupsNode::new_plane("P");
        update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap()).unwrap();
        assert_eq!(
            node.control_points[0].position,
            DVec3::new(-1.0, -2.0, 3.0)
        );
        assert_eq!(node.last_used_control_point_number, 1);
    }

    #[rstest]
    #[case(json!({"label": "floating"}))]
    #[case(json!({"label": "floating", "positionStatus": "defined"}))]
    #[case(json!({"label": "floating", "positionStatus": "preview"}))]
    fn should_mark_points_without_position_undefined(#[case] point: JsonValue) {
        let json = json!({"controlPoints": [point, {"position": [10.0, 0.0, 0.0]}]});
        let mut node = MarkupsNode::new_plane("P");
        update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap()).unwrap();
        assert_eq!(
            node.control_points[0].position_status,
            PositionStatus::Undefined
        );
        assert_eq!(node.defined_positions(), vec![DVec3::new(-10.0, 0.0, 0.0)]);
    }

    #[test]
    fn should_leave_node_untouched_on_malformed_point() {
        let json = json!({
            "name": "renamed",
            "controlPoints": [{"position": [1.0, 2.0]}]
        });
        let mut node = sample_node();
        let before = node.clone();
        let err =
            update_markups_node_from_json_value(&mut node, JsonElement::new(&json).unwrap())
                .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JsonFieldError>(),
            Some(JsonFieldError::WrongLength { expected: 3, actual: 2, .. })
        ));
        assert_eq!(node, before);
    }
}
