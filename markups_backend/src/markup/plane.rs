use glam::DVec3;
use strum::{Display, EnumString, VariantNames};

const EPSILON: f64 = 1e-9;

/// How the plane geometry is defined by its control points
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "camelCase")]
pub enum PlaneType {
    /// First point is the origin, normal is stored explicitly
    #[default]
    PointNormal,
    /// Origin and normal follow the first three points
    ThreePoints,
    /// Origin is the centroid of all points
    Extents,
    /// Explicit plane equation, independent of control points
    Plane,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, Display, EnumString, VariantNames)]
#[strum(serialize_all = "camelCase")]
pub enum SizeMode {
    /// Size is recomputed from the control points
    #[default]
    Auto,
    /// Size is set by the user
    Absolute,
}

/// Geometry values a file provided explicitly and that must not be
/// recomputed from control points
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ExplicitGeometry {
    pub origin: bool,
    pub normal: bool,
    pub x_axis: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaneData {
    pub plane_type: PlaneType,
    pub size_mode: SizeMode,
    pub origin: DVec3,
    normal: DVec3,
    x_axis: DVec3,
    /// Width and height
    pub size: [f64; 2],
    pub auto_scaling_size_factor: f64,
}

impl Default for PlaneData {
    fn default() -> Self {
        Self {
            plane_type: PlaneType::default(),
            size_mode: SizeMode::default(),
            origin: DVec3::ZERO,
            normal: DVec3::Z,
            x_axis: DVec3::X,
            size: [0.0, 0.0],
            auto_scaling_size_factor: 1.0,
        }
    }
}

impl PlaneData {
    pub fn new(plane_type: PlaneType, origin: DVec3, normal: DVec3) -> Self {
        let mut plane = Self {
            plane_type,
            origin,
            ..Default::default()
        };
        plane.set_normal(normal);
        plane
    }

    /// Unit normal
    pub fn normal(&self) -> DVec3 {
        self.normal
    }

    /// Unit in-plane axis, perpendicular to the normal
    pub fn x_axis(&self) -> DVec3 {
        self.x_axis
    }

    pub fn y_axis(&self) -> DVec3 {
        self.normal.cross(self.x_axis)
    }

    /// Sets the normal, keeping the in-plane axis as close to the previous one
    /// as possible. Returns false and leaves the plane untouched for a
    /// zero-length vector.
    pub fn set_normal(&mut self, normal: DVec3) -> bool {
        let Some(normal) = unit_direction(normal) else {
            return false;
        };
        self.normal = normal;
        self.x_axis = orthogonalize(self.x_axis, normal);
        true
    }

    /// Sets the in-plane axis; its component along the normal is dropped
    pub fn set_x_axis(&mut self, x_axis: DVec3) -> bool {
        let Some(x_axis) = in_plane_direction(x_axis, self.normal) else {
            return false;
        };
        self.x_axis = x_axis;
        true
    }

    /// Axes as rows of a row-major 3x3 matrix: x axis, y axis, normal
    pub fn orientation(&self) -> [DVec3; 3] {
        [self.x_axis, self.y_axis(), self.normal]
    }

    /// Recomputes the geometry that was not given explicitly from the
    /// control point positions, according to the plane type
    pub fn derive_from_points(&mut self, points: &[DVec3], explicit: ExplicitGeometry) {
        match self.plane_type {
            PlaneType::PointNormal => {
                if let Some(first) = points.first() {
                    if !explicit.origin {
                        self.origin = *first;
                    }
                    if !explicit.normal {
                        if let Some(second) = points.get(1) {
                            self.set_normal(*second - *first);
                        }
                    }
                }
            }
            PlaneType::ThreePoints => {
                let [p0, p1, p2] = match points {
                    [p0, p1, p2, ..] => [*p0, *p1, *p2],
                    _ => return,
                };
                let normal = (p1 - p0).cross(p2 - p0);
                if normal.length_squared() < EPSILON {
                    return;
                }
                if !explicit.origin {
                    self.origin = p0;
                }
                if !explicit.normal {
                    self.set_normal(normal);
                }
                if !explicit.x_axis {
                    self.set_x_axis(p1 - p0);
                }
            }
            PlaneType::Extents => {
                if !explicit.origin && !points.is_empty() {
                    self.origin = points.iter().copied().sum::<DVec3>() / points.len() as f64;
                }
            }
            PlaneType::Plane => {}
        }
    }

    /// Size that fits all the points projected onto the plane, centered on the origin
    pub fn auto_size(&self, points: &[DVec3]) -> [f64; 2] {
        let x_axis = self.x_axis;
        let y_axis = self.y_axis();
        let (half_width, half_height) = points.iter().fold((0.0f64, 0.0f64), |(w, h), p| {
            let local = *p - self.origin;
            (w.max(local.dot(x_axis).abs()), h.max(local.dot(y_axis).abs()))
        });
        [
            2.0 * half_width * self.auto_scaling_size_factor,
            2.0 * half_height * self.auto_scaling_size_factor,
        ]
    }

    /// Refreshes the size from control points when the size mode is automatic
    pub fn update_auto_size(&mut self, points: &[DVec3]) {
        if self.size_mode == SizeMode::Auto {
            self.size = self.auto_size(points);
        }
    }
}

/// Normalized `v`, or `None` for a zero-length vector
pub fn unit_direction(v: DVec3) -> Option<DVec3> {
    let unit = v.normalize_or_zero();
    (unit.length_squared() >= EPSILON).then_some(unit)
}

/// Normalized component of `axis` perpendicular to the unit `normal`, or
/// `None` when `axis` is parallel to it
pub fn in_plane_direction(axis: DVec3, normal: DVec3) -> Option<DVec3> {
    unit_direction(axis - normal * axis.dot(normal))
}

fn orthogonalize(axis: DVec3, normal: DVec3) -> DVec3 {
    in_plane_direction(axis, normal).unwrap_or_else(|| normal.any_orthonormal_vector())
}
