//! Scene-wide counts and world-space bounds.

use serde::Serialize;

use usdq_math::{transform_points, Aabb, Mat4Ext, Vec3};

use crate::mesh::face_count;
use crate::usd::{Prim, PrimKind, Shape, Stage, Value};
use crate::xform::XformCache;

/// Prim, mesh, material and face totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SceneCounts {
    pub prim_count: usize,
    pub mesh_count: usize,
    pub material_count: usize,
    pub total_faces: usize,
}

/// Count every traversed prim (the pseudo-root is not a prim).
pub fn count_prims(stage: &Stage) -> SceneCounts {
    stage.traverse().fold(SceneCounts::default(), |mut counts, prim| {
        counts.prim_count += 1;
        match prim.kind {
            PrimKind::Mesh => {
                counts.mesh_count += 1;
                counts.total_faces += face_count(prim).unwrap_or(0);
            }
            PrimKind::Material => counts.material_count += 1,
            _ => {}
        }
        counts
    })
}

/// Object-space extent of an intrinsic shape from its schema attributes.
fn shape_extent(prim: &Prim, shape: Shape) -> Aabb {
    let number = |name: &str, fallback: f32| {
        prim.value(name).and_then(Value::as_f32).unwrap_or(fallback)
    };
    let axis = match prim.value("axis").and_then(Value::as_str) {
        Some("X") => 0,
        Some("Y") => 1,
        _ => 2,
    };
    // Radial half-size on the two other axes, axial half-size along `axis`.
    let along_axis = |radial: f32, axial: f32| {
        let mut half = Vec3::splat(radial);
        half[axis] = axial;
        Aabb::from_points(-half, half)
    };

    match shape {
        Shape::Cube => {
            let half = number("size", 2.0) * 0.5;
            Aabb::from_points(Vec3::splat(-half), Vec3::splat(half))
        }
        Shape::Sphere => {
            let r = number("radius", 1.0);
            Aabb::from_points(Vec3::splat(-r), Vec3::splat(r))
        }
        Shape::Cylinder | Shape::Cone => {
            along_axis(number("radius", 1.0), number("height", 2.0) * 0.5)
        }
        Shape::Capsule => {
            let r = number("radius", 0.5);
            along_axis(r, number("height", 1.0) * 0.5 + r)
        }
        Shape::Plane => {
            let (w, l) = (number("width", 2.0) * 0.5, number("length", 2.0) * 0.5);
            let half = match axis {
                0 => Vec3::new(0.0, w, l),
                1 => Vec3::new(w, 0.0, l),
                _ => Vec3::new(w, l, 0.0),
            };
            Aabb::from_points(-half, half)
        }
    }
}

/// World-space bounds of one prim's own geometry (not its children).
fn prim_bounds(prim: &Prim, xforms: &XformCache) -> Aabb {
    if !prim.capabilities.boundable {
        return Aabb::EMPTY;
    }
    let world = xforms.world(prim.id);

    if let Some(points) = prim.value("points").and_then(Value::as_vec3_array) {
        return transform_points(&world, &points);
    }
    if let Some([lo, hi]) = prim
        .value("extent")
        .and_then(Value::as_vec3_array)
        .and_then(|e| <[Vec3; 2]>::try_from(e).ok())
    {
        return world.transform_aabb(&Aabb::from_points(lo, hi));
    }
    match prim.kind {
        PrimKind::Shape(shape) => world.transform_aabb(&shape_extent(prim, shape)),
        _ => Aabb::EMPTY,
    }
}

/// Union of the world-space bounds of every visible, default-purpose prim.
///
/// `visibility = "invisible"` and non-default `purpose` hide a whole subtree.
pub fn world_bounds(stage: &Stage, xforms: &XformCache) -> Aabb {
    let mut hidden: Vec<bool> = Vec::with_capacity(stage.len());
    let mut bounds = Aabb::EMPTY;

    for prim in stage.traverse() {
        let invisible = prim.value("visibility").and_then(Value::as_str) == Some("invisible");
        let off_purpose = prim
            .value("purpose")
            .and_then(Value::as_str)
            .is_some_and(|p| p != "default");
        let inherited = prim.parent.is_some_and(|p| hidden[p.index()]);
        let is_hidden = inherited || invisible || off_purpose;
        hidden.push(is_hidden);

        if !is_hidden {
            bounds = Aabb::surrounding(&bounds, &prim_bounds(prim, xforms));
        }
    }
    bounds
}

/// Extent of `bounds` in millimeters, each axis rounded to one decimal.
pub fn extents_mm(bounds: &Aabb, meters_per_unit: f64) -> [f64; 3] {
    let size = bounds.size();
    let scale = 1000.0 * meters_per_unit;
    [size.x, size.y, size.z].map(|s| (s as f64 * scale * 10.0).round() / 10.0)
}
