//! Transform resolution.
//!
//! A prim's local matrix is the product of its xform ops in `xformOpOrder`
//! (glam column-vector convention, so the first op is outermost). World
//! matrices accumulate from the root down: `world = parent_world * local`.

use serde::Serialize;

use usdq_math::{Mat4, Mat4Ext, Quat, Vec3};

use crate::error::SceneResult;
use crate::usd::{Prim, PrimId, Stage, Value};

const RESET_XFORM_STACK: &str = "!resetXformStack!";
const INVERT_PREFIX: &str = "!invert!";

/// Axis order of a three-axis rotation op.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotationOrder {
    XYZ,
    XZY,
    YXZ,
    YZX,
    ZXY,
    ZYX,
}

impl RotationOrder {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "XYZ" => Some(RotationOrder::XYZ),
            "XZY" => Some(RotationOrder::XZY),
            "YXZ" => Some(RotationOrder::YXZ),
            "YZX" => Some(RotationOrder::YZX),
            "ZXY" => Some(RotationOrder::ZXY),
            "ZYX" => Some(RotationOrder::ZYX),
            _ => None,
        }
    }

    /// Axis indices (0 = X) in application order.
    fn axes(self) -> [usize; 3] {
        match self {
            RotationOrder::XYZ => [0, 1, 2],
            RotationOrder::XZY => [0, 2, 1],
            RotationOrder::YXZ => [1, 0, 2],
            RotationOrder::YZX => [1, 2, 0],
            RotationOrder::ZXY => [2, 0, 1],
            RotationOrder::ZYX => [2, 1, 0],
        }
    }
}

/// USD transform operation.
#[derive(Clone, Debug, PartialEq)]
pub enum XformOp {
    /// Translation (xformOp:translate)
    Translate(Vec3),

    /// Rotation around X axis in degrees (xformOp:rotateX)
    RotateX(f32),

    /// Rotation around Y axis in degrees (xformOp:rotateY)
    RotateY(f32),

    /// Rotation around Z axis in degrees (xformOp:rotateZ)
    RotateZ(f32),

    /// Three-axis rotation in degrees (xformOp:rotateXYZ and friends).
    Rotate(RotationOrder, Vec3),

    /// Scale (xformOp:scale)
    Scale(Vec3),

    /// Quaternion orientation (xformOp:orient)
    Orient(Quat),

    /// Full 4x4 matrix (xformOp:transform)
    Transform(Mat4),
}

impl XformOp {
    /// Build an op from its attribute name (`xformOp:scale:size`) and value.
    ///
    /// Returns `None` for unknown op kinds and values of the wrong shape.
    pub fn from_attribute(name: &str, value: &Value) -> Option<Self> {
        let kind = name.strip_prefix("xformOp:")?.split(':').next()?;
        let op = match kind {
            "translate" => XformOp::Translate(value.as_vec3()?),
            "scale" => XformOp::Scale(value.as_vec3()?),
            "rotateX" => XformOp::RotateX(value.as_f32()?),
            "rotateY" => XformOp::RotateY(value.as_f32()?),
            "rotateZ" => XformOp::RotateZ(value.as_f32()?),
            "orient" => XformOp::Orient(value.as_quat()?.normalize()),
            "transform" => XformOp::Transform(value.as_matrix()?),
            rotate => {
                let order = RotationOrder::from_suffix(rotate.strip_prefix("rotate")?)?;
                XformOp::Rotate(order, value.as_vec3()?)
            }
        };
        Some(op)
    }

    /// Convert this operation to a transformation matrix.
    pub fn to_matrix(&self) -> Mat4 {
        match self {
            XformOp::Translate(t) => Mat4::from_translation(*t),
            XformOp::RotateX(deg) => Mat4::from_rotation_x(deg.to_radians()),
            XformOp::RotateY(deg) => Mat4::from_rotation_y(deg.to_radians()),
            XformOp::RotateZ(deg) => Mat4::from_rotation_z(deg.to_radians()),
            XformOp::Rotate(order, degrees) => order.axes().iter().fold(Mat4::IDENTITY, |m, &axis| {
                let angle = degrees[axis].to_radians();
                m * match axis {
                    0 => Mat4::from_rotation_x(angle),
                    1 => Mat4::from_rotation_y(angle),
                    _ => Mat4::from_rotation_z(angle),
                }
            }),
            XformOp::Scale(s) => Mat4::from_scale(*s),
            XformOp::Orient(q) => Mat4::from_quat(*q),
            XformOp::Transform(m) => *m,
        }
    }
}

/// Compose multiple xform ops into a single matrix.
/// Applied in order: first op is outermost (applied last to a point).
pub fn compose_xform_ops(ops: &[XformOp]) -> Mat4 {
    let mut result = Mat4::IDENTITY;
    for op in ops {
        result = result * op.to_matrix();
    }
    result
}

/// The resolved op stack of one prim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct XformStack {
    pub ops: Vec<XformOp>,
    /// `!resetXformStack!`: ancestors' transforms are ignored.
    pub resets_xform_stack: bool,
}

impl XformStack {
    /// Read the op stack of `prim`. Non-xformable prims have an empty stack.
    pub fn from_prim(prim: &Prim) -> Self {
        let mut stack = XformStack::default();
        if !prim.capabilities.xformable {
            return stack;
        }

        let order: Vec<String> = match prim.value("xformOpOrder").and_then(Value::as_string_list) {
            Some(order) => order,
            None => prim
                .attributes
                .iter()
                .filter(|a| a.name.starts_with("xformOp:"))
                .map(|a| a.name.clone())
                .collect(),
        };

        for entry in &order {
            if entry == RESET_XFORM_STACK {
                stack.resets_xform_stack = true;
                stack.ops.clear();
                continue;
            }
            let (name, inverted) = match entry.strip_prefix(INVERT_PREFIX) {
                Some(name) => (name, true),
                None => (entry.as_str(), false),
            };
            let Some(value) = prim.value(name) else {
                log::debug!("{}: xform op {} has no value, using identity", prim.path, name);
                continue;
            };
            let Some(op) = XformOp::from_attribute(name, value) else {
                log::debug!("{}: cannot interpret xform op {} = {}", prim.path, name, value);
                continue;
            };
            stack.ops.push(if inverted {
                XformOp::Transform(op.to_matrix().inverse())
            } else {
                op
            });
        }
        stack
    }

    pub fn local_matrix(&self) -> Mat4 {
        compose_xform_ops(&self.ops)
    }
}

/// Local and world matrices for every prim of a stage.
pub struct XformCache {
    local: Vec<Mat4>,
    world: Vec<Mat4>,
}

impl XformCache {
    pub fn new(stage: &Stage) -> Self {
        let mut local = Vec::with_capacity(stage.len());
        let mut world: Vec<Mat4> = Vec::with_capacity(stage.len());

        // Traversal is pre-order, so a parent's world matrix is always ready.
        for prim in stage.traverse() {
            let stack = XformStack::from_prim(prim);
            let matrix = stack.local_matrix();
            let world_matrix = match prim.parent {
                Some(parent) if !stack.resets_xform_stack => world[parent.index()] * matrix,
                _ => matrix,
            };
            local.push(matrix);
            world.push(world_matrix);
        }

        Self { local, world }
    }

    pub fn local(&self, id: PrimId) -> Mat4 {
        self.local[id.index()]
    }

    pub fn world(&self, id: PrimId) -> Mat4 {
        self.world[id.index()]
    }
}

/// Local and world matrix of one prim, rows in document order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimTransform {
    pub path: String,
    pub local_transform: [[f32; 4]; 4],
    pub world_transform: [[f32; 4]; 4],
}

/// Transforms of the prim at `path`, or of every xformable prim.
pub fn prim_transforms(stage: &Stage, path: Option<&str>) -> SceneResult<Vec<PrimTransform>> {
    let prims: Vec<&Prim> = match path {
        Some(path) => vec![stage.require(path)?],
        None => stage.traverse().filter(|p| p.capabilities.xformable).collect(),
    };

    let cache = XformCache::new(stage);
    Ok(prims
        .into_iter()
        .map(|prim| PrimTransform {
            path: prim.path.clone(),
            local_transform: cache.local(prim.id).to_document_rows(),
            world_transform: cache.world(prim.id).to_document_rows(),
        })
        .collect())
}
