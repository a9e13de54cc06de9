// Re-export glam for convenience
pub use glam::*;

// usdq math types
mod aabb;
mod interval;
mod transform;

pub use aabb::Aabb;
use interval::Interval;
pub use transform::{transform_points, Mat4Ext};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_cross_is_perpendicular() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        let c = a.cross(b);
        assert_eq!(c, Vec3::Z);
        assert_eq!(c.dot(a), 0.0);
    }

    #[test]
    fn test_mat4_product_order() {
        // Column-vector convention: the right-hand matrix applies first.
        let t = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let s = Mat4::from_scale(Vec3::splat(2.0));
        let p = (t * s).transform_point3(Vec3::ONE);
        assert_eq!(p, Vec3::new(3.0, 2.0, 2.0));
    }
}
