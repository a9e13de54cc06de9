// Transform utilities for Mat4
//
// glam is column-major with column vectors; scene documents write matrices
// row-major with row vectors. The two layouts share the same 16 numbers, so
// a glam column is a document row.

use glam::{Mat4, Vec3};
use crate::Aabb;

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Build a matrix from document-order rows (translation in the last row).
    fn from_document_rows(rows: [[f32; 4]; 4]) -> Mat4;

    /// Rows in document order (translation in the last row).
    fn to_document_rows(&self) -> [[f32; 4]; 4];

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl Mat4Ext for Mat4 {
    fn from_document_rows(rows: [[f32; 4]; 4]) -> Mat4 {
        Mat4::from_cols_array_2d(&rows)
    }

    fn to_document_rows(&self) -> [[f32; 4]; 4] {
        self.to_cols_array_2d()
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        aabb.corners()
            .iter()
            .fold(Aabb::EMPTY, |acc, &corner| acc.include_point(self.transform_point3(corner)))
    }
}

/// Bounds of `points` after transforming each one by `matrix`.
pub fn transform_points(matrix: &Mat4, points: &[Vec3]) -> Aabb {
    points
        .iter()
        .fold(Aabb::EMPTY, |acc, p| acc.include_point(matrix.transform_point3(*p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_rows_put_translation_last() {
        let mat = Mat4::from_translation(Vec3::new(0.0, 75.0, 0.0));
        let rows = mat.to_document_rows();

        assert_eq!(rows[3], [0.0, 75.0, 0.0, 1.0]);
        assert_eq!(rows[0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(Mat4::from_document_rows(rows), mat);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = Mat4::from_translation(Vec3::new(5.0, 5.0, 5.0));
        let aabb = Aabb::from_points(Vec3::ZERO, Vec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min() - Vec3::new(5.0, 5.0, 5.0)).length() < 0.001);
        assert!((transformed.max() - Vec3::new(6.0, 6.0, 6.0)).length() < 0.001);
    }

    #[test]
    fn test_transform_aabb_rotation_grows_box() {
        let mat = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let aabb = Aabb::from_points(Vec3::splat(-1.0), Vec3::splat(1.0));
        let size = mat.transform_aabb(&aabb).size();

        assert!((size.x - 2.0 * std::f32::consts::SQRT_2).abs() < 0.001);
        assert!((size.z - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_transform_empty_aabb_stays_empty() {
        let mat = Mat4::from_scale(Vec3::splat(3.0));
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }

    #[test]
    fn test_transform_points() {
        let mat = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let bounds = transform_points(&mat, &[Vec3::ZERO, Vec3::ONE]);
        assert_eq!(bounds.size(), Vec3::new(2.0, 1.0, 1.0));
    }
}
