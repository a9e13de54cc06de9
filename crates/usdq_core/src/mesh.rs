//! Polygon mesh geometry read from `Mesh` prims.
//!
//! Faces are triangulated as fans around their first vertex. That is exact
//! for convex planar polygons; concave or warped faces come out wrong and are
//! only reported through a `debug` diagnostic.

use usdq_math::{Aabb, Vec3};

use crate::error::{SceneError, SceneResult};
use crate::usd::{Prim, PrimKind, Value};

/// Relative tolerance for the planarity check.
const PLANARITY_EPSILON: f32 = 1e-4;

/// Raw polygon data of a mesh prim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshGeometry {
    /// Vertex positions (one Vec3 per point)
    pub points: Vec<Vec3>,

    /// Number of vertices in each face
    pub face_vertex_counts: Vec<i32>,

    /// Point indices for all faces, concatenated
    pub face_vertex_indices: Vec<i32>,
}

/// Number of faces of a Mesh prim, when it authors a non-empty count array.
pub fn face_count(prim: &Prim) -> Option<usize> {
    if prim.kind != PrimKind::Mesh {
        return None;
    }
    prim.value("faceVertexCounts")
        .and_then(Value::as_list)
        .map(|counts| counts.len())
        .filter(|n| *n > 0)
}

impl MeshGeometry {
    pub fn new(
        points: Vec<Vec3>,
        face_vertex_counts: Vec<i32>,
        face_vertex_indices: Vec<i32>,
    ) -> Self {
        Self {
            points,
            face_vertex_counts,
            face_vertex_indices,
        }
    }

    /// Read the geometry of a Mesh prim.
    ///
    /// Fails with [`SceneError::NotAMesh`] for any other prim type and with
    /// [`SceneError::EmptyGeometry`] when points, counts or indices are
    /// missing or empty.
    pub fn from_prim(prim: &Prim) -> SceneResult<Self> {
        if prim.kind != PrimKind::Mesh {
            return Err(SceneError::NotAMesh(prim.path.clone()));
        }

        let points = prim.value("points").and_then(Value::as_vec3_array);
        let counts = prim.value("faceVertexCounts").and_then(Value::as_int_array);
        let indices = prim.value("faceVertexIndices").and_then(Value::as_int_array);

        match (points, counts, indices) {
            (Some(points), Some(counts), Some(indices))
                if !points.is_empty() && !counts.is_empty() && !indices.is_empty() =>
            {
                Ok(Self::new(points, counts, indices))
            }
            _ => Err(SceneError::EmptyGeometry(prim.path.clone())),
        }
    }

    /// Check the topology invariants: counts sum to the index count and
    /// every index addresses a point.
    pub fn validate(&self, path: &str) -> SceneResult<()> {
        let invalid = |reason: String| SceneError::InvalidGeometry {
            path: path.to_string(),
            reason,
        };

        if let Some(bad) = self.face_vertex_counts.iter().find(|c| **c < 0) {
            return Err(invalid(format!("negative face vertex count {}", bad)));
        }
        let total: usize = self.face_vertex_counts.iter().map(|c| *c as usize).sum();
        if total != self.face_vertex_indices.len() {
            return Err(invalid(format!(
                "face vertex counts sum to {} but there are {} indices",
                total,
                self.face_vertex_indices.len()
            )));
        }
        if let Some(bad) = self
            .face_vertex_indices
            .iter()
            .find(|i| **i < 0 || **i as usize >= self.points.len())
        {
            return Err(invalid(format!(
                "index {} out of range for {} points",
                bad,
                self.points.len()
            )));
        }
        Ok(())
    }

    pub fn face_count(&self) -> usize {
        self.face_vertex_counts.len()
    }

    /// Triangles produced by [`MeshGeometry::triangulate`]: one fewer than
    /// two per face of three or more vertices.
    pub fn triangle_count(&self) -> usize {
        self.face_vertex_counts
            .iter()
            .filter(|c| **c >= 3)
            .map(|c| *c as usize - 2)
            .sum()
    }

    /// Fan-triangulate every face.
    ///
    /// Faces with fewer than three vertices are skipped.
    pub fn triangulate(&self) -> Vec<[u32; 3]> {
        let mut triangles = Vec::with_capacity(self.triangle_count());
        let mut vertex_offset = 0usize;

        for (face, &count) in self.face_vertex_counts.iter().enumerate() {
            let count = count.max(0) as usize;
            if count < 3 {
                log::warn!("Skipping face {} with {} vertices", face, count);
                vertex_offset += count;
                continue;
            }

            // Fan triangulation: for a polygon with vertices [0, 1, 2, 3, ...n-1]
            // create triangles: (0,1,2), (0,2,3), (0,3,4), ... (0,n-2,n-1)
            let Some(face_indices) = self
                .face_vertex_indices
                .get(vertex_offset..vertex_offset + count)
            else {
                log::warn!("Face {} runs past the end of the index array", face);
                break;
            };
            for i in 1..(count - 1) {
                triangles.push([
                    face_indices[0] as u32,
                    face_indices[i] as u32,
                    face_indices[i + 1] as u32,
                ]);
            }

            vertex_offset += count;
        }

        triangles
    }

    /// Triangle corner positions, one `[v0, v1, v2]` per triangle.
    pub fn triangle_vertices(&self) -> Vec<[Vec3; 3]> {
        let mut triangles = Vec::with_capacity(self.triangle_count());

        for [i0, i1, i2] in self.triangulate() {
            match (
                self.points.get(i0 as usize),
                self.points.get(i1 as usize),
                self.points.get(i2 as usize),
            ) {
                (Some(p0), Some(p1), Some(p2)) => triangles.push([*p0, *p1, *p2]),
                _ => log::warn!(
                    "Invalid triangle indices: [{}, {}, {}], vertex count: {}",
                    i0,
                    i1,
                    i2,
                    self.points.len()
                ),
            }
        }

        triangles
    }

    /// Bounds of the points in object space.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_point_cloud(&self.points)
    }

    /// Log faces that fan triangulation will not reproduce faithfully.
    pub fn report_irregular_faces(&self, path: &str) {
        let mut offset = 0usize;
        let (mut non_planar, mut non_convex) = (0usize, 0usize);

        for &count in &self.face_vertex_counts {
            let count = count.max(0) as usize;
            let corners: Option<Vec<Vec3>> = self
                .face_vertex_indices
                .get(offset..offset + count)
                .map(|face| {
                    face.iter()
                        .filter_map(|i| self.points.get(*i as usize).copied())
                        .collect()
                });
            offset += count;

            let Some(corners) = corners.filter(|c| c.len() > 3) else {
                continue;
            };
            let (planar, convex) = face_shape(&corners);
            non_planar += usize::from(!planar);
            non_convex += usize::from(!convex);
        }

        if non_planar > 0 || non_convex > 0 {
            log::debug!(
                "{}: {} non-planar and {} non-convex faces; fan triangulation may be inaccurate",
                path,
                non_planar,
                non_convex
            );
        }
    }
}

/// Normal of a triangle: normalized `(p1 - p0) x (p2 - p0)`, or zero when
/// the triangle is degenerate.
pub fn face_normal(triangle: &[Vec3; 3]) -> Vec3 {
    let [p0, p1, p2] = *triangle;
    (p1 - p0).cross(p2 - p0).normalize_or_zero()
}

/// `(planar, convex)` for a polygon given its corners in order.
fn face_shape(corners: &[Vec3]) -> (bool, bool) {
    // Newell's method gives a stable normal for any simple polygon.
    let n = corners.len();
    let mut normal = Vec3::ZERO;
    for i in 0..n {
        let (a, b) = (corners[i], corners[(i + 1) % n]);
        normal += Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return (true, true);
    }

    let scale = Aabb::from_point_cloud(corners).size().max_element().max(f32::EPSILON);
    let planar = corners
        .iter()
        .all(|c| (*c - corners[0]).dot(normal).abs() <= PLANARITY_EPSILON * scale);

    let convex = (0..n).all(|i| {
        let (a, b, c) = (corners[i], corners[(i + 1) % n], corners[(i + 2) % n]);
        (b - a).cross(c - b).dot(normal) >= -PLANARITY_EPSILON * scale * scale
    });

    (planar, convex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usd::{Document, Stage};

    fn quad() -> MeshGeometry {
        MeshGeometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![4],
            vec![0, 1, 2, 3],
        )
    }

    #[test]
    fn test_triangulate_triangle() {
        let mesh = MeshGeometry::new(vec![Vec3::ZERO; 3], vec![3], vec![0, 1, 2]);
        assert_eq!(mesh.triangulate(), vec![[0, 1, 2]]);
    }

    #[test]
    fn test_triangulate_quad() {
        assert_eq!(quad().triangulate(), vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_triangle_count_matches_fan() {
        let mesh = MeshGeometry::new(vec![Vec3::ZERO; 6], vec![3, 4, 5, 2], vec![0; 14]);
        assert_eq!(mesh.triangle_count(), 1 + 2 + 3);
        assert_eq!(mesh.triangulate().len(), mesh.triangle_count());
    }

    #[test]
    fn test_coplanar_quad_normals_are_parallel() {
        let triangles = quad().triangle_vertices();
        assert_eq!(triangles.len(), 2);
        let n0 = face_normal(&triangles[0]);
        let n1 = face_normal(&triangles[1]);
        assert!((n0.cross(n1)).length() < 1e-6);
        assert!((n0 - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_degenerate_normal_is_zero() {
        let tri = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0];
        assert_eq!(face_normal(&tri), Vec3::ZERO);
    }

    #[test]
    fn test_validate_rejects_bad_topology() {
        let mut mesh = quad();
        assert!(mesh.validate("/Q").is_ok());

        mesh.face_vertex_counts = vec![3];
        let err = mesh.validate("/Q").unwrap_err();
        assert!(err.to_string().contains("sum to 3"), "{}", err);

        let mut mesh = quad();
        mesh.face_vertex_indices[3] = 9;
        assert!(matches!(mesh.validate("/Q"), Err(SceneError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_face_shape_detection() {
        let square = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y];
        assert_eq!(face_shape(&square), (true, true));

        let dart = [
            Vec3::ZERO,
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(1.0, 0.5, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
        ];
        assert_eq!(face_shape(&dart).1, false);

        let warped = [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.5), Vec3::Y];
        assert_eq!(face_shape(&warped).0, false);
    }

    #[test]
    fn test_from_prim_errors() {
        let doc = Document::from_string(
            r#"#usda 1.0
def Xform "NotMesh" {}
def Mesh "Hollow"
{
    point3f[] points = [(0, 0, 0)]
    int[] faceVertexCounts = []
}
def Mesh "Tri"
{
    int[] faceVertexCounts = [3]
    int[] faceVertexIndices = [0, 1, 2]
    point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)]
}
"#,
            "m.usda",
        )
        .unwrap();
        let stage = Stage::compose(&doc);

        let not_mesh = stage.get("/NotMesh").unwrap();
        assert!(matches!(MeshGeometry::from_prim(not_mesh), Err(SceneError::NotAMesh(_))));
        assert_eq!(face_count(not_mesh), None);

        let hollow = stage.get("/Hollow").unwrap();
        assert!(matches!(MeshGeometry::from_prim(hollow), Err(SceneError::EmptyGeometry(_))));
        assert_eq!(face_count(hollow), None);

        let tri = stage.get("/Tri").unwrap();
        let mesh = MeshGeometry::from_prim(tri).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(face_count(tri), Some(1));
        assert_eq!(mesh.bounds().size(), Vec3::new(1.0, 1.0, 0.0));
    }
}
