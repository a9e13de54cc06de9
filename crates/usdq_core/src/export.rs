//! Mesh export to binary STL and Wavefront OBJ.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use usdq_math::Vec3;

use crate::error::{SceneError, SceneResult};
use crate::mesh::{face_normal, MeshGeometry};

/// Size of the binary STL header.
pub const STL_HEADER_LEN: usize = 80;
/// Size of one binary STL triangle record.
pub const STL_RECORD_LEN: usize = 50;

/// Output file format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Stl,
    Obj,
}

impl FromStr for ExportFormat {
    type Err = SceneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stl" => Ok(ExportFormat::Stl),
            "obj" => Ok(ExportFormat::Obj),
            _ => Err(SceneError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Stl => "stl",
            ExportFormat::Obj => "obj",
        })
    }
}

/// Expected size of a binary STL holding `triangles` triangles.
pub fn stl_size(triangles: usize) -> u64 {
    (STL_HEADER_LEN + 4 + STL_RECORD_LEN * triangles) as u64
}

fn write_vec3<W: Write>(w: &mut W, v: Vec3) -> io::Result<()> {
    w.write_all(&v.x.to_le_bytes())?;
    w.write_all(&v.y.to_le_bytes())?;
    w.write_all(&v.z.to_le_bytes())
}

/// Binary STL: zero header, little-endian triangle count, then per triangle
/// the normal, three corners and a zero attribute word.
pub fn write_stl<W: Write>(w: &mut W, triangles: &[[Vec3; 3]]) -> io::Result<()> {
    let count = u32::try_from(triangles.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many triangles for STL"))?;

    w.write_all(&[0u8; STL_HEADER_LEN])?;
    w.write_all(&count.to_le_bytes())?;
    for triangle in triangles {
        write_vec3(w, face_normal(triangle))?;
        for corner in triangle {
            write_vec3(w, *corner)?;
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// OBJ text: a source comment, every point, then 1-based faces.
pub fn write_obj<W: Write>(
    w: &mut W,
    source: &str,
    points: &[Vec3],
    triangles: &[[u32; 3]],
) -> io::Result<()> {
    write!(w, "# Exported from {}", source)?;
    for p in points {
        write!(w, "\nv {} {} {}", p.x, p.y, p.z)?;
    }
    for [a, b, c] in triangles {
        write!(w, "\nf {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

/// Outcome of writing one mesh to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    pub triangles: usize,
    pub size_bytes: u64,
}

/// Validate, triangulate and write `mesh` to `output`.
///
/// `source` names the prim in the OBJ header comment.
pub fn export_geometry(
    mesh: &MeshGeometry,
    source: &str,
    output: &Path,
    format: ExportFormat,
) -> SceneResult<ExportSummary> {
    mesh.validate(source)?;
    mesh.report_irregular_faces(source);

    let mut writer = BufWriter::new(File::create(output)?);
    let triangles = match format {
        ExportFormat::Stl => {
            let triangles = mesh.triangle_vertices();
            write_stl(&mut writer, &triangles)?;
            triangles.len()
        }
        ExportFormat::Obj => {
            let triangles = mesh.triangulate();
            write_obj(&mut writer, source, &mesh.points, &triangles)?;
            triangles.len()
        }
    };
    writer.flush()?;
    drop(writer);

    let size_bytes = std::fs::metadata(output)?.len();
    log::info!(
        "Exported {} ({} triangles, {} bytes) to {}",
        source,
        triangles,
        size_bytes,
        output.display()
    );
    Ok(ExportSummary { triangles, size_bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> MeshGeometry {
        let points = vec![
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        let indices = vec![
            0, 3, 2, 1, // bottom
            4, 5, 6, 7, // top
            0, 1, 5, 4, // front
            2, 3, 7, 6, // back
            0, 4, 7, 3, // left
            1, 2, 6, 5, // right
        ];
        MeshGeometry::new(points, vec![4; 6], indices)
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("stl".parse::<ExportFormat>().unwrap(), ExportFormat::Stl);
        assert_eq!("OBJ".parse::<ExportFormat>().unwrap(), ExportFormat::Obj);
        assert!(matches!(
            "fbx".parse::<ExportFormat>(),
            Err(SceneError::UnsupportedFormat(_))
        ));
        assert_eq!(serde_json::to_value(ExportFormat::Obj).unwrap(), "obj");
    }

    #[test]
    fn test_stl_layout() {
        let tri = [[Vec3::ZERO, Vec3::X, Vec3::Y]];
        let mut bytes = Vec::new();
        write_stl(&mut bytes, &tri).unwrap();

        assert_eq!(bytes.len() as u64, stl_size(1));
        assert!(bytes[..80].iter().all(|b| *b == 0));
        assert_eq!(&bytes[80..84], &1u32.to_le_bytes());
        // Normal is +Z.
        assert_eq!(&bytes[84..88], &0f32.to_le_bytes());
        assert_eq!(&bytes[92..96], &1f32.to_le_bytes());
        // Second corner is +X; attribute word is zero.
        assert_eq!(&bytes[108..112], &1f32.to_le_bytes());
        assert_eq!(&bytes[132..134], &[0, 0]);
    }

    #[test]
    fn test_obj_text() {
        let points = [Vec3::ZERO, Vec3::X, Vec3::new(0.0, 1.5, 0.0)];
        let mut out = Vec::new();
        write_obj(&mut out, "/Tri", &points, &[[0, 1, 2]]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "# Exported from /Tri\nv 0 0 0\nv 1 0 0\nv 0 1.5 0\nf 1 2 3");
    }

    #[test]
    fn test_unit_box_stl_is_684_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("box.stl");

        let summary = export_geometry(&unit_box(), "/Box", &output, ExportFormat::Stl).unwrap();
        assert_eq!(summary.triangles, 12);
        assert_eq!(summary.size_bytes, 684);
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 684);
    }

    #[test]
    fn test_unit_box_obj() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("box.obj");

        let summary = export_geometry(&unit_box(), "/Box", &output, ExportFormat::Obj).unwrap();
        assert_eq!(summary.triangles, 12);

        let text = std::fs::read_to_string(&output).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 8);
        assert_eq!(text.lines().filter(|l| l.starts_with("f ")).count(), 12);
        assert!(text.starts_with("# Exported from /Box\n"));
        assert_eq!(summary.size_bytes, text.len() as u64);
    }

    #[test]
    fn test_invalid_geometry_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("bad.stl");
        let mut mesh = unit_box();
        mesh.face_vertex_indices.pop();

        let err = export_geometry(&mesh, "/Box", &output, ExportFormat::Stl).unwrap_err();
        assert!(matches!(err, SceneError::InvalidGeometry { .. }));
        assert!(!output.exists());
    }
}
