//! Opening and saving USDA documents.
//!
//! A [`Document`] is one parsed `.usda` file plus the layer metadata the
//! queries need (`upAxis`, `metersPerUnit`). Edits are made on the layer
//! and written back with [`Document::commit`].

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SceneError, SceneResult};
use crate::usd::parser::{parse_usda, ParseError};
use crate::usd::types::{Layer, UpAxis, Value};
use crate::usd::writer::write_usda;

/// A parsed scene file.
#[derive(Clone, Debug)]
pub struct Document {
    path: PathBuf,
    layer: Layer,
    up_axis: UpAxis,
    meters_per_unit: f64,
}

impl Document {
    /// Open and parse a USDA file.
    ///
    /// Returns [`SceneError::NotFound`] when nothing exists at `path` and
    /// [`SceneError::InvalidDocument`] when it cannot be parsed.
    pub fn open<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SceneError::NotFound(path.to_path_buf()));
        }

        let bytes = fs::read(path)?;
        let content = String::from_utf8(bytes).map_err(|_| SceneError::InvalidDocument {
            path: path.to_path_buf(),
            source: if path.extension().is_some_and(|e| e == "usdc") {
                ParseError::BinaryFormat
            } else {
                ParseError::MissingHeader
            },
        })?;

        let document = Self::from_string(&content, path)?;
        log::info!(
            "Opened {} ({} root prims, upAxis {}, metersPerUnit {})",
            path.display(),
            document.layer.root_prims.len(),
            document.up_axis,
            document.meters_per_unit
        );
        Ok(document)
    }

    /// Parse USDA text as if it had been read from `path` (useful for testing).
    pub fn from_string<P: AsRef<Path>>(content: &str, path: P) -> SceneResult<Self> {
        let path = path.as_ref().to_path_buf();
        let invalid = |source: ParseError| SceneError::InvalidDocument {
            path: path.clone(),
            source,
        };

        let layer = parse_usda(content).map_err(&invalid)?;
        let up_axis = read_up_axis(&layer).map_err(&invalid)?;
        let meters_per_unit = read_meters_per_unit(&layer).map_err(&invalid)?;

        Ok(Self {
            path,
            layer,
            up_axis,
            meters_per_unit,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    pub fn up_axis(&self) -> UpAxis {
        self.up_axis
    }

    pub fn meters_per_unit(&self) -> f64 {
        self.meters_per_unit
    }

    /// Write the layer back to the document's path.
    ///
    /// The text goes to a sibling temporary file first and is renamed over
    /// the original, so a failed write leaves the old file intact.
    pub fn commit(&self) -> SceneResult<()> {
        let text = write_usda(&self.layer);
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, text.as_bytes())?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        log::debug!("Committed {} ({} bytes)", self.path.display(), text.len());
        Ok(())
    }
}

fn read_up_axis(layer: &Layer) -> Result<UpAxis, ParseError> {
    let Some(value) = layer.metadata("upAxis") else {
        return Ok(UpAxis::default());
    };
    value
        .as_str()
        .and_then(UpAxis::from_token)
        .ok_or_else(|| ParseError::InvalidMetadata {
            key: "upAxis".into(),
            message: format!("expected \"X\", \"Y\" or \"Z\", found {}", value),
        })
}

fn read_meters_per_unit(layer: &Layer) -> Result<f64, ParseError> {
    let Some(value) = layer.metadata("metersPerUnit") else {
        return Ok(Layer::DEFAULT_METERS_PER_UNIT);
    };
    match value {
        Value::Number(n) if n.is_finite() && *n > 0.0 => Ok(*n),
        other => Err(ParseError::InvalidMetadata {
            key: "metersPerUnit".into(),
            message: format!("expected a positive number, found {}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let err = Document::open("/definitely/not/here.usda").unwrap_err();
        assert!(matches!(err, SceneError::NotFound(_)));
        assert!(err.to_string().starts_with("File not found"));
    }

    #[test]
    fn test_metadata_fallbacks() {
        let doc = Document::from_string("#usda 1.0\n", "empty.usda").unwrap();
        assert_eq!(doc.up_axis(), UpAxis::Y);
        assert_eq!(doc.meters_per_unit(), 0.01);
        assert!(doc.layer().root_prims.is_empty());
    }

    #[test]
    fn test_authored_metadata() {
        let doc = Document::from_string(
            "#usda 1.0\n(\n    metersPerUnit = 1\n    upAxis = \"Z\"\n)\n",
            "m.usda",
        )
        .unwrap();
        assert_eq!(doc.up_axis(), UpAxis::Z);
        assert_eq!(doc.meters_per_unit(), 1.0);
    }

    #[test]
    fn test_invalid_up_axis_is_rejected() {
        let err = Document::from_string("#usda 1.0\n(\n    upAxis = \"W\"\n)\n", "bad.usda")
            .unwrap_err();
        assert!(matches!(
            err,
            SceneError::InvalidDocument {
                source: ParseError::InvalidMetadata { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.usda");
        fs::write(&path, "this is not usd").unwrap();

        let err = Document::open(&path).unwrap_err();
        assert!(matches!(err, SceneError::InvalidDocument { .. }));
    }

    #[test]
    fn test_commit_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.usda");
        fs::write(&path, "#usda 1.0\n(\n    upAxis = \"Z\"\n)\n\ndef Xform \"A\"\n{\n}\n").unwrap();

        let mut doc = Document::open(&path).unwrap();
        doc.layer_mut().override_spec("/A/B");
        doc.commit().unwrap();

        let reopened = Document::open(&path).unwrap();
        assert_eq!(reopened.up_axis(), UpAxis::Z);
        assert!(reopened.layer().spec_at_path("/A/B").is_some());
        assert!(!dir.path().join("scene.usda.tmp").exists());
    }
}
