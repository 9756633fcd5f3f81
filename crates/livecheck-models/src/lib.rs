//! Landmark model assets and their integrity check.
//!
//! A model directory carries a `manifest.toml` naming every asset the
//! landmark source loads, each with its SHA-256:
//!
//! ```toml
//! [[model]]
//! name = "face_landmark_68_model.bin"
//! sha256 = "…"
//! url = "https://…"   # optional, used by `livecheck setup`
//! ```
//!
//! A session refuses to start unless every listed asset is present and
//! matches.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "manifest.toml";

/// One model asset: file name relative to the model directory, its digest,
/// and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub sha256: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ModelFile {
    /// Whether `name` is a plain relative path that stays inside the model
    /// directory.
    pub fn has_safe_name(&self) -> bool {
        let path = Path::new(&self.name);
        !self.name.is_empty()
            && path
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
    }

    /// Whether the file at `path` exists and matches the expected digest.
    pub fn is_present(&self, path: &Path) -> bool {
        verify_file_sha256(&self.name, path, &self.sha256).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Manifest {
    #[serde(rename = "model", default)]
    pub models: Vec<ModelFile>,
}

#[derive(Error, Debug)]
pub enum ModelIntegrityError {
    #[error("model manifest not found: {0}")]
    MissingManifest(PathBuf),

    #[error("invalid model manifest: {path}: {source}")]
    InvalidManifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("model manifest entry escapes the model directory: {name} ({path})")]
    UnsafeName { name: String, path: PathBuf },

    #[error("model manifest lists no models: {0}")]
    EmptyManifest(PathBuf),

    #[error("model file not found: {name} ({path})")]
    MissingModel { name: String, path: PathBuf },

    #[error("failed to open model file: {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model file: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "model checksum mismatch for {name} ({path})\n  expected: {expected}\n  got:      {got}"
    )]
    ChecksumMismatch {
        name: String,
        path: PathBuf,
        expected: String,
        got: String,
    },
}

/// Compute SHA-256 hex digest of a file.
pub fn sha256_file_hex(path: &Path) -> Result<String, ModelIntegrityError> {
    let mut file = fs::File::open(path).map_err(|source| ModelIntegrityError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|source| ModelIntegrityError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

pub fn verify_file_sha256(
    name: &str,
    path: &Path,
    expected_sha256: &str,
) -> Result<(), ModelIntegrityError> {
    if !path.exists() {
        return Err(ModelIntegrityError::MissingModel {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }

    let digest = sha256_file_hex(path)?;
    if !digest.eq_ignore_ascii_case(expected_sha256.trim()) {
        return Err(ModelIntegrityError::ChecksumMismatch {
            name: name.to_string(),
            path: path.to_path_buf(),
            expected: expected_sha256.to_string(),
            got: digest,
        });
    }

    Ok(())
}

/// Read and parse `manifest.toml` from `model_dir`.
pub fn load_manifest(model_dir: &Path) -> Result<Manifest, ModelIntegrityError> {
    let path = model_dir.join(MANIFEST_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ModelIntegrityError::MissingManifest(path));
        }
        Err(source) => return Err(ModelIntegrityError::Read { path, source }),
    };
    let manifest: Manifest = toml::from_str(&text)
        .map_err(|source| ModelIntegrityError::InvalidManifest {
            path: path.clone(),
            source,
        })?;
    if manifest.models.is_empty() {
        return Err(ModelIntegrityError::EmptyManifest(path));
    }
    if let Some(model) = manifest.models.iter().find(|m| !m.has_safe_name()) {
        return Err(ModelIntegrityError::UnsafeName {
            name: model.name.clone(),
            path,
        });
    }
    Ok(manifest)
}

/// Verify every asset listed in the directory's manifest.
pub fn verify_models_dir(model_dir: &Path) -> Result<Manifest, ModelIntegrityError> {
    let manifest = load_manifest(model_dir)?;
    for model in &manifest.models {
        let path = model_dir.join(&model.name);
        verify_file_sha256(&model.name, &path, &model.sha256)?;
    }

    Ok(manifest)
}
