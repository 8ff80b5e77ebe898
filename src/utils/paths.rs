// Deterministic on-disk layout for session files
//
// static/
//   input/    face_<session>.<ext>, target_<session>.jpg   (temporary)
//   mask/     mask_<session>.<ext>                         (temporary)
//   results/  <session>_<i>.jpg, faceswap_<session>.jpg    (kept, served)
// logs/       generation_<YYYYMMDD>.json

use std::path::{Path, PathBuf};

use crate::core::config::StorageConfig;
use crate::core::types::SessionId;

/// URL prefix the static directory is mounted under
pub const STATIC_URL_PREFIX: &str = "/static";

/// Every file the service writes for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind<'a> {
    FaceInput { extension: &'a str },
    MaskInput { extension: &'a str },
    TargetInput,
    Result { index: usize },
    FaceSwapResult,
}

impl ArtifactKind<'_> {
    fn subdir(&self) -> &'static str {
        match self {
            ArtifactKind::FaceInput { .. } | ArtifactKind::TargetInput => "input",
            ArtifactKind::MaskInput { .. } => "mask",
            ArtifactKind::Result { .. } | ArtifactKind::FaceSwapResult => "results",
        }
    }

    fn file_name(&self, session: &SessionId) -> String {
        match self {
            ArtifactKind::FaceInput { extension } => format!("face_{}.{}", session, extension),
            ArtifactKind::MaskInput { extension } => format!("mask_{}.{}", session, extension),
            ArtifactKind::TargetInput => format!("target_{}.jpg", session),
            ArtifactKind::Result { index } => format!("{}_{}.jpg", session, index),
            ArtifactKind::FaceSwapResult => format!("faceswap_{}.jpg", session),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageLayout {
    static_dir: PathBuf,
    logs_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(static_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            logs_dir: logs_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.static_dir, &config.logs_dir)
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn input_dir(&self) -> PathBuf {
        self.static_dir.join("input")
    }

    pub fn mask_dir(&self) -> PathBuf {
        self.static_dir.join("mask")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.static_dir.join("results")
    }

    /// Filesystem path of a session artifact
    pub fn path(&self, kind: ArtifactKind<'_>, session: &SessionId) -> PathBuf {
        self.static_dir
            .join(kind.subdir())
            .join(kind.file_name(session))
    }

    /// URL under which the static mount serves a session artifact
    pub fn public_url(&self, kind: ArtifactKind<'_>, session: &SessionId) -> String {
        format!(
            "{}/{}/{}",
            STATIC_URL_PREFIX,
            kind.subdir(),
            kind.file_name(session)
        )
    }

    /// URL of an arbitrary file in the results directory
    pub fn result_url(&self, file_name: &str) -> String {
        format!("{}/results/{}", STATIC_URL_PREFIX, file_name)
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.input_dir(),
            self.mask_dir(),
            self.results_dir(),
            self.logs_dir.clone(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_deterministic() {
        let layout = StorageLayout::new("static", "logs");
        let session = SessionId::from("abc");

        assert_eq!(
            layout.path(ArtifactKind::FaceInput { extension: "png" }, &session),
            PathBuf::from("static/input/face_abc.png")
        );
        assert_eq!(
            layout.path(ArtifactKind::MaskInput { extension: "webp" }, &session),
            PathBuf::from("static/mask/mask_abc.webp")
        );
        assert_eq!(
            layout.path(ArtifactKind::TargetInput, &session),
            PathBuf::from("static/input/target_abc.jpg")
        );
        assert_eq!(
            layout.path(ArtifactKind::Result { index: 2 }, &session),
            PathBuf::from("static/results/abc_2.jpg")
        );
        assert_eq!(
            layout.path(ArtifactKind::FaceSwapResult, &session),
            PathBuf::from("static/results/faceswap_abc.jpg")
        );
    }

    #[test]
    fn test_public_urls() {
        let layout = StorageLayout::new("/var/lib/storymaker/static", "logs");
        let session = SessionId::from("abc");

        assert_eq!(
            layout.public_url(ArtifactKind::Result { index: 0 }, &session),
            "/static/results/abc_0.jpg"
        );
        assert_eq!(layout.result_url("x.jpg"), "/static/results/x.jpg");
    }

    #[tokio::test]
    async fn test_ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(dir.path().join("static"), dir.path().join("logs"));

        layout.ensure_dirs().await.unwrap();
        // Idempotent
        layout.ensure_dirs().await.unwrap();

        assert!(layout.input_dir().is_dir());
        assert!(layout.mask_dir().is_dir());
        assert!(layout.results_dir().is_dir());
        assert!(layout.logs_dir().is_dir());
    }
}
