//! Input set discovery and expansion
//!
//! A data root is expected to hold one subfolder per sensor. Only the `bgr`
//! folder drives frame assignment: its `.bin` files, sorted by name, form the
//! base input set that every run request replays.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sensor folder whose files define the frame sequence
pub const BGR_FOLDER: &str = "bgr";

/// Extension of per-frame input files
pub const INPUT_EXTENSION: &str = "bin";

/// Media type reported to the log for multi-sensor folders
pub const MEDIA_TYPE: &str = "multisensor";

/// Input discovery errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// The data path does not exist
    #[error("data path does not exist: {0}")]
    Missing(PathBuf),

    /// The data path is a regular file or something else
    #[error("data path is neither a directory nor a supported layout: {0}")]
    NotDirectory(PathBuf),

    /// The per-sensor layout is incomplete
    #[error("data path is missing the `{folder}` sensor folder: {root}")]
    MissingSensorFolder {
        /// Data root
        root: PathBuf,
        /// Expected folder name
        folder: &'static str,
    },

    /// Listing or resolving the folder failed
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Ordered base set of input resource identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSet {
    paths: Vec<String>,
}

impl InputSet {
    /// Build an input set from already-resolved paths
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Discover inputs below a multi-sensor data root
    ///
    /// # Errors
    ///
    /// Fails when the root is missing, is not a directory, lacks the `bgr`
    /// folder, or cannot be listed.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self, InputError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(InputError::Missing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(InputError::NotDirectory(root.to_path_buf()));
        }

        let bgr = root.join(BGR_FOLDER);
        if !bgr.is_dir() {
            return Err(InputError::MissingSensorFolder {
                root: root.to_path_buf(),
                folder: BGR_FOLDER,
            });
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| InputError::Io { path, source }
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(&bgr).map_err(io_err(&bgr))? {
            let entry = entry.map_err(io_err(&bgr))?;
            let path = entry.path();
            let is_input = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext == INPUT_EXTENSION);
            if is_input {
                files.push(path);
            }
        }
        files.sort();

        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            let absolute = std::fs::canonicalize(&file).map_err(io_err(&file))?;
            paths.push(absolute.to_string_lossy().into_owned());
        }

        if paths.is_empty() {
            tracing::warn!(root = %root.display(), "No .bin inputs found in bgr folder");
        }
        tracing::info!(
            files = paths.len(),
            root = %root.display(),
            media_type = MEDIA_TYPE,
            "Loaded inputs"
        );

        Ok(Self { paths })
    }

    /// Number of base inputs
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the base set is empty
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Base inputs in order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Expand the base set for one run request
    ///
    /// The base set is repeated `repeats` times and that block is repeated
    /// once per stream, so the result holds `len * repeats * stream_num`
    /// entries with the base order preserved inside every copy.
    pub fn expand(&self, repeats: u32, stream_num: u32) -> Arc<[String]> {
        let copies = repeats as usize * stream_num as usize;
        let mut expanded = Vec::with_capacity(self.paths.len() * copies);
        for _ in 0..copies {
            expanded.extend(self.paths.iter().cloned());
        }
        expanded.into()
    }
}
