//! The host build state the coordinator works against.
//!
//! A [`Compilation`] owns the asset store and the error/warning sinks the
//! coordinator appends to. Assets are addressed by file name.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A build output file, optionally carrying its serialized source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub source: String,
    pub map: Option<String>,
}

impl Asset {
    pub fn raw(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            map: None,
        }
    }

    pub fn with_map(source: impl Into<String>, map: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            map: Some(map.into()),
        }
    }
}

/// Stable identity of an asset's content, used to key the transform cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetKey([u8; 32]);

impl AssetKey {
    pub fn of(file: &str, asset: &Asset) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file.as_bytes());
        hasher.update([0]);
        hasher.update(asset.source.as_bytes());
        hasher.update([0]);
        if let Some(map) = &asset.map {
            hasher.update([1]);
            hasher.update(map.as_bytes());
        }
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// A chunk and the files it produced.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub name: String,
    pub files: Vec<String>,
}

/// An original-source location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// An error or warning reported to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDiagnostic {
    /// The asset the diagnostic belongs to (empty for pool-level faults).
    pub file: String,
    pub message: String,
    pub origin: Option<Origin>,
}

impl BuildDiagnostic {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
            origin: None,
        }
    }

    pub fn with_origin(mut self, source: impl Into<String>, line: u32, column: u32) -> Self {
        self.origin = Some(Origin {
            source: source.into(),
            line,
            column,
        });
        self
    }
}

impl fmt::Display for BuildDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            writeln!(f, "{} from parmin", self.file)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(origin) = &self.origin {
            write!(f, " [{}:{},{}]", origin.source, origin.line, origin.column)?;
        }
        Ok(())
    }
}

/// Build state for one compilation.
#[derive(Debug, Default)]
pub struct Compilation {
    pub assets: BTreeMap<String, Asset>,
    pub chunks: Vec<Chunk>,
    /// Files emitted outside any chunk that still take part in optimization.
    pub additional_chunk_assets: Vec<String>,
    pub errors: Vec<BuildDiagnostic>,
    pub warnings: Vec<BuildDiagnostic>,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an asset and register it as a file of `chunk` (created on demand).
    pub fn emit(&mut self, chunk: &str, file: impl Into<String>, asset: Asset) {
        let file = file.into();
        self.assets.insert(file.clone(), asset);
        match self.chunks.iter_mut().find(|c| c.name == chunk) {
            Some(existing) => existing.files.push(file),
            None => self.chunks.push(Chunk {
                name: chunk.to_string(),
                files: vec![file],
            }),
        }
    }

    /// Every chunk file followed by every additional chunk asset.
    pub fn candidate_files(&self) -> Vec<String> {
        self.chunks
            .iter()
            .flat_map(|chunk| chunk.files.iter())
            .chain(self.additional_chunk_assets.iter())
            .cloned()
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Shortens absolute source paths relative to the build context.
#[derive(Debug, Clone)]
pub struct RequestShortener {
    context: PathBuf,
}

impl RequestShortener {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
        }
    }

    pub fn shorten(&self, request: &str) -> String {
        let request_path = Path::new(request);
        match request_path.strip_prefix(&self.context) {
            Ok(rest) if !rest.as_os_str().is_empty() => format!("./{}", rest.display()),
            _ => request.to_string(),
        }
    }
}
