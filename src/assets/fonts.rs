use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::DataraceResult;

const REGULAR_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Font files used for chart text: a regular face and an optional bold face.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontFiles {
    /// Regular weight face.
    pub regular: PathBuf,
    /// Bold face; the regular face is used for bold text when absent.
    pub bold: Option<PathBuf>,
}

/// Raw bytes of a [`FontFiles`] pair.
#[derive(Clone, Debug)]
pub struct FontBytes {
    /// Regular weight face.
    pub regular: Vec<u8>,
    /// Bold face.
    pub bold: Option<Vec<u8>>,
}

impl FontFiles {
    /// Explicit paths.
    pub fn new(regular: impl Into<PathBuf>, bold: Option<PathBuf>) -> Self {
        Self {
            regular: regular.into(),
            bold,
        }
    }

    /// Find usable fonts: `DATARACE_FONT` / `DATARACE_BOLD_FONT` first, then well-known system
    /// locations.
    pub fn discover() -> Option<Self> {
        let env_path = |key: &str| {
            std::env::var_os(key)
                .map(PathBuf::from)
                .filter(|p| p.is_file())
        };

        let regular = env_path("DATARACE_FONT").or_else(|| first_existing(REGULAR_CANDIDATES))?;
        let bold = env_path("DATARACE_BOLD_FONT").or_else(|| first_existing(BOLD_CANDIDATES));
        tracing::debug!(regular = %regular.display(), bold = ?bold, "discovered fonts");
        Some(Self { regular, bold })
    }

    /// Read both files.
    pub fn load(&self) -> DataraceResult<FontBytes> {
        let regular = read_font(&self.regular)?;
        let bold = self.bold.as_deref().map(read_font).transpose()?;
        Ok(FontBytes { regular, bold })
    }
}

fn first_existing(candidates: &[&str]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn read_font(path: &Path) -> DataraceResult<Vec<u8>> {
    Ok(std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?)
}
