//! Icon loading for HELO and NOTIFICATION packets.
//!
//! The icon file is sent verbatim; the receiver decodes it.  The format byte
//! is taken from the file's magic number, or from its extension when the
//! magic number is not recognised.  Any failure degrades to "no icon" so a
//! broken icon path never stops the client from connecting.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use xbmc_events_core::protocol::IconType;

/// Reasons an icon file could not be used.
#[derive(Debug, Error)]
pub enum IconError {
    #[error("failed to read icon {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("icon {0} is empty")]
    Empty(PathBuf),

    #[error("icon {0} is not a JPEG, PNG or GIF image")]
    UnsupportedFormat(PathBuf),
}

/// Detects the image format from the first bytes of the file.
pub fn sniff_icon_type(bytes: &[u8]) -> IconType {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        IconType::Png
    } else if bytes.starts_with(&[0xFF, 0xD8]) {
        IconType::Jpeg
    } else if bytes.starts_with(b"GIF8") {
        IconType::Gif
    } else {
        IconType::None
    }
}

/// Reads an icon file and determines its format.
///
/// # Errors
///
/// Returns [`IconError`] if the file cannot be read, is empty, or is neither
/// recognisable by content nor by extension.
pub fn read_icon(path: &Path) -> Result<(IconType, Vec<u8>), IconError> {
    let bytes = std::fs::read(path).map_err(|source| IconError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(IconError::Empty(path.to_path_buf()));
    }

    let icon_type = match sniff_icon_type(&bytes) {
        IconType::None => path
            .extension()
            .and_then(|e| e.to_str())
            .map(IconType::from_extension)
            .unwrap_or_default(),
        sniffed => sniffed,
    };
    if icon_type == IconType::None {
        return Err(IconError::UnsupportedFormat(path.to_path_buf()));
    }

    debug!(path = %path.display(), ?icon_type, bytes = bytes.len(), "icon loaded");
    Ok((icon_type, bytes))
}

/// Loads the icon at `path`, or returns `(IconType::None, [])` if there is no
/// path or the icon cannot be used.
pub fn load_icon(path: Option<&Path>) -> (IconType, Vec<u8>) {
    let Some(path) = path else {
        return (IconType::None, Vec::new());
    };
    match read_icon(path) {
        Ok(icon) => icon,
        Err(e) => {
            warn!("{e}; continuing without an icon");
            (IconType::None, Vec::new())
        }
    }
}
