//! File persistence for occupancy masks.
//!
//! A mask lives on disk as `<prefix>.bin` (one byte per cell) next to
//! `<prefix>_metadata.json`. The two are always read and written as a pair.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::mask::{MaskError, MaskMetadata, MaskSnapshot, OccupancyMask};

/// Paths of one buffer + metadata pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskFiles {
    pub buffer: PathBuf,
    pub metadata: PathBuf,
}

impl MaskFiles {
    /// `dir/<name>.bin` + `dir/<name>_metadata.json`
    pub fn with_prefix(dir: impl AsRef<Path>, name: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            buffer: dir.join(format!("{name}.bin")),
            metadata: dir.join(format!("{name}_metadata.json")),
        }
    }

    pub fn exists(&self) -> bool {
        self.buffer.is_file() && self.metadata.is_file()
    }

    pub fn read(&self) -> Result<OccupancyMask, MaskError> {
        let metadata: MaskMetadata = serde_json::from_slice(&fs::read(&self.metadata)?)?;
        let cells = fs::read(&self.buffer)?;
        OccupancyMask::from_snapshot(MaskSnapshot { metadata, cells })
    }

    /// Write the pair through temp files. The buffer is renamed into place
    /// first and the metadata last; the metadata checksum rejects a buffer
    /// left behind by an interrupted save.
    pub fn write(&self, mask: &OccupancyMask) -> Result<(), MaskError> {
        let snapshot = mask.snapshot();
        if let Some(parent) = self.buffer.parent() {
            fs::create_dir_all(parent)?;
        }
        let metadata = serde_json::to_vec_pretty(&snapshot.metadata)?;
        write_atomic(&self.buffer, &snapshot.cells)?;
        write_atomic(&self.metadata, &metadata)?;
        Ok(())
    }

    pub fn remove(&self) -> Result<(), MaskError> {
        for path in [&self.metadata, &self.buffer] {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MaskError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// The bundled default mask plus the user's edited copy.
#[derive(Debug, Clone)]
pub struct FileMaskStore {
    default_files: MaskFiles,
    user_files: MaskFiles,
}

impl FileMaskStore {
    pub fn new(default_files: MaskFiles, user_files: MaskFiles) -> Self {
        Self {
            default_files,
            user_files,
        }
    }

    /// Store rooted in one directory: `default_mask.*` and `user_mask.*`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            MaskFiles::with_prefix(dir, "default_mask"),
            MaskFiles::with_prefix(dir, "user_mask"),
        )
    }

    pub fn has_user_mask(&self) -> bool {
        self.user_files.exists()
    }

    /// Load the user mask when present and intact, else the default.
    pub fn load(&self) -> Result<OccupancyMask, MaskError> {
        if self.user_files.exists() {
            match self.user_files.read() {
                Ok(mask) => {
                    tracing::info!("Loaded user mask from {}", self.user_files.buffer.display());
                    return Ok(mask);
                }
                Err(err) => {
                    tracing::warn!("User mask unreadable, falling back to default: {}", err);
                }
            }
        }
        self.load_default()
    }

    pub fn load_default(&self) -> Result<OccupancyMask, MaskError> {
        let mask = self.default_files.read()?;
        tracing::info!(
            "Loaded default mask {}x{} from {}",
            mask.bounds().width,
            mask.bounds().height,
            self.default_files.buffer.display()
        );
        Ok(mask)
    }

    pub fn save(&self, mask: &OccupancyMask) -> Result<(), MaskError> {
        self.user_files.write(mask)?;
        tracing::info!("Saved user mask to {}", self.user_files.buffer.display());
        Ok(())
    }

    /// Discard user edits and return the default mask.
    pub fn reset(&self) -> Result<OccupancyMask, MaskError> {
        self.user_files.remove()?;
        self.load_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::CellKind;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "harbor_mask_store_{}_{}",
            tag,
            rand::random::<u64>()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample() -> OccupancyMask {
        OccupancyMask::from_rows(50.0, 26.03, 0.01, &["#~~", "##~", "###"]).unwrap()
    }

    #[test]
    fn load_prefers_user_mask_and_reset_discards_it() {
        let dir = temp_dir("prefer");
        let store = FileMaskStore::in_dir(&dir);
        MaskFiles::with_prefix(&dir, "default_mask").write(&sample()).unwrap();

        assert!(!store.has_user_mask());
        assert_eq!(store.load().unwrap(), sample());

        let mut edited = sample();
        edited.set_cell(2, 0, CellKind::Water).unwrap();
        store.save(&edited).unwrap();
        assert!(store.has_user_mask());
        assert_eq!(store.load().unwrap(), edited);

        assert_eq!(store.reset().unwrap(), sample());
        assert!(!store.has_user_mask());
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn grown_mask_round_trips_with_its_bounds() {
        let dir = temp_dir("grown");
        let store = FileMaskStore::in_dir(&dir);
        let mut mask = sample();
        mask.paint_circular_brush(50.2, 26.2, 1, CellKind::Water).unwrap();
        store.save(&mask).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.bounds(), mask.bounds());
        assert!(loaded.is_navigable(50.2, 26.2));
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn mismatched_user_pair_falls_back_to_default() {
        let dir = temp_dir("mismatch");
        let store = FileMaskStore::in_dir(&dir);
        MaskFiles::with_prefix(&dir, "default_mask").write(&sample()).unwrap();
        let user = MaskFiles::with_prefix(&dir, "user_mask");
        user.write(&sample()).unwrap();
        // stale buffer from a different grid
        fs::write(&user.buffer, [1u8; 4]).unwrap();

        assert!(user.read().is_err());
        assert_eq!(store.load().unwrap(), sample());
        fs::remove_dir_all(dir).ok();
    }
}
