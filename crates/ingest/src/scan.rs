use futures::StreamExt;
use hoard_import::AssetType;
use hoard_storage::{BackendHandle, FileInfo};
use tracing::{info, instrument, trace, warn};

/// A file the registry knows how to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub info: FileInfo,
    pub asset_type: AssetType,
}

/// Per-type counts of a scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTypeStats {
    pub model: usize,
    pub audio: usize,
    pub hdr: usize,
    pub texture: usize,
}
impl FileTypeStats {
    pub fn total(&self) -> usize {
        self.model + self.audio + self.hdr + self.texture
    }
}

/// Walk everything below the handle's root and keep the files with a known
/// asset extension, sorted by path.
///
/// Unknown extensions are skipped silently. Entries that can't be inspected
/// are logged and skipped; they never fail the scan.
#[instrument(skip_all, fields(handle = backend.name()))]
pub async fn scan_directory(backend: &BackendHandle) -> Vec<ScannedFile> {
    let mut files = Vec::new();
    let mut entries = backend.list_stream();
    while let Some(entry) = entries.next().await {
        let info = match entry {
            Ok(info) => info,
            Err(err) => {
                warn!(error = ?err, "skipping unreadable directory entry");
                continue;
            },
        };
        match info.extension().as_deref().and_then(AssetType::from_extension) {
            Some(asset_type) => files.push(ScannedFile { info, asset_type }),
            None => trace!(path = %info.path.display(), "not an asset file"),
        }
    }
    files.sort_by(|a, b| a.info.path.cmp(&b.info.path));
    info!(files = files.len(), "directory scanned");
    files
}

pub fn file_type_stats(files: &[ScannedFile]) -> FileTypeStats {
    files.iter().fold(FileTypeStats::default(), |mut stats, file| {
        match file.asset_type {
            AssetType::Model => stats.model += 1,
            AssetType::Audio => stats.audio += 1,
            AssetType::Hdr => stats.hdr += 1,
            AssetType::Texture => stats.texture += 1,
        }
        stats
    })
}
