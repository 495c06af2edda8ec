//! Sequential batch import with progress reporting.

use async_stream::stream;
use futures::{Stream, StreamExt};
use hoard_import::{FormatDetails, SourceFile};
use hoard_registry::{ImportOptions, ImportedAsset, Registry};
use hoard_storage::BackendHandle;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::scan::ScannedFile;

/// A file that could not be imported, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub file: String,
    pub error: String,
}

/// Running totals for a batch, reported after every file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportProgress {
    pub total: usize,
    /// Files attempted so far, including the one just finished.
    pub current: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub current_file: Option<String>,
    pub errors: Vec<FileError>,
}
impl ImportProgress {
    fn new(total: usize) -> Self {
        Self { total, ..Self::default() }
    }

    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }
}

/// Events emitted by [`batch_import_stream`].
///
/// Ordering:
/// 1. [`Started`](Self::Started), exactly once.
/// 2. Per file, [`Imported`](Self::Imported) or [`Failed`](Self::Failed),
///    then [`Progress`](Self::Progress).
/// 3. [`Complete`](Self::Complete), exactly once.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Imported { path: PathBuf, asset: ImportedAsset<FormatDetails> },
    Failed { path: PathBuf, error: FileError },
    Progress(ImportProgress),
    Complete(ImportProgress),
}

/// Import `files` one at a time, yielding to the scheduler between files.
/// Every file is named after itself; the category and tags in `options` apply
/// to all of them.
///
/// A failure to read or import one file is recorded and the batch moves on;
/// nothing here ever ends the stream early. Dropping the stream stops the
/// batch after the file in flight.
pub fn batch_import_stream<'a>(
    backend: &'a BackendHandle,
    files: Vec<ScannedFile>,
    registry: &'a Registry,
    options: ImportOptions,
) -> impl Stream<Item = BatchEvent> + 'a {
    stream!({
        let mut progress = ImportProgress::new(files.len());
        yield BatchEvent::Started { total: progress.total };
        info!(handle = backend.name(), total = progress.total, "batch import started");

        for scanned in files {
            let name = scanned.info.file_name();
            let path = scanned.info.path;
            progress.current += 1;
            progress.current_file = Some(path.display().to_string());

            match import_one(backend, registry, &path, name, &options).await {
                Ok(asset) => {
                    progress.succeeded += 1;
                    yield BatchEvent::Imported { path, asset };
                },
                Err(message) => {
                    warn!(path = %path.display(), error = %message, "import failed");
                    let error = FileError { file: path.display().to_string(), error: message };
                    progress.failed += 1;
                    progress.errors.push(error.clone());
                    yield BatchEvent::Failed { path, error };
                },
            }
            yield BatchEvent::Progress(progress.clone());
            // Let other tasks in while a large batch grinds through.
            tokio::task::yield_now().await;
        }

        info!(succeeded = progress.succeeded, failed = progress.failed, "batch import complete");
        yield BatchEvent::Complete(progress);
    })
}

/// Errors are flattened to their message: the report outlives the error tree.
async fn import_one(
    backend: &BackendHandle,
    registry: &Registry,
    path: &Path,
    name: String,
    options: &ImportOptions,
) -> Result<ImportedAsset<FormatDetails>, String> {
    let data = backend.read(path).await.map_err(|err| (*err).to_string())?;
    let file = SourceFile::new(name, data);
    let options = ImportOptions { name: None, ..options.clone() };
    registry.import_file(file, options).await.map_err(|err| (*err).to_string())
}

/// Drive [`batch_import_stream`] to completion, calling `on_progress` after
/// every file. Returns the final totals.
pub async fn batch_import(
    backend: &BackendHandle,
    files: Vec<ScannedFile>,
    registry: &Registry,
    options: ImportOptions,
    mut on_progress: impl FnMut(&ImportProgress),
) -> ImportProgress {
    let total = files.len();
    let events = batch_import_stream(backend, files, registry, options);
    futures::pin_mut!(events);
    let mut last = ImportProgress::new(total);
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Progress(progress) => on_progress(&progress),
            BatchEvent::Complete(progress) => last = progress,
            BatchEvent::Started { .. } | BatchEvent::Imported { .. } | BatchEvent::Failed { .. } => {},
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::scan_directory;
    use hoard_import::AssetType;
    use hoard_storage::FileInfo;
    use hoard_storage::backend::MockBackend;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Arc;
    use time::UtcDateTime;

    fn png(color: [u8; 4]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(4, 4, Rgba(color)).write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn wav() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut out = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut out, spec).unwrap();
        for i in 0..800_i16 {
            writer.write_sample((i % 100) * 100).unwrap();
        }
        writer.finalize().unwrap();
        out.into_inner()
    }

    async fn registry() -> Registry {
        let registry = Registry::in_memory();
        registry.initialize().await.unwrap();
        registry
    }

    fn backend() -> BackendHandle {
        Arc::new(MockBackend::with_files([
            ("audio/blip.wav", wav()),
            ("models/broken.glb", b"definitely not glTF".to_vec()),
            ("textures/red.png", png([255, 0, 0, 255])),
            ("textures/red-copy.png", png([255, 0, 0, 255])),
            ("textures/blue.png", png([0, 0, 255, 255])),
        ]))
    }

    #[tokio::test]
    async fn test_batch_tolerates_partial_failure() {
        let backend = backend();
        let registry = registry().await;
        let files = scan_directory(&backend).await;
        let mut reports = Vec::new();
        let progress =
            batch_import(&backend, files, &registry, ImportOptions::default(), |p| reports.push(p.clone())).await;

        assert_eq!(reports.len(), 5);
        assert_eq!(reports.iter().map(|p| p.current).collect::<Vec<_>>(), [1, 2, 3, 4, 5]);
        assert!(progress.is_complete());
        assert_eq!((progress.total, progress.succeeded, progress.failed), (5, 4, 1));
        assert_eq!(progress.errors.len(), 1);
        assert_eq!(progress.errors[0].file, "models/broken.glb");
        assert!(progress.errors[0].error.contains("broken.glb"));
        assert_eq!(reports.last(), Some(&progress));

        // The copy deduplicated against the original.
        let all = registry.get_all_metadata().await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|m| m.asset_type == AssetType::Texture).count(), 2);
    }

    #[tokio::test]
    async fn test_stream_event_order() {
        let backend = backend();
        let registry = registry().await;
        let files = scan_directory(&backend).await;
        let events: Vec<_> = batch_import_stream(&backend, files, &registry, ImportOptions::default()).collect().await;

        assert!(matches!(events.first(), Some(BatchEvent::Started { total: 5 })));
        assert!(matches!(events.last(), Some(BatchEvent::Complete(p)) if p.succeeded == 4));
        // Started, then an outcome and a progress report per file, then Complete.
        assert_eq!(events.len(), 1 + 5 * 2 + 1);
        for pair in events[1..11].chunks(2) {
            assert!(matches!(pair[0], BatchEvent::Imported { .. } | BatchEvent::Failed { .. }));
            assert!(matches!(pair[1], BatchEvent::Progress(_)));
        }
        let failed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Failed { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(failed, [PathBuf::from("models/broken.glb")]);
    }

    #[tokio::test]
    async fn test_options_apply_to_every_file() {
        let backend = backend();
        let registry = registry().await;
        let files = scan_directory(&backend).await;
        let options = ImportOptions::default().with_name("ignored").with_category("pack").with_tags(["vendor"]);
        batch_import(&backend, files, &registry, options, |_| {}).await;
        let all = registry.get_all_metadata().await.unwrap();
        assert!(all.iter().all(|m| m.category == "pack" && m.tags.contains("vendor")));
        // Names still come from the files.
        assert!(all.iter().any(|m| m.name == "blip.wav"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_recorded() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let registry = registry().await;
        let ghost = ScannedFile {
            info: FileInfo::new("gone.png", 10, UtcDateTime::now()),
            asset_type: AssetType::Texture,
        };
        let progress = batch_import(&backend, vec![ghost], &registry, ImportOptions::default(), |_| {}).await;
        assert_eq!((progress.succeeded, progress.failed), (0, 1));
        assert_eq!(progress.errors[0].file, "gone.png");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let backend: BackendHandle = Arc::new(MockBackend::default());
        let registry = registry().await;
        let mut calls = 0;
        let progress = batch_import(&backend, Vec::new(), &registry, ImportOptions::default(), |_| calls += 1).await;
        assert_eq!(calls, 0);
        assert_eq!(progress, ImportProgress::default());
        assert!(progress.is_complete());
    }
}
