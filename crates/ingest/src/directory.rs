use exn::ResultExt;
use hoard_storage::BackendHandle;
use hoard_storage::backend::LocalBackend;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ErrorKind, Result};

/// Whether this target can open directory handles at all.
pub fn is_supported() -> bool {
    cfg!(not(target_family = "wasm"))
}

/// Open the directory the user picked as a read-only handle. `None` means the
/// selection was cancelled and is passed straight through.
pub fn select_directory(selection: Option<impl AsRef<Path>>) -> Result<Option<BackendHandle>> {
    let Some(selection) = selection else {
        debug!("directory selection cancelled");
        return Ok(None);
    };
    let selection = selection.as_ref();
    let root = std::path::absolute(selection).or_raise(|| ErrorKind::Directory(selection.to_path_buf()))?;
    let name = root.file_name().map_or_else(|| root.to_string_lossy(), |name| name.to_string_lossy()).into_owned();
    let backend = LocalBackend::open(name, &root).or_raise(|| ErrorKind::Directory(root.clone()))?;
    info!(root = %root.display(), "directory handle opened");
    Ok(Some(Arc::new(backend)))
}
