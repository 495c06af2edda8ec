use exn::{OptionExt, ResultExt};
use futures::StreamExt;
use hoard_import::{AssetType, SourceFile};
use hoard_ingest::{BatchEvent, FileError, batch_import_stream, file_type_stats, scan_directory, select_directory};
use hoard_registry::{AssetMetadata, ImportOptions, QueryFilter, Registry};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::instrument;

use crate::args::{Command, ImportArgs, ListArgs};
use crate::error::{ErrorKind, Result};

pub async fn run(registry: &Registry, command: Command) -> Result<()> {
    match command {
        Command::Import { paths, options } => import(registry, &paths, options).await,
        Command::List(args) => list(registry, args).await,
        Command::Show { id } => show(registry, &id).await,
        Command::Export { id, dest } => export(registry, &id, &dest).await,
        Command::Delete { ids } => delete(registry, &ids).await,
        Command::Stats => stats(registry).await,
        Command::Clear { yes } => clear(registry, yes).await,
    }
}

#[derive(Debug, Default)]
struct Summary {
    imported: usize,
    deduplicated: usize,
    errors: Vec<FileError>,
}
impl Summary {
    fn record(&mut self, deduplicated: bool) {
        if deduplicated {
            self.deduplicated += 1;
        } else {
            self.imported += 1;
        }
    }

    fn print(&self) {
        println!(
            "{} imported, {} already registered, {} failed",
            self.imported,
            self.deduplicated,
            self.errors.len()
        );
        for error in &self.errors {
            println!("  {}: {}", error.file, error.error);
        }
    }
}

fn import_options(args: ImportArgs) -> ImportOptions {
    let mut options = ImportOptions::default();
    if let Some(category) = args.category {
        options = options.with_category(category);
    }
    if !args.tags.is_empty() {
        options = options.with_tags(args.tags);
    }
    options
}

#[instrument(skip_all)]
async fn import(registry: &Registry, paths: &[PathBuf], args: ImportArgs) -> Result<()> {
    let options = import_options(args);
    let mut summary = Summary::default();
    for path in paths {
        let metadata = tokio::fs::metadata(path).await.or_raise(|| ErrorKind::Read(path.clone()))?;
        if metadata.is_dir() {
            import_directory(registry, path, &options, &mut summary).await?;
        } else {
            import_file(registry, path, &options, &mut summary).await?;
        }
    }
    summary.print();
    Ok(())
}

async fn import_file(registry: &Registry, path: &Path, options: &ImportOptions, summary: &mut Summary) -> Result<()> {
    let data = tokio::fs::read(path).await.or_raise(|| ErrorKind::Read(path.to_path_buf()))?;
    let name = path.file_name().map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy());
    let file = SourceFile::new(name, data);
    match registry.import_file(file, options.clone()).await {
        Ok(asset) => {
            summary.record(asset.deduplicated);
            println!("{}  {}", asset.id, path.display());
        },
        // Stop on anything the next file would hit too.
        Err(err) if !matches!(*err, hoard_registry::error::ErrorKind::Import(_)) => {
            return Err(err).or_raise(|| ErrorKind::Registry);
        },
        Err(err) => summary.errors.push(FileError { file: path.display().to_string(), error: (*err).to_string() }),
    }
    Ok(())
}

async fn import_directory(
    registry: &Registry,
    path: &Path,
    options: &ImportOptions,
    summary: &mut Summary,
) -> Result<()> {
    let backend = select_directory(Some(path))
        .or_raise(|| ErrorKind::Directory(path.to_path_buf()))?
        .ok_or_raise(|| ErrorKind::Directory(path.to_path_buf()))?;
    let files = scan_directory(&backend).await;
    let stats = file_type_stats(&files);
    println!(
        "{}: {} models, {} audio, {} hdr, {} textures",
        path.display(),
        stats.model,
        stats.audio,
        stats.hdr,
        stats.texture
    );

    let events = batch_import_stream(&backend, files, registry, options.clone());
    futures::pin_mut!(events);
    let mut stderr = std::io::stderr();
    while let Some(event) = events.next().await {
        match event {
            BatchEvent::Imported { asset, .. } => summary.record(asset.deduplicated),
            BatchEvent::Progress(progress) => {
                let file = progress.current_file.as_deref().unwrap_or_default();
                _ = write!(stderr, "\r[{}/{}] {file:<60.60}", progress.current, progress.total);
                _ = stderr.flush();
            },
            BatchEvent::Complete(progress) => {
                if progress.total > 0 {
                    _ = writeln!(stderr);
                }
                summary.errors.extend(progress.errors);
            },
            BatchEvent::Started { .. } | BatchEvent::Failed { .. } => {},
        }
    }
    Ok(())
}

fn format_timestamp(timestamp: UtcDateTime) -> String {
    timestamp.format(&Rfc3339).unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}

fn print_row(metadata: &AssetMetadata) {
    let tags = metadata.tags.iter().map(String::as_str).collect::<Vec<_>>().join(",");
    println!(
        "{}  {:<7}  {:<16}  {:>10}  {}  [{tags}]",
        metadata.id,
        metadata.asset_type.as_str(),
        metadata.category,
        metadata.size,
        metadata.name
    );
}

async fn list(registry: &Registry, args: ListArgs) -> Result<()> {
    let filter = QueryFilter {
        asset_type: args.asset_type,
        category: args.category,
        tags: args.tags.into_iter().collect(),
        name_pattern: args.name,
    };
    let assets = registry.query_assets(&filter).await.or_raise(|| ErrorKind::Registry)?;
    for metadata in &assets {
        print_row(metadata);
    }
    Ok(())
}

async fn show(registry: &Registry, id: &str) -> Result<()> {
    let metadata = registry
        .get_metadata(id)
        .await
        .or_raise(|| ErrorKind::Registry)?
        .ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
    println!("id:       {}", metadata.id);
    println!("name:     {}", metadata.name);
    println!("type:     {}", metadata.asset_type);
    println!("category: {}", metadata.category);
    println!("tags:     {}", metadata.tags.iter().map(String::as_str).collect::<Vec<_>>().join(", "));
    println!("size:     {} bytes", metadata.size);
    println!("created:  {}", format_timestamp(metadata.created_at));
    println!("hash:     {}", metadata.content_hash);
    if let Some(thumbnail) = &metadata.thumbnail {
        println!("preview:  {} byte PNG", thumbnail.len());
    }
    if let Some(details) = &metadata.details
        && let Ok(json) = serde_json::to_string_pretty(details)
    {
        println!("{json}");
    }
    Ok(())
}

async fn export(registry: &Registry, id: &str, dest: &Path) -> Result<()> {
    let data = registry
        .get_asset(id)
        .await
        .or_raise(|| ErrorKind::Registry)?
        .ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
    tokio::fs::write(dest, &*data).await.or_raise(|| ErrorKind::Write(dest.to_path_buf()))?;
    println!("wrote {} bytes to {}", data.len(), dest.display());
    Ok(())
}

async fn delete(registry: &Registry, ids: &[String]) -> Result<()> {
    for id in ids {
        registry.delete_asset(id).await.or_raise(|| ErrorKind::Registry)?;
        println!("deleted {id}");
    }
    Ok(())
}

async fn stats(registry: &Registry) -> Result<()> {
    let counts = registry.counts().await.or_raise(|| ErrorKind::Registry)?;
    println!("assets:       {}", counts.metadata);
    println!("blobs:        {}", counts.files);
    println!("fingerprints: {}", counts.fingerprints);
    println!("bytes:        {}", counts.total_bytes);
    let mut by_type: BTreeMap<AssetType, (usize, u64)> = AssetType::ALL.iter().map(|t| (*t, (0, 0))).collect();
    for metadata in registry.get_all_metadata().await.or_raise(|| ErrorKind::Registry)? {
        let entry = by_type.entry(metadata.asset_type).or_default();
        entry.0 += 1;
        entry.1 += metadata.size;
    }
    for (asset_type, (count, bytes)) in by_type {
        println!("  {:<8} {count:>6} assets {bytes:>12} bytes", asset_type.as_str());
    }
    Ok(())
}

async fn clear(registry: &Registry, confirmed: bool) -> Result<()> {
    if !confirmed {
        exn::bail!(ErrorKind::Unconfirmed);
    }
    registry.clear_all().await.or_raise(|| ErrorKind::Registry)?;
    println!("registry cleared");
    Ok(())
}
