//! Reading files to share and writing received ones

use std::path::{Path, PathBuf};

use anyhow::Context;

use zkdrop_core::{PlaintextFile, ShareError, ShareResult, SizePolicy};

pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Read a file from disk, guessing its MIME type from the extension.
///
/// The size policy is checked against the file's metadata before any bytes
/// are read.
pub async fn read_plaintext(path: &Path, policy: &SizePolicy) -> ShareResult<PlaintextFile> {
    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("reading metadata: {}", path.display()))?;
    if !meta.is_file() {
        return Err(anyhow::anyhow!("not a regular file: {}", path.display()).into());
    }
    policy.check_plaintext(meta.len())?;

    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading: {}", path.display()))?;
    // The file may have grown since the metadata call.
    policy.check_plaintext(data.len() as u64)?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file")
        .to_string();
    let mime = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME);

    Ok(PlaintextFile::new(name, mime, data))
}

/// Reduce a server-supplied name to a bare file name.
pub fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => "file".to_string(),
        other => other.to_string(),
    }
}

/// Where to put a received file: `output` if it names a file, inside
/// `output` if it is an existing directory, else the current directory.
pub fn target_path(output: Option<&Path>, file: &PlaintextFile) -> PathBuf {
    let name = safe_file_name(file.name());
    match output {
        Some(dir) if dir.is_dir() => dir.join(name),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(name),
    }
}

/// Write a received file. Parent directories are created; an existing file
/// is only replaced when `force` is set. The write goes through a temp file
/// and a rename so a reader never sees a partial file.
pub async fn write_plaintext(path: &Path, file: &PlaintextFile, force: bool) -> ShareResult<u64> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(ShareError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists (use --force to overwrite)", path.display()),
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating dir: {}", parent.display()))?;
    }

    let tmp = tmp_path(path);
    let written = match tokio::fs::write(&tmp, file.data()).await {
        Ok(()) => tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("renaming to: {}", path.display())),
        Err(e) => Err::<(), _>(e).with_context(|| format!("writing tmp: {}", tmp.display())),
    };
    if let Err(e) = written {
        // Never leave decrypted bytes behind under the temp name.
        if let Err(rm) = tokio::fs::remove_file(&tmp).await {
            if rm.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %tmp.display(), error = %rm, "could not remove temp file");
            }
        }
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), bytes = file.len(), "file written");
    Ok(file.len())
}

/// Temp file next to `path`, keeping the full name so `a.txt` and `a.pdf`
/// never share one.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".zkdrop_tmp");
    path.with_file_name(name)
}
