//! Input loading: turn a user-supplied path or URL into a [`PendingFile`].
//!
//! Files are read fully into memory. Pending files are identified by name,
//! so the name is the file name for local paths and the last URL path
//! segment for downloads. Two different directories holding `report.pdf`
//! therefore collide and only the first is kept.

use crate::error::BatchError;
use crate::file_set::PendingFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load one input, downloading it if it is a URL.
pub async fn load_file(input: &str, download_timeout_secs: u64) -> Result<PendingFile, BatchError> {
    if is_url(input) {
        download_url(input, download_timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// An input that could not be loaded.
#[derive(Debug)]
pub struct InputFailure {
    /// The path or URL as given.
    pub input: String,
    pub error: BatchError,
}

/// Outcome of [`load_files`]: the inputs that loaded, in order, and the
/// ones that did not.
#[derive(Debug, Default)]
pub struct LoadedInputs {
    pub files: Vec<PendingFile>,
    pub failures: Vec<InputFailure>,
}

impl LoadedInputs {
    /// The loaded files, or the first failure when nothing loaded.
    pub fn into_files(self) -> Result<Vec<PendingFile>, BatchError> {
        if self.files.is_empty() {
            if let Some(first) = self.failures.into_iter().next() {
                return Err(first.error);
            }
        }
        Ok(self.files)
    }
}

/// Load several inputs in order.
///
/// An input that cannot be read or downloaded is logged and reported in
/// [`LoadedInputs::failures`]; the rest still load.
pub async fn load_files<I, S>(inputs: I, download_timeout_secs: u64) -> LoadedInputs
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut loaded = LoadedInputs::default();
    for input in inputs {
        let input = input.as_ref();
        match load_file(input, download_timeout_secs).await {
            Ok(file) => loaded.files.push(file),
            Err(e) => {
                warn!("{}: skipped, could not be loaded: {}", input, e);
                loaded.failures.push(InputFailure {
                    input: input.to_string(),
                    error: e,
                });
            }
        }
    }
    loaded
}

async fn read_local(path: &Path) -> Result<PendingFile, BatchError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BatchError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => BatchError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => BatchError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let name = local_name(path);
    debug!("Loaded {} ({} bytes)", path.display(), bytes.len());
    Ok(PendingFile::new(name, bytes))
}

fn local_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<PendingFile, BatchError> {
    info!("Downloading: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            BatchError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(BatchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BatchError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(PendingFile::new(url_file_name(url), bytes.to_vec()))
}

/// Last non-empty path segment of `url`, or `downloaded.pdf`.
pub fn url_file_name(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(segments) = parsed.path_segments() {
            if let Some(last) = segments.filter(|s| !s.is_empty()).next_back() {
                return last.to_string();
            }
        }
    }
    "downloaded.pdf".to_string()
}
