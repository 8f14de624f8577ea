use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model file not found: {0}")]
    MissingExplicit(PathBuf),
    #[error("model '{name}' not found in cache or bundled directory, and no download URL is configured")]
    NotFound { name: String },
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download interrupted for {url}: {source}")]
    Interrupted {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where to look for a detector model.
#[derive(Clone, Debug, Default)]
pub struct ModelLocation {
    /// File name looked up in the cache and bundled directories.
    pub name: String,
    /// Used as-is when set; nothing else is consulted.
    pub explicit_path: Option<PathBuf>,
    pub bundled_dir: Option<PathBuf>,
    /// Downloaded into the cache when the model isn't found locally.
    pub download_url: Option<String>,
}

/// Resolve a model file, checking local locations before downloading.
///
/// Resolution order:
/// 1. Explicit path (must exist)
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory
/// 4. Download from URL to cache, if a URL is configured
pub fn resolve(
    location: &ModelLocation,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(location, &model_cache_dir()?, progress)
}

fn resolve_in(
    location: &ModelLocation,
    cache_dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = &location.explicit_path {
        if path.exists() {
            return Ok(path.clone());
        }
        return Err(ModelResolveError::MissingExplicit(path.clone()));
    }

    let cached_path = cache_dir.join(&location.name);
    if cached_path.exists() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    if let Some(dir) = &location.bundled_dir {
        let bundled_path = dir.join(&location.name);
        if bundled_path.exists() {
            log::debug!("Using bundled model {}", bundled_path.display());
            return Ok(bundled_path);
        }
    }

    let Some(url) = &location.download_url else {
        return Err(ModelResolveError::NotFound {
            name: location.name.clone(),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {url}", location.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/ROI Watch/models/`
/// - Linux: `$XDG_CACHE_HOME/ROI Watch/models/` or `~/.cache/ROI Watch/models/`
/// - Windows: `%LOCALAPPDATA%/ROI Watch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("ROI Watch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("ROI Watch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

/// Downloads into `<dest>.part` and renames on success, so the cache never
/// holds a truncated model. The `.part` file is removed on any failure.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_inner(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|source| ModelResolveError::Download {
            url: url.to_string(),
            source,
        })?;

    let total = response.content_length().unwrap_or(0);
    let write_err = |source| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|source| ModelResolveError::Interrupted {
                url: url.to_string(),
                source,
            })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|source| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source,
    })
}
