//! Building bundles from files on disk.

use std::path::Path;

use url::Url;
use wbn_cbor::CanonicalCodec;

use crate::builder::BundleBuilder;
use crate::error::{BundleError, BundleResult};
use crate::exchange::validate_exchange_url;

const DIRECTORY_INDEX: &str = "index.html";

/// Maps a file to the `content-type` it is served with.
pub trait ContentTypeResolver {
    /// `None` leaves the exchange without a content type, which is only
    /// accepted for empty files.
    fn content_type(&self, path: &Path) -> Option<String>;
}

/// Content types by file extension, `application/octet-stream` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionContentTypes;

impl ExtensionContentTypes {
    fn lookup(extension: &str) -> &'static str {
        match extension.to_ascii_lowercase().as_str() {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" | "mjs" => "text/javascript",
            "json" => "application/json",
            "webmanifest" => "application/manifest+json",
            "txt" => "text/plain",
            "xml" => "application/xml",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "ico" => "image/x-icon",
            "wasm" => "application/wasm",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "pdf" => "application/pdf",
            "mp4" => "video/mp4",
            _ => "application/octet-stream",
        }
    }
}

impl ContentTypeResolver for ExtensionContentTypes {
    fn content_type(&self, path: &Path) -> Option<String> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Some(Self::lookup(extension).to_string())
    }
}

impl<C: CanonicalCodec> BundleBuilder<C> {
    /// Add the contents of `path` as a 200 response for `url`.
    pub fn add_file(
        &mut self,
        url: &str,
        path: &Path,
        resolver: &dyn ContentTypeResolver,
    ) -> BundleResult<&mut Self> {
        let body = std::fs::read(path).map_err(|e| BundleError::io(path, e))?;
        let headers: Vec<(&str, String)> = resolver
            .content_type(path)
            .map(|ct| ("content-type", ct))
            .into_iter()
            .collect();
        tracing::debug!(url, path = %path.display(), bytes = body.len(), "adding file");
        self.add_exchange(url, 200, headers, body)
    }

    /// Add every file under `dir`, addressed relative to `base_url`.
    ///
    /// Entries are visited in sorted order. A file named `index.html` is
    /// served at its directory URL, and its own URL redirects there.
    pub fn add_files_recursively(
        &mut self,
        base_url: &str,
        dir: &Path,
        resolver: &dyn ContentTypeResolver,
    ) -> BundleResult<&mut Self> {
        if !base_url.ends_with('/') {
            return Err(BundleError::invalid_url(base_url, "base URL must end with '/'"));
        }
        let base = validate_exchange_url(base_url)?;
        self.add_directory(&base, dir, resolver)?;
        Ok(self)
    }

    fn add_directory(
        &mut self,
        dir_url: &Url,
        dir: &Path,
        resolver: &dyn ContentTypeResolver,
    ) -> BundleResult<()> {
        let mut entries = std::fs::read_dir(dir)
            .map_err(|e| BundleError::io(dir, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BundleError::io(dir, e))?;
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| {
                BundleError::invalid_url(dir_url.as_str(), format!("{} is not UTF-8", path.display()))
            })?;
            let metadata = std::fs::metadata(&path).map_err(|e| BundleError::io(&path, e))?;

            if metadata.is_dir() {
                let child = child_url(dir_url, name, true)?;
                self.add_directory(&child, &path, resolver)?;
            } else if metadata.is_file() {
                let url = child_url(dir_url, name, false)?;
                if name == DIRECTORY_INDEX {
                    self.add_file(dir_url.as_str(), &path, resolver)?;
                    self.add_exchange(url.as_str(), 301, [("location", "./")], Vec::new())?;
                } else {
                    self.add_file(url.as_str(), &path, resolver)?;
                }
            } else {
                tracing::warn!(path = %path.display(), "skipping entry that is neither file nor directory");
            }
        }
        Ok(())
    }
}

fn child_url(dir_url: &Url, name: &str, is_dir: bool) -> BundleResult<Url> {
    let mut url = dir_url.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| BundleError::invalid_url(dir_url.as_str(), "cannot be a base URL"))?;
        segments.pop_if_empty().push(name);
        if is_dir {
            segments.push("");
        }
    }
    Ok(url)
}
