use {
    anyhow::{anyhow, Result},
    kestrel_core::{Error, Uri},
    std::path::{Path, PathBuf},
};

/// Read-only view of a mounted asset tree.
///
/// The same uri resolves to the same bytes within a run; change detection is
/// the [crate::UriMonitor]'s job.
pub trait DataSource: Send + Sync {
    fn read(&self, uri: &Uri) -> Result<Vec<u8>>;

    fn read_text(&self, uri: &Uri) -> Result<String> {
        let bytes = self.read(uri)?;
        String::from_utf8(bytes)
            .map_err(|_| anyhow!(Error::CorruptAsset(format!("{uri}: not valid UTF-8"))))
    }

    fn read_json(&self, uri: &Uri) -> Result<serde_json::Value> {
        let text = self.read_text(uri)?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!(Error::CorruptAsset(format!("{uri}: {e}"))))
    }

    fn mount_point(&self) -> &Path;

    /// Converts an absolute host path back into a uri under the mount point.
    fn trim_to_uri(&self, path: &Path) -> Option<Uri> {
        path.strip_prefix(self.mount_point()).ok().map(Uri::from_path)
    }

    fn contains(&self, uri: &Uri) -> bool;
}

/// Directory-mounted data source.
pub struct FsDataSource {
    mount: PathBuf,
}

impl FsDataSource {
    pub fn new(mount: impl Into<PathBuf>) -> Self { Self { mount: mount.into() } }

    pub fn absolute_path(&self, uri: &Uri) -> PathBuf { self.mount.join(uri.as_str()) }
}

impl DataSource for FsDataSource {
    fn read(&self, uri: &Uri) -> Result<Vec<u8>> {
        let path = self.absolute_path(uri);
        std::fs::read(&path)
            .map_err(|_| anyhow!(Error::NotFound(format!("{uri} ({})", path.display()))))
    }

    fn mount_point(&self) -> &Path { &self.mount }

    fn contains(&self, uri: &Uri) -> bool { self.absolute_path(uri).is_file() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_trims_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/cube.json"), b"{}").unwrap();

        let source = FsDataSource::new(dir.path());
        let uri = Uri::from("models/cube.json");
        assert!(source.contains(&uri));
        assert_eq!(source.read(&uri).unwrap(), b"{}");
        assert_eq!(source.read_text(&uri).unwrap(), "{}");
        assert!(source.read_json(&uri).unwrap().is_object());

        let absolute = dir.path().join("models/cube.json");
        assert_eq!(source.trim_to_uri(&absolute), Some(uri.clone()));
        assert_eq!(source.trim_to_uri(Path::new("/elsewhere/cube.json")), None);

        assert!(source.read(&Uri::from("missing.json")).is_err());
        assert!(!source.contains(&Uri::from("missing.json")));
    }
}
