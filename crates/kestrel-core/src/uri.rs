use {
    serde::{Deserialize, Serialize},
    std::{fmt, path::Path},
};

/// Opaque identifier for an asset within a mounted data source.
///
/// Uris use `/` separators regardless of platform and compare byte-wise; the
/// same uri always resolves to the same bytes within a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }

    pub fn as_str(&self) -> &str { &self.0 }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Everything up to (and excluding) the last `/` separator.
    pub fn parent(&self) -> Uri {
        match self.0.rfind('/') {
            Some(index) => Uri(self.0[..index].to_string()),
            None => Uri::default(),
        }
    }

    /// Appends a path segment below this uri.
    pub fn join(&self, segment: impl AsRef<str>) -> Uri {
        let segment = segment.as_ref();
        if self.0.is_empty() {
            return Uri(segment.to_string());
        }
        let mut ret = self.0.clone();
        if !ret.ends_with('/') {
            ret.push('/');
        }
        ret.push_str(segment.trim_start_matches('/'));
        Uri(ret)
    }

    /// Appends text to the uri itself, eg `foo.vert` -> `foo.vert.spv`.
    pub fn concat(&self, suffix: impl AsRef<str>) -> Uri {
        Uri(format!("{}{}", self.0, suffix.as_ref()))
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.0.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        (!ext.is_empty()).then_some(ext)
    }

    pub fn file_stem(&self) -> &str {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    }

    pub fn from_path(path: &Path) -> Uri {
        let mut ret = String::new();
        for component in path.components() {
            if !ret.is_empty() {
                ret.push('/');
            }
            ret.push_str(&component.as_os_str().to_string_lossy());
        }
        Uri(ret)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self { Self(value.to_string()) }
}

impl From<String> for Uri {
    fn from(value: String) -> Self { Self(value) }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str { &self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_join() {
        let uri = Uri::from("models/fox/fox.json");
        assert_eq!(uri.parent(), Uri::from("models/fox"));
        assert_eq!(uri.parent().join("fox.bin"), Uri::from("models/fox/fox.bin"));
        assert_eq!(Uri::from("fox.json").parent(), Uri::default());
        assert_eq!(Uri::default().join("a"), Uri::from("a"));
    }

    #[test]
    fn extension_and_stem() {
        assert_eq!(Uri::from("shaders/lit.vert").extension(), Some("vert"));
        assert_eq!(Uri::from("shaders/lit.vert").file_stem(), "lit");
        assert_eq!(Uri::from("shaders/lit").extension(), None);
        assert_eq!(Uri::from("a.b/file").extension(), None);
    }

    #[test]
    fn concat_keeps_full_name() {
        assert_eq!(Uri::from("lit.vert").concat(".spv"), Uri::from("lit.vert.spv"));
    }
}
