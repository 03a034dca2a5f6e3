use super::error::ManifestError;
use super::name::ModelName;
use crate::constants::LIBRARY_SEGMENT;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a manifest sits below `manifests/<namespace>/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestLayout {
    /// `<namespace>/<model>/<tag>`
    Flat,
    /// `<namespace>/library/<model>/<tag>`
    Namespaced,
}

impl ManifestLayout {
    /// Resolution order: flat first, then nested.
    pub const ALL: [ManifestLayout; 2] = [ManifestLayout::Flat, ManifestLayout::Namespaced];

    /// Candidate manifest paths for `name` in this layout, most preferred first.
    pub fn candidates(&self, namespace_dir: &Path, name: &ModelName) -> Vec<PathBuf> {
        match self {
            ManifestLayout::Flat => {
                let dir = namespace_dir.join(name.model());
                vec![
                    dir.join(name.tag()),
                    dir.join(format!("{}.json", name.tag())),
                ]
            }
            ManifestLayout::Namespaced => vec![namespace_dir
                .join(LIBRARY_SEGMENT)
                .join(name.model())
                .join(name.tag())],
        }
    }

    /// Classifies a manifest by its path segments relative to the namespace
    /// directory.
    ///
    /// A trailing `.json` on the tag file is ignored. Shapes other than the
    /// two known layouts yield `None`.
    pub fn classify(segments: &[&str]) -> Option<(ManifestLayout, ModelName)> {
        let (layout, model, tag) = match segments {
            [LIBRARY_SEGMENT, model, tag] => (ManifestLayout::Namespaced, model, tag),
            [model, tag] => (ManifestLayout::Flat, model, tag),
            _ => return None,
        };
        let tag = tag.strip_suffix(".json").unwrap_or(*tag);
        ModelName::new(*model, tag).ok().map(|name| (layout, name))
    }
}

impl fmt::Display for ManifestLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestLayout::Flat => f.write_str("flat"),
            ManifestLayout::Namespaced => f.write_str("namespaced"),
        }
    }
}

/// A manifest that has been found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLocation {
    pub name: ModelName,
    pub namespace: String,
    pub layout: ManifestLayout,
    pub path: PathBuf,
}

impl ManifestLocation {
    /// Builds a location from a manifest path below `manifests_dir`.
    pub fn from_path(manifests_dir: &Path, path: &Path) -> Result<Self, ManifestError> {
        let unrecognized = || ManifestError::UnrecognizedLayout(path.to_path_buf());

        let relative = path.strip_prefix(manifests_dir).map_err(|_| unrecognized())?;
        let segments: Vec<&str> = relative
            .iter()
            .map(|s| s.to_str())
            .collect::<Option<_>>()
            .ok_or_else(unrecognized)?;

        let (namespace, rest) = segments.split_first().ok_or_else(unrecognized)?;
        let (layout, name) = ManifestLayout::classify(rest).ok_or_else(unrecognized)?;

        Ok(Self {
            name,
            namespace: namespace.to_string(),
            layout,
            path: path.to_path_buf(),
        })
    }

    /// Ranking among manifests that share a name; smaller is preferred.
    ///
    /// Matches the order [`ManifestResolver::locate`] searches in: the
    /// configured namespace, then flat before nested, then `<tag>` before
    /// `<tag>.json`.
    ///
    /// [`ManifestResolver::locate`]: super::ManifestResolver::locate
    pub fn preference<'a>(&'a self, namespace: &str) -> (bool, ManifestLayout, &'a Path) {
        (self.namespace != namespace, self.layout, &self.path)
    }
}
