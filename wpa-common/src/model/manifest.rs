use super::artifact::Artifact;

/// Everything found installed in a live tree. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationManifest {
    pub core: Artifact,
    pub plugins: Vec<Artifact>,
    pub themes: Vec<Artifact>,
}

impl InstallationManifest {
    pub fn new(core: Artifact, mut plugins: Vec<Artifact>, mut themes: Vec<Artifact>) -> Self {
        plugins.sort_by(|a, b| a.slug().cmp(b.slug()));
        themes.sort_by(|a, b| a.slug().cmp(b.slug()));
        Self {
            core,
            plugins,
            themes,
        }
    }
}
