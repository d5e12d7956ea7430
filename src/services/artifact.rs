use std::path::{Path, PathBuf};

/// Path convention shared by the renderer and the `/media` file server:
/// `{media_root}/videos/{input_base_name}/{resolution_profile}/{entry_symbol}.{extension}`.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    pub media_root: PathBuf,
    pub public_base_url: String,
    pub resolution_profile: String,
    pub entry_symbol: String,
    pub extension: String,
}

impl ArtifactLayout {
    /// Location relative to the media root.
    pub fn relative_path(&self, input_base_name: &str) -> String {
        format!(
            "videos/{}/{}/{}.{}",
            input_base_name, self.resolution_profile, self.entry_symbol, self.extension
        )
    }

    pub fn local_path(&self, input_base_name: &str) -> PathBuf {
        self.media_root.join(self.relative_path(input_base_name))
    }

    pub fn url(&self, input_base_name: &str) -> String {
        format!(
            "{}/media/{}",
            self.public_base_url.trim_end_matches('/'),
            self.relative_path(input_base_name)
        )
    }
}

/// Base name (file stem) of a materialized input, which names its artifact directory.
pub fn input_base_name(input_path: &Path) -> Option<String> {
    input_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
}
