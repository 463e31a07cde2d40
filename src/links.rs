use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

const DRIVE_DIRECT_BASE: &str = "https://drive.google.com/uc?id=";

static DRIVE_VIEW_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"d/([a-zA-Z0-9_-]+)/view").expect("valid drive link pattern"));

/// Where a record's picture lives once the dataset has been normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Local(PathBuf),
    Remote(String),
}

impl ImageRef {
    /// Path or URL handed to whatever opens the image.
    pub fn target(&self) -> String {
        match self {
            ImageRef::Local(path) => path.display().to_string(),
            ImageRef::Remote(url) => url.clone(),
        }
    }

    /// Short human label: the file name for local images, the last path
    /// segment (or drive id) for remote ones.
    pub fn label(&self) -> String {
        match self {
            ImageRef::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_else(|| "image".to_string()),
            ImageRef::Remote(url) => remote_label(url),
        }
    }
}

fn remote_label(raw: &str) -> String {
    let Ok(parsed) = Url::parse(raw) else {
        return "image".to_string();
    };
    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "id") {
        if !id.is_empty() {
            return id.to_string();
        }
    }
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().to_string())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

/// Rewrites a Google Drive share link (`.../d/{ID}/view...`) into the
/// direct-content form. Anything else comes back untouched.
pub fn convert_drive_link(url: &str) -> String {
    match DRIVE_VIEW_LINK.captures(url) {
        Some(caps) => format!("{DRIVE_DIRECT_BASE}{}", &caps[1]),
        None => url.to_string(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Prefer `{image_dir}/{file}` when it exists, else the image URL.
    #[default]
    Local,
    /// Only the (normalized) image URL.
    Remote,
    /// `{base_url}{file}` when the row names a file, otherwise the image URL.
    /// Requires a non-empty base URL.
    RemoteBase,
}

impl ImageMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "local" => Some(ImageMode::Local),
            "remote" => Some(ImageMode::Remote),
            "remote_base" => Some(ImageMode::RemoteBase),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResolver {
    pub mode: ImageMode,
    pub image_dir: PathBuf,
    pub base_url: String,
}

impl Default for ImageResolver {
    fn default() -> Self {
        Self {
            mode: ImageMode::Local,
            image_dir: PathBuf::from("image"),
            base_url: String::new(),
        }
    }
}

impl ImageResolver {
    /// Picks the single authoritative image reference for one row.
    pub fn resolve(&self, image_url: &str, file: &str) -> Option<ImageRef> {
        let file = file.trim();
        let remote = non_empty(image_url).map(|url| ImageRef::Remote(convert_drive_link(url)));

        match self.mode {
            ImageMode::Local => self.local_path(file).map(ImageRef::Local).or(remote),
            ImageMode::Remote => remote,
            ImageMode::RemoteBase => {
                if file.is_empty() {
                    remote
                } else {
                    Some(ImageRef::Remote(join_base(&self.base_url, file)))
                }
            }
        }
    }

    fn local_path(&self, file: &str) -> Option<PathBuf> {
        if file.is_empty() {
            return None;
        }
        let candidate = self.image_dir.join(file);
        is_file(&candidate).then_some(candidate)
    }
}

fn is_file(path: &Path) -> bool {
    path.metadata().map(|meta| meta.is_file()).unwrap_or(false)
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn join_base(base: &str, file: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn drive_view_link_becomes_direct_link() {
        let link = "https://drive.google.com/file/d/1AbC_d-9/view?usp=sharing";
        assert_eq!(
            convert_drive_link(link),
            "https://drive.google.com/uc?id=1AbC_d-9"
        );
    }

    #[test]
    fn non_drive_links_pass_through() {
        for raw in [
            "https://example.com/pic.png",
            "",
            "d//view",
            "https://drive.google.com/file/d/abc/edit",
        ] {
            assert_eq!(convert_drive_link(raw), raw);
        }
    }

    #[test]
    fn local_mode_prefers_existing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"png").unwrap();
        let resolver = ImageResolver {
            mode: ImageMode::Local,
            image_dir: dir.path().to_path_buf(),
            base_url: String::new(),
        };

        let found = resolver.resolve("https://example.com/x.png", "a.png");
        assert_eq!(found, Some(ImageRef::Local(dir.path().join("a.png"))));

        let missing = resolver.resolve("https://drive.google.com/file/d/XYZ/view", "b.png");
        assert_eq!(
            missing,
            Some(ImageRef::Remote("https://drive.google.com/uc?id=XYZ".into()))
        );

        assert_eq!(resolver.resolve("  ", ""), None);
    }

    #[test]
    fn remote_mode_ignores_local_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), b"png").unwrap();
        let resolver = ImageResolver {
            mode: ImageMode::Remote,
            image_dir: dir.path().to_path_buf(),
            base_url: String::new(),
        };
        assert_eq!(resolver.resolve("", "a.png"), None);
        assert_eq!(
            resolver.resolve("https://example.com/x.png", "a.png"),
            Some(ImageRef::Remote("https://example.com/x.png".into()))
        );
    }

    #[test]
    fn remote_base_joins_file_name() {
        let resolver = ImageResolver {
            mode: ImageMode::RemoteBase,
            image_dir: PathBuf::from("image"),
            base_url: "https://cdn.example.com/media".into(),
        };
        assert_eq!(
            resolver.resolve("", "clip.jpg"),
            Some(ImageRef::Remote("https://cdn.example.com/media/clip.jpg".into()))
        );
        assert_eq!(
            resolver.resolve("https://example.com/x.png", ""),
            Some(ImageRef::Remote("https://example.com/x.png".into()))
        );
    }

    #[test]
    fn labels_are_short() {
        let drive = ImageRef::Remote("https://drive.google.com/uc?id=XYZ".into());
        assert_eq!(drive.label(), "XYZ");
        let plain = ImageRef::Remote("https://example.com/a%20b.png".into());
        assert_eq!(plain.label(), "a b.png");
        let local = ImageRef::Local(PathBuf::from("image/cover.jpg"));
        assert_eq!(local.label(), "cover.jpg");
    }

    #[test]
    fn image_mode_parses_aliases() {
        assert_eq!(ImageMode::parse("remote-base"), Some(ImageMode::RemoteBase));
        assert_eq!(ImageMode::parse(" LOCAL "), Some(ImageMode::Local));
        assert_eq!(ImageMode::parse("ftp"), None);
    }
}
