use serde::{Deserialize, Serialize};
use std::fmt;

/// Format tag attached to every loaded asset.
///
/// Derived from the filename alone; file contents are never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    #[serde(rename = "jpeg")]
    Jpeg,
    #[serde(rename = "png")]
    Png,
    #[serde(rename = "gif")]
    Gif,
    #[serde(rename = "")]
    Unknown,
}

impl ImageFormat {
    /// Map a filename to its format tag.
    ///
    /// The extension is everything from the last `.` of the final path
    /// component, matched case-sensitively: `x.PNG` is [`ImageFormat::Unknown`].
    #[must_use]
    pub fn from_filename(name: &str) -> Self {
        match extension(name) {
            Some(".jpg" | ".jpeg") => Self::Jpeg,
            Some(".png") => Self::Png,
            Some(".gif") => Self::Gif,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Unknown => "",
        }
    }

    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn extension(name: &str) -> Option<&str> {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    base.rfind('.').map(|idx| &base[idx..])
}
