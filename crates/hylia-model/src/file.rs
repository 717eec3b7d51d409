use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// One downloadable resource: a song's audio file or one of an album's images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub url: Url,
    /// Name the resource is saved under in the target directory.
    pub filename: String,
}

impl File {
    /// A file named after the decoded last path segment of its URL.
    pub fn from_url(url: Url) -> Self {
        let filename = filename_from_url(&url);
        Self { url, filename }
    }

    /// Rename the file after a song's display name, keeping the extension
    /// of the current filename.
    pub fn rename_to_song(&mut self, display_name: &str) {
        self.filename = song_filename(display_name, &self.filename);
    }
}

/// Decode the last path segment of `url` into a filename.
///
/// `http://host/ost/01%20Opening.mp3` gives `01 Opening.mp3`. Segments that
/// do not decode to valid UTF-8 are decoded lossily.
pub fn filename_from_url(url: &Url) -> String {
    let segment = url.path().rsplit('/').next().unwrap_or_default();
    let decoded = match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned(),
    };
    sanitize_filename(&decoded)
}

/// Make `name` safe to join onto a directory: path separators and NUL
/// become `-`, and a name that is empty, `.` or `..` becomes `_`.
///
/// The result always names an entry directly inside the target directory.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            other => other,
        })
        .collect();
    let cleaned = cleaned.trim();
    match cleaned {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned.to_string(),
    }
}

/// Split `name` into a stem and an extension.
///
/// Only a final dot followed by one or more alphanumeric characters counts as
/// an extension, so labels like `Mr. Saturn's Theme` stay whole.
pub fn strict_splitext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) => {
            let ext = &name[dot + 1..];
            if !ext.is_empty() && ext.chars().all(char::is_alphanumeric) {
                (&name[..dot], &name[dot..])
            } else {
                (name, "")
            }
        }
        None => (name, ""),
    }
}

/// Build the on-disk filename for a song: its display name plus the
/// extension of the file the site links to.
pub fn song_filename(display_name: &str, original_filename: &str) -> String {
    let (_, ext) = strict_splitext(original_filename);
    let stem: String = display_name.nfc().collect();
    sanitize_filename(&format!("{}{ext}", stem.trim()))
}
