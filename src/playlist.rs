use std::{fmt, path::Path};

use anyhow::{Context, Result};
use tracing::{debug, instrument};

/// Marker every written playlist starts with
pub const PLAYLIST_MARKER: &str = "#EXTM3U";
/// Marker of a channel's metadata line
pub const ENTRY_MARKER: &str = "#EXTINF";

/// A single channel: its `#EXTINF` line and the stream URL line that follows it.
///
/// Both lines are kept exactly as they appeared in the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub metadata: String,
    pub url: String,
}

impl Entry {
    /// The stream URL without surrounding whitespace
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.trim()
    }
}

/// An M3U playlist split into its preamble and its channel entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Playlist {
    /// Lines before the first `#EXTINF`, verbatim
    pub header: Vec<String>,
    pub entries: Vec<Entry>,
}

impl Playlist {
    /// Reads and parses a playlist file.
    ///
    /// Bytes that are not valid UTF-8 are dropped rather than rejected.
    ///
    /// # Errors
    /// Errors when the file cannot be read
    #[instrument]
    pub async fn read(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("Reading playlist {}", path.display()))?;

        let playlist = Self::parse(&decode_lossy(&raw));
        debug!(
            "Parsed {} header lines and {} entries",
            playlist.header.len(),
            playlist.entries.len()
        );

        Ok(playlist)
    }

    /// Parses playlist text.
    ///
    /// This is deliberately forgiving: a metadata line without a URL after it is
    /// discarded, and stray lines after the first `#EXTINF` that are not picked
    /// up as a URL are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let lines = split_lines(text);
        let mut playlist = Self::default();
        let mut seen_entry = false;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i].trim();

            if !line.starts_with(ENTRY_MARKER) {
                if !seen_entry {
                    playlist.header.push(lines[i].to_string());
                }
                i += 1;
                continue;
            }
            seen_entry = true;

            // The URL is the next line that is neither blank nor a directive
            let url_line = (i + 1..lines.len()).find(|&j| {
                let candidate = lines[j].trim();
                !candidate.is_empty() && !candidate.starts_with('#')
            });

            if let Some(j) = url_line {
                playlist.entries.push(Entry {
                    metadata: lines[i].to_string(),
                    url: lines[j].to_string(),
                });
                i = j + 1;
            } else {
                debug!("Dropping dangling metadata line: {}", lines[i]);
                i += 1;
            }
        }

        playlist
    }

    /// Builds the playlist that gets written out: this header, guaranteed to
    /// start with `#EXTM3U`, followed by `survivors`.
    #[must_use]
    pub fn cleaned(&self, survivors: Vec<Entry>) -> Self {
        let has_marker = self
            .header
            .first()
            .is_some_and(|l| l.trim().starts_with(PLAYLIST_MARKER));

        let mut header = Vec::with_capacity(self.header.len() + 1);
        if !has_marker {
            header.push(PLAYLIST_MARKER.to_string());
        }
        header.extend(self.header.iter().cloned());

        Self {
            header,
            entries: survivors,
        }
    }

    /// Writes the playlist to `path`, replacing whatever is there.
    ///
    /// # Errors
    /// Errors when the file cannot be written
    pub async fn write(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.to_string())
            .await
            .with_context(|| format!("Writing playlist {}", path.display()))
    }
}

impl fmt::Display for Playlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "{line}")?;
        }
        for entry in &self.entries {
            writeln!(f, "{}", entry.metadata)?;
            writeln!(f, "{}", entry.url)?;
        }
        Ok(())
    }
}

/// Decodes UTF-8, skipping invalid byte sequences instead of replacing them
fn decode_lossy(raw: &[u8]) -> String {
    let mut text = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

/// Splits on `\n`, `\r\n` and lone `\r`. A trailing terminator does not yield
/// an empty last line.
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some(end) = rest.find(&['\r', '\n'][..]) else {
            lines.push(rest);
            break;
        };
        lines.push(&rest[..end]);

        let terminator = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[end + terminator..];
    }

    lines
}
