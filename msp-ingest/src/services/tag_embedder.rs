//! Best-effort ID3v2 tag embedding into the staging file
//!
//! The file is parsed with lofty to confirm it is MPEG audio; a fresh ID3v2.4
//! tag is then written with the id3 crate into a `.tmp` copy, which replaces
//! the original by rename. Nothing in here can fail the job: every error is
//! logged and reported as [`EmbedOutcome::Failed`].

use crate::context::LogContext;
use crate::error::{IngestError, IngestResult};
use crate::models::TagSet;
use id3::frame::{Comment, ExtendedLink};
use id3::{TagLike, Version};
use lofty::file::{FileType, TaggedFileExt};
use lofty::probe::Probe;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Result of one embedding attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// No tags supplied
    Skipped,
    /// Tag written and file replaced
    Embedded,
    /// Parse or save failed; file left as it was
    Failed,
}

/// Writes supplied tags into a local audio file before it is committed
#[derive(Debug, Default)]
pub struct TagEmbedder {}

impl TagEmbedder {
    pub fn new() -> Self {
        Self {}
    }

    pub async fn embed(&self, path: &Path, tags: Option<&TagSet>, ctx: &LogContext) -> EmbedOutcome {
        let Some(tags) = tags.filter(|t| !t.is_empty()) else {
            debug!(parent: ctx.span(), "No tags supplied, skipping tag embedding");
            return EmbedOutcome::Skipped;
        };

        let path_buf = path.to_path_buf();
        let tags = tags.clone();
        let result = tokio::task::spawn_blocking(move || embed_blocking(&path_buf, &tags))
            .await
            .map_err(|e| IngestError::TagEmbed(format!("Task join error: {}", e)))
            .and_then(|r| r);

        match result {
            Ok(()) => {
                info!(parent: ctx.span(), path = %path.display(), "Successfully set ID3v2 tags");
                EmbedOutcome::Embedded
            }
            Err(e) => {
                warn!(
                    parent: ctx.span(),
                    path = %path.display(),
                    error = %e,
                    "Failed to set ID3v2 tags, continuing with untagged file"
                );
                EmbedOutcome::Failed
            }
        }
    }
}

fn embed_blocking(path: &Path, tags: &TagSet) -> IngestResult<()> {
    probe_mpeg(path)?;
    let tag = build_tag(tags);
    save_atomically(path, &tag)
}

/// Confirm the file parses as MPEG audio
fn probe_mpeg(path: &Path) -> IngestResult<()> {
    let tagged_file = Probe::open(path)
        .map_err(|e| IngestError::TagEmbed(format!("Failed to open file: {}", e)))?
        .guess_file_type()
        .map_err(|e| IngestError::TagEmbed(format!("Failed to probe file: {}", e)))?
        .read()
        .map_err(|e| IngestError::TagEmbed(format!("Failed to parse audio container: {}", e)))?;

    match tagged_file.file_type() {
        FileType::Mpeg => Ok(()),
        other => Err(IngestError::TagEmbed(format!(
            "Unsupported container for ID3v2: {:?}",
            other
        ))),
    }
}

/// Fresh tag block; keys absent from the set are not written
fn build_tag(tags: &TagSet) -> id3::Tag {
    let mut tag = id3::Tag::new();

    if let Some(title) = &tags.title {
        tag.set_title(title.as_str());
    }
    if let Some(artist) = &tags.artist {
        tag.set_artist(artist.as_str());
    }
    if let Some(album) = &tags.album {
        tag.set_album(album.as_str());
    }
    if let Some(comment) = &tags.comment {
        tag.add_frame(Comment {
            lang: "eng".to_string(),
            description: String::new(),
            text: comment.clone(),
        });
    }
    tag.add_frame(ExtendedLink {
        description: String::new(),
        link: tags.profile_url(),
    });

    tag
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Tag a copy, then rename it over the original
fn save_atomically(path: &Path, tag: &id3::Tag) -> IngestResult<()> {
    let temp_path = temp_sibling(path);

    let result = std::fs::copy(path, &temp_path)
        .map_err(|e| IngestError::TagEmbed(format!("Failed to copy to temp file: {}", e)))
        .and_then(|_| {
            tag.write_to_path(&temp_path, Version::Id3v24)
                .map_err(|e| IngestError::TagEmbed(format!("Failed to write tag: {}", e)))
        })
        .and_then(|_| {
            std::fs::rename(&temp_path, path)
                .map_err(|e| IngestError::TagEmbed(format!("Failed to replace original: {}", e)))
        });

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_no_tags_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"untouched").unwrap();

        let outcome = TagEmbedder::new()
            .embed(&path, None, &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Skipped);
        assert_eq!(std::fs::read(&path).unwrap(), b"untouched");
    }

    #[tokio::test]
    async fn test_non_audio_file_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"definitely not an mpeg stream").unwrap();

        let outcome = TagEmbedder::new()
            .embed(&path, Some(&title_only("T")), &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Failed);
        assert_eq!(std::fs::read(&path).unwrap(), b"definitely not an mpeg stream");
        assert!(!temp_sibling(&path).exists());
    }

    fn title_only(title: &str) -> TagSet {
        TagSet {
            title: Some(title.to_string()),
            ..TagSet::default()
        }
    }

    /// Silent MPEG-1 Layer III frames, 128 kbps, 44.1 kHz
    fn write_mpeg_frames(path: &Path) -> Vec<u8> {
        let mut bytes = Vec::new();
        for _ in 0..20 {
            let start = bytes.len();
            bytes.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64]);
            bytes.resize(start + 417, 0);
        }
        std::fs::write(path, &bytes).unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_empty_tag_set_leaves_existing_tag_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        write_mpeg_frames(&path);
        build_tag(&title_only("Original Title"))
            .write_to_path(&path, Version::Id3v24)
            .unwrap();
        let before = std::fs::read(&path).unwrap();

        let outcome = TagEmbedder::new()
            .embed(&path, Some(&TagSet::default()), &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Skipped);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        let tag = id3::Tag::read_from_path(&path).unwrap();
        assert_eq!(tag.title(), Some("Original Title"));
    }

    #[tokio::test]
    async fn test_valid_mpeg_is_tagged_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        write_mpeg_frames(&path);

        let outcome = TagEmbedder::new()
            .embed(&path, Some(&title_only("New")), &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Embedded);
        assert_eq!(id3::Tag::read_from_path(&path).unwrap().title(), Some("New"));
        assert!(!temp_sibling(&path).exists());
    }

    // Copying into /dev/full fails with ENOSPC, even for root
    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_save_failure_keeps_original_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.mp3");
        let original = write_mpeg_frames(&path);
        std::os::unix::fs::symlink("/dev/full", temp_sibling(&path)).unwrap();

        let outcome = TagEmbedder::new()
            .embed(&path, Some(&title_only("T")), &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Failed);
        assert_eq!(std::fs::read(&path).unwrap(), original);
        assert!(std::fs::symlink_metadata(temp_sibling(&path)).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_fails_softly() {
        let dir = TempDir::new().unwrap();
        let tags = title_only("T");

        let outcome = TagEmbedder::new()
            .embed(&dir.path().join("gone.mp3"), Some(&tags), &LogContext::for_new_job())
            .await;

        assert_eq!(outcome, EmbedOutcome::Failed);
    }

    #[test]
    fn test_build_tag_fields() {
        let tags = TagSet {
            title: Some("T".to_string()),
            artist: Some("Art".to_string()),
            comment: Some("C".to_string()),
            artist_id: Some("1".to_string()),
            ..TagSet::default()
        };

        let tag = build_tag(&tags);
        assert_eq!(tag.title(), Some("T"));
        assert_eq!(tag.artist(), Some("Art"));
        assert_eq!(tag.album(), None);
        assert_eq!(tag.comments().next().map(|c| c.text.as_str()), Some("C"));
        assert_eq!(
            tag.extended_links().next().map(|l| l.link.as_str()),
            Some("https://www.suamusica.com.br/perfil/1?playlistId=&albumId=&musicId=")
        );
    }

    #[test]
    fn test_temp_sibling_name() {
        assert_eq!(
            temp_sibling(Path::new("/stage/a.mp3")),
            PathBuf::from("/stage/a.mp3.tmp")
        );
    }
}
