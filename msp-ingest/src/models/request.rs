//! Ingest job input and its validated form
//!
//! [`JobInput`] is what the scheduler hands over: every field optional, tag
//! map possibly still a JSON string. [`IngestRequest::try_from`] checks it
//! once, before any side effect; after that the request is immutable.

use crate::error::{IngestError, IngestResult};
use crate::index::Category;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Profile URL embedded alongside the text tags
const PROFILE_URL_BASE: &str = "https://www.suamusica.com.br/perfil/";

/// Raw job input as marshalled by the scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInput {
    pub path: Option<String>,
    pub name: Option<String>,
    pub app_folder: Option<String>,
    pub dir_type: Option<i64>,
    pub dir_name: Option<String>,
    pub external_volume_name: Option<String>,
    /// Either a JSON string holding an object, or the object itself
    pub id3v2_tags: Option<Value>,
}

/// Tags to embed; unknown keys in the input are dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub comment: Option<String>,
    pub artist_id: Option<String>,
    pub playlist_id: Option<String>,
    pub album_id: Option<String>,
    pub music_id: Option<String>,
}

impl TagSet {
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).cloned();
        Self {
            title: get("title"),
            artist: get("artist"),
            album: get("album"),
            comment: get("comment"),
            artist_id: get("artistId"),
            playlist_id: get("playlistId"),
            album_id: get("albumId"),
            music_id: get("musicId"),
        }
    }

    /// True when none of the known keys was supplied
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Artist profile URL; a missing id leaves its slot empty
    pub fn profile_url(&self) -> String {
        let slot = |value: &Option<String>| value.clone().unwrap_or_default();
        format!(
            "{}{}?playlistId={}&albumId={}&musicId={}",
            PROFILE_URL_BASE,
            slot(&self.artist_id),
            slot(&self.playlist_id),
            slot(&self.album_id),
            slot(&self.music_id),
        )
    }
}

/// A validated ingest request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub staging_path: PathBuf,
    pub display_name: String,
    pub app_folder: String,
    pub category: Category,
    pub base_directory: String,
    pub volume: Option<String>,
    /// `None` when no tags were supplied (or the map was empty)
    pub tags: Option<TagSet>,
}

impl TryFrom<JobInput> for IngestRequest {
    type Error = IngestError;

    fn try_from(input: JobInput) -> IngestResult<Self> {
        let staging_path = input.path.ok_or(IngestError::InputMissing("path"))?;
        let display_name = input.name.ok_or(IngestError::InputMissing("name"))?;
        let app_folder = input.app_folder.ok_or(IngestError::InputMissing("appFolder"))?;
        let dir_type = input.dir_type.ok_or(IngestError::InputMissing("dirType"))?;
        let base_directory = input.dir_name.ok_or(IngestError::InputMissing("dirName"))?;
        let tags = parse_tags(input.id3v2_tags)?;

        Ok(Self {
            staging_path: PathBuf::from(staging_path),
            display_name,
            app_folder,
            category: Category::from_dir_type(dir_type),
            base_directory,
            volume: input.external_volume_name,
            tags,
        })
    }
}

fn parse_tags(raw: Option<Value>) -> IngestResult<Option<TagSet>> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(json)) => serde_json::from_str::<Value>(&json)
            .map_err(|e| IngestError::InvalidInput(format!("id3v2Tags is not valid JSON: {}", e)))?,
        Some(value) => value,
    };

    // The host sends "null" as text when it has no tags
    if value.is_null() {
        return Ok(None);
    }

    let map: HashMap<String, String> = serde_json::from_value(value).map_err(|e| {
        IngestError::InvalidInput(format!("id3v2Tags must map strings to strings: {}", e))
    })?;

    // Unknown keys are dropped, so a map of only unknown keys is no tags
    let tags = TagSet::from_map(&map);
    if tags.is_empty() {
        return Ok(None);
    }
    Ok(Some(tags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_input() -> JobInput {
        serde_json::from_value(json!({
            "path": "/stage/a.mp3",
            "name": "a.mp3",
            "appFolder": "",
            "dirType": 1,
            "dirName": "Music",
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_input_converts() {
        let request = IngestRequest::try_from(full_input()).unwrap();
        assert_eq!(request.staging_path, PathBuf::from("/stage/a.mp3"));
        assert_eq!(request.display_name, "a.mp3");
        assert_eq!(request.category, Category::Audio);
        assert_eq!(request.base_directory, "Music");
        assert!(request.volume.is_none());
        assert!(request.tags.is_none());
    }

    #[test]
    fn test_each_required_field_is_checked() {
        let cases: [(&str, fn(&mut JobInput)); 5] = [
            ("path", |i| i.path = None),
            ("name", |i| i.name = None),
            ("appFolder", |i| i.app_folder = None),
            ("dirType", |i| i.dir_type = None),
            ("dirName", |i| i.dir_name = None),
        ];

        for (field, clear) in cases {
            let mut input = full_input();
            clear(&mut input);
            match IngestRequest::try_from(input) {
                Err(IngestError::InputMissing(missing)) => assert_eq!(missing, field),
                other => panic!("expected InputMissing({}), got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_tags_as_json_string() {
        let mut input = full_input();
        input.id3v2_tags = Some(Value::String(
            r#"{"title":"T","artist":"Art","artistId":"42","extra":"ignored"}"#.to_string(),
        ));

        let tags = IngestRequest::try_from(input).unwrap().tags.unwrap();
        assert_eq!(tags.title.as_deref(), Some("T"));
        assert_eq!(tags.artist.as_deref(), Some("Art"));
        assert_eq!(tags.artist_id.as_deref(), Some("42"));
        assert!(tags.album.is_none());
    }

    #[test]
    fn test_tags_as_inline_object() {
        let mut input = full_input();
        input.id3v2_tags = Some(json!({"album": "Al"}));

        let tags = IngestRequest::try_from(input).unwrap().tags.unwrap();
        assert_eq!(tags.album.as_deref(), Some("Al"));
    }

    #[test]
    fn test_empty_or_null_tags_mean_no_tags() {
        for raw in [json!({}), json!("{}"), json!("null"), Value::Null] {
            let mut input = full_input();
            input.id3v2_tags = Some(raw);
            assert!(IngestRequest::try_from(input).unwrap().tags.is_none());
        }
    }

    #[test]
    fn test_only_unknown_tag_keys_mean_no_tags() {
        for raw in [json!({"unrelated": "x"}), json!(r#"{"genre":"Forro","year":"2020"}"#)] {
            let mut input = full_input();
            input.id3v2_tags = Some(raw);
            assert!(IngestRequest::try_from(input).unwrap().tags.is_none());
        }
    }

    #[test]
    fn test_tag_set_is_empty() {
        assert!(TagSet::default().is_empty());
        let tags = TagSet {
            music_id: Some("1".to_string()),
            ..TagSet::default()
        };
        assert!(!tags.is_empty());
    }

    #[test]
    fn test_malformed_tags_are_rejected() {
        for raw in [json!("{not json"), json!({"title": 5}), json!(["title"])] {
            let mut input = full_input();
            input.id3v2_tags = Some(raw);
            assert!(matches!(
                IngestRequest::try_from(input),
                Err(IngestError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_profile_url_template() {
        let tags = TagSet {
            artist_id: Some("7".to_string()),
            playlist_id: Some("8".to_string()),
            album_id: Some("9".to_string()),
            music_id: Some("10".to_string()),
            ..TagSet::default()
        };
        assert_eq!(
            tags.profile_url(),
            "https://www.suamusica.com.br/perfil/7?playlistId=8&albumId=9&musicId=10"
        );

        let sparse = TagSet {
            artist_id: Some("7".to_string()),
            ..TagSet::default()
        };
        assert_eq!(
            sparse.profile_url(),
            "https://www.suamusica.com.br/perfil/7?playlistId=&albumId=&musicId="
        );
    }

    #[test]
    fn test_unknown_dir_type_is_download() {
        let mut input = full_input();
        input.dir_type = Some(17);
        assert_eq!(IngestRequest::try_from(input).unwrap().category, Category::Download);
    }
}
