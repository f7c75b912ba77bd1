//! Database models
//!
//! Rows are decoded by hand from `SqliteRow`; JSON array columns
//! (`tags`, `element_ids`, `program_ids`) are stored as TEXT.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;

/// Song identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub tags: Vec<String>,
    pub archived: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Song {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let tags: String = row.try_get("tags")?;
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            tags: serde_json::from_str(&tags)?,
            archived: row.try_get("archived")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One immutable revision of one part of a song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongVersion {
    pub id: i64,
    pub song_id: i64,
    pub label: String,
    pub content: Option<String>,
    pub rendered_content: Option<String>,
    pub audio_url: Option<String>,
    pub bpm: Option<i64>,
    pub previous_version_id: Option<i64>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

impl SongVersion {
    pub(crate) const COLUMNS: &'static str = "id, song_id, label, content, rendered_content, \
         audio_url, bpm, previous_version_id, created_by, created_at, archived";

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            song_id: row.try_get("song_id")?,
            label: row.try_get("label")?,
            content: row.try_get("content")?,
            rendered_content: row.try_get("rendered_content")?,
            audio_url: row.try_get("audio_url")?,
            bpm: row.try_get("bpm")?,
            previous_version_id: row.try_get("previous_version_id")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            archived: row.try_get("archived")?,
        })
    }
}

/// Program identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: i64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Program {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One append-only revision of a program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramVersion {
    pub id: i64,
    pub program_id: i64,
    pub title: String,
    /// Pinned song version ids, in performance order
    pub element_ids: Vec<i64>,
    /// Child program ids, in performance order
    pub program_ids: Vec<i64>,
    pub is_subprogram: bool,
    pub archived: bool,
    pub video_url: Option<String>,
    pub print_header: Option<String>,
    pub print_footer: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ProgramVersion {
    pub(crate) const COLUMNS: &'static str = "id, program_id, title, element_ids, program_ids, \
         is_subprogram, archived, video_url, print_header, print_footer, created_by, created_at";

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let element_ids: String = row.try_get("element_ids")?;
        let program_ids: String = row.try_get("program_ids")?;
        Ok(Self {
            id: row.try_get("id")?,
            program_id: row.try_get("program_id")?,
            title: row.try_get("title")?,
            element_ids: serde_json::from_str(&element_ids)?,
            program_ids: serde_json::from_str(&program_ids)?,
            is_subprogram: row.try_get("is_subprogram")?,
            archived: row.try_get("archived")?,
            video_url: row.try_get("video_url")?,
            print_header: row.try_get("print_header")?,
            print_footer: row.try_get("print_footer")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Vote weight, restricted to {-3, -1, 0, 1, 3}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct VoteWeight(i64);

impl VoteWeight {
    pub const ALLOWED: [i64; 5] = [-3, -1, 0, 1, 3];

    pub fn value(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for VoteWeight {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        if Self::ALLOWED.contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::invalid(
                "weight",
                format!("{} is not one of {:?}", value, Self::ALLOWED),
            ))
        }
    }
}

impl From<VoteWeight> for i64 {
    fn from(weight: VoteWeight) -> i64 {
        weight.0
    }
}

/// What aspect of the version a vote is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    /// The written arrangement (content)
    Content,
    /// The attached recording
    Audio,
}

/// Vote category; one vote per (version, user, category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteCategory {
    Quality,
    Singability,
}

macro_rules! text_enum {
    ($ty:ident, $field:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(Error::invalid($field, format!("unknown value '{}'", other))),
                }
            }
        }
    };
}

text_enum!(VoteType, "type", { Content => "content", Audio => "audio" });
text_enum!(VoteCategory, "category", { Quality => "quality", Singability => "singability" });

/// Vote row (internal; includes the voter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub version_id: i64,
    pub song_id: i64,
    pub user_id: String,
    pub weight: VoteWeight,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub category: VoteCategory,
    pub created_at: DateTime<Utc>,
}

impl Vote {
    pub(crate) const COLUMNS: &'static str =
        "id, version_id, song_id, user_id, weight, vote_type, category, created_at";

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        let weight: i64 = row.try_get("weight")?;
        let vote_type: String = row.try_get("vote_type")?;
        let category: String = row.try_get("category")?;
        Ok(Self {
            id: row.try_get("id")?,
            version_id: row.try_get("version_id")?,
            song_id: row.try_get("song_id")?,
            user_id: row.try_get("user_id")?,
            weight: VoteWeight::try_from(weight)
                .map_err(|e| Error::Internal(format!("stored vote: {}", e)))?,
            vote_type: vote_type
                .parse()
                .map_err(|e| Error::Internal(format!("stored vote: {}", e)))?,
            category: category
                .parse()
                .map_err(|e| Error::Internal(format!("stored vote: {}", e)))?,
            created_at: row.try_get("created_at")?,
        })
    }

    /// Strip the voter for public responses
    pub fn to_public(&self) -> PublicVote {
        PublicVote {
            id: self.id,
            version_id: self.version_id,
            song_id: self.song_id,
            weight: self.weight,
            vote_type: self.vote_type,
            category: self.category,
            created_at: self.created_at,
        }
    }
}

/// Vote as returned to public callers: no `user_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicVote {
    pub id: i64,
    pub version_id: i64,
    pub song_id: i64,
    pub weight: VoteWeight,
    #[serde(rename = "type")]
    pub vote_type: VoteType,
    pub category: VoteCategory,
    pub created_at: DateTime<Utc>,
}

/// Comment row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub version_id: i64,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub(crate) const COLUMNS: &'static str = "id, version_id, user_id, content, created_at";

    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            version_id: row.try_get("version_id")?,
            user_id: row.try_get("user_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_weight_accepts_only_allowed_values() {
        for w in VoteWeight::ALLOWED {
            assert_eq!(VoteWeight::try_from(w).unwrap().value(), w);
        }
        for w in [-2, 2, 4, -4, 100] {
            assert!(matches!(VoteWeight::try_from(w), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_vote_weight_deserialize_rejects_out_of_set() {
        assert!(serde_json::from_str::<VoteWeight>("2").is_err());
        assert_eq!(serde_json::from_str::<VoteWeight>("-3").unwrap().value(), -3);
    }

    #[test]
    fn test_enum_text_forms() {
        assert_eq!("singability".parse::<VoteCategory>().unwrap(), VoteCategory::Singability);
        assert_eq!(VoteType::Audio.to_string(), "audio");

        let err = "loudness".parse::<VoteCategory>().unwrap_err();
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_public_vote_has_no_user_id() {
        let vote = Vote {
            id: 1,
            version_id: 2,
            song_id: 3,
            user_id: "alice".to_string(),
            weight: VoteWeight::try_from(3).unwrap(),
            vote_type: VoteType::Content,
            category: VoteCategory::Quality,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(vote.to_public()).unwrap();
        assert!(json.get("user_id").is_none());
        assert_eq!(json["type"], "content");
        assert_eq!(json["weight"], 3);
    }
}
