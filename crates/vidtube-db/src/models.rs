/// Database row types and write inputs. Rows carrying secrets (password hash,
/// refresh token) stay inside the store and API crates; everything exposed
/// over the wire uses the vidtube-types models.
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vidtube_types::models::PublicUser;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            avatar: self.avatar,
            cover_image: self.cover_image,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar: String,
    pub cover_image: String,
}

pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub video_file: String,
    pub thumbnail: String,
    pub duration: f64,
    pub owner: Uuid,
}

/// Fields an owner may change on a published video. `None` leaves the column
/// untouched.
#[derive(Debug, Default)]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
}

/// What a like points at. Exactly one target per like row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video(Uuid),
    Comment(Uuid),
    Tweet(Uuid),
}

impl LikeTarget {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::Video(_) => "video_id",
            Self::Comment(_) => "comment_id",
            Self::Tweet(_) => "tweet_id",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Video(_) => "videos",
            Self::Comment(_) => "comments",
            Self::Tweet(_) => "tweets",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Video(id) | Self::Comment(id) | Self::Tweet(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Video(_) => "video",
            Self::Comment(_) => "comment",
            Self::Tweet(_) => "tweet",
        }
    }
}

/// Result of an atomic create-or-delete toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The target does not exist.
    Missing,
    Created,
    Removed,
}
