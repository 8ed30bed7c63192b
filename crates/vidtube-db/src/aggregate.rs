//! Fixed read pipelines: filter, join, computed fields, projection, sort and
//! page, each expressed as one or two SQL statements.

use anyhow::Result;
use uuid::Uuid;
use vidtube_types::models::{ChannelProfile, CommentWithOwner, OwnerSummary, Page};

use crate::pagination::PageRequest;
use crate::{Database, OptionalExt, timestamp_at, uuid_at};

impl Database {
    /// Comments on a video, newest first, each joined with the owner's
    /// handle and email.
    pub fn video_comments(&self, video: Uuid, req: PageRequest) -> Result<Page<CommentWithOwner>> {
        let video = video.to_string();
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE video_id = ?1",
                [&video],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT c.id, c.content, c.video_id, c.created_at, c.updated_at,
                        u.id, u.username, u.email
                 FROM comments c
                 JOIN users u ON u.id = c.owner_id
                 WHERE c.video_id = ?1
                 ORDER BY c.created_at DESC, c.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let docs = stmt
                .query_map(
                    rusqlite::params![video, i64::from(req.limit()), req.offset()],
                    |row| {
                        Ok(CommentWithOwner {
                            id: uuid_at(row, 0)?,
                            content: row.get(1)?,
                            video: uuid_at(row, 2)?,
                            created_at: timestamp_at(row, 3)?,
                            updated_at: timestamp_at(row, 4)?,
                            owner: OwnerSummary {
                                id: uuid_at(row, 5)?,
                                username: row.get(6)?,
                                email: row.get(7)?,
                            },
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(req.into_page(docs, total as u64))
        })
    }

    /// Public channel view of the identity with handle `username`
    /// (case-folded), with subscription counts and whether `requester`
    /// is subscribed. `None` when no identity has that handle.
    pub fn channel_profile(
        &self,
        username: &str,
        requester: Option<Uuid>,
    ) -> Result<Option<ChannelProfile>> {
        let username = username.trim().to_lowercase();
        let requester = requester.map(|r| r.to_string());
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT u.id, u.full_name, u.username, u.email, u.avatar, u.cover_image,
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id),
                        (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id),
                        EXISTS(SELECT 1 FROM subscriptions s
                               WHERE s.channel_id = u.id AND s.subscriber_id = ?2)
                 FROM users u
                 WHERE u.username = ?1",
                rusqlite::params![username, requester],
                |row| {
                    Ok(ChannelProfile {
                        id: uuid_at(row, 0)?,
                        full_name: row.get(1)?,
                        username: row.get(2)?,
                        email: row.get(3)?,
                        avatar: row.get(4)?,
                        cover_image: row.get(5)?,
                        subscribers_count: row.get(6)?,
                        channels_subscribed_to_count: row.get(7)?,
                        is_subscribed: row.get(8)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Number of videos owned and the sum of their view counters.
    pub fn owner_video_totals(&self, owner: Uuid) -> Result<(i64, i64)> {
        self.with_conn(|conn| {
            let totals = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(views), 0) FROM videos WHERE owner_id = ?1",
                [owner.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(totals)
        })
    }

    pub fn subscriber_count(&self, channel: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?1",
                [channel.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Likes whose target video belongs to `owner`.
    pub fn likes_on_owner_videos(&self, owner: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 WHERE v.owner_id = ?1",
                [owner.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}
