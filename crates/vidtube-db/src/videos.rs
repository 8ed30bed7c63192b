use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::ToSql;
use uuid::Uuid;
use vidtube_types::models::{Page, Video};

use crate::models::{NewVideo, VideoPatch};
use crate::query::{SortField, VideoQuery, like_pattern};
use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

pub(crate) const VIDEO_COLUMNS: &str = "v.id, v.title, v.description, v.video_file, v.thumbnail, v.duration, v.views, v.is_published, v.owner_id, v.created_at, v.updated_at";

impl Database {
    pub fn create_video(&self, video: &NewVideo) -> Result<Uuid> {
        let id = new_id();
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO videos (id, title, description, video_file, thumbnail, duration, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id,
                    video.title,
                    video.description,
                    video.video_file,
                    video.thumbnail,
                    video.duration,
                    video.owner.to_string(),
                    now,
                ],
            )?;
            Ok(())
        })?;
        Ok(id.parse()?)
    }

    pub fn get_video(&self, id: Uuid) -> Result<Option<Video>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.id = ?1"),
                [id.to_string()],
                video_from_row,
            )
            .optional()
        })
    }

    /// Execute a built listing query: filter, sort, then page.
    pub fn list_videos(&self, query: &VideoQuery) -> Result<Page<Video>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(owner) = query.owner() {
            params.push(Box::new(owner.to_string()));
            clauses.push("v.owner_id = ?");
        }
        if let Some(text) = query.search() {
            params.push(Box::new(like_pattern(text)));
            params.push(Box::new(like_pattern(text)));
            clauses.push("(v.title LIKE ? ESCAPE '\\' OR v.description LIKE ? ESCAPE '\\')");
        }
        if query.published_only() {
            clauses.push("v.is_published = 1");
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let (field, direction) = query.sort();
        // Ties on creation time fall back to insertion order in the same
        // direction; other sort keys keep natural storage order.
        let tie_break = if field == SortField::CreatedAt {
            direction.keyword()
        } else {
            "ASC"
        };
        let order_sql = format!(
            "ORDER BY v.{} {}, v.rowid {}",
            field.column(),
            direction.keyword(),
            tie_break
        );

        let page = query.page();
        self.with_conn(|conn| {
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM videos v {where_sql}"),
                param_refs.as_slice(),
                |row| row.get(0),
            )?;

            let limit = i64::from(page.limit());
            let offset = page.offset();
            let mut paged_refs = param_refs.clone();
            paged_refs.push(&limit);
            paged_refs.push(&offset);

            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos v {where_sql} {order_sql} LIMIT ? OFFSET ?"
            ))?;
            let docs = stmt
                .query_map(paged_refs.as_slice(), video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(page.into_page(docs, total as u64))
        })
    }

    /// The video exists and `viewer` may see it: published, or their own.
    pub fn video_visible_to(&self, id: Uuid, viewer: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM videos WHERE id = ?1 AND (is_published = 1 OR owner_id = ?2)",
                    [id.to_string(), viewer.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// All videos of one owner, newest first.
    pub fn videos_by_owner(&self, owner: Uuid) -> Result<Vec<Video>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {VIDEO_COLUMNS} FROM videos v WHERE v.owner_id = ?1
                 ORDER BY v.created_at DESC, v.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([owner.to_string()], video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_video(&self, id: Uuid, patch: &VideoPatch) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE videos SET
                    title = COALESCE(?1, title),
                    description = COALESCE(?2, description),
                    thumbnail = COALESCE(?3, thumbnail),
                    updated_at = ?4
                 WHERE id = ?5",
                rusqlite::params![
                    patch.title,
                    patch.description,
                    patch.thumbnail,
                    now_timestamp(),
                    id.to_string(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_video(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM videos WHERE id = ?1", [id.to_string()])?;
            Ok(removed == 1)
        })
    }

    /// Flip the publish flag; returns the new value, or `None` if the video
    /// does not exist.
    pub fn toggle_publish(&self, id: Uuid) -> Result<Option<bool>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                "UPDATE videos SET is_published = 1 - is_published, updated_at = ?1
                 WHERE id = ?2 RETURNING is_published",
                rusqlite::params![now_timestamp(), id.to_string()],
                |row| row.get::<_, bool>(0),
            )
            .optional()
        })
    }

    pub fn increment_views(&self, id: Uuid) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE videos SET views = views + 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            Ok(())
        })
    }
}

pub(crate) fn video_from_row(row: &Row<'_>) -> rusqlite::Result<Video> {
    video_from_row_at(row, 0)
}

/// Read the eleven `VIDEO_COLUMNS` starting at `base`.
pub(crate) fn video_from_row_at(row: &Row<'_>, base: usize) -> rusqlite::Result<Video> {
    Ok(Video {
        id: uuid_at(row, base)?,
        title: row.get(base + 1)?,
        description: row.get(base + 2)?,
        video_file: row.get(base + 3)?,
        thumbnail: row.get(base + 4)?,
        duration: row.get(base + 5)?,
        views: row.get(base + 6)?,
        is_published: row.get(base + 7)?,
        owner: uuid_at(row, base + 8)?,
        created_at: timestamp_at(row, base + 9)?,
        updated_at: timestamp_at(row, base + 10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::PageRequest;
    use crate::test_support::{open_temp, seed_user, seed_video};

    #[test]
    fn listing_filters_and_sorts() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        seed_video(&db, alice, "rust intro", 10);
        seed_video(&db, alice, "rust async", 30);
        seed_video(&db, bob, "cooking", 20);

        let q = VideoQuery::builder()
            .owner(Some(alice))
            .sort(Some("views".into()), Some("desc".into()))
            .build()
            .unwrap();
        let page = db.list_videos(&q).unwrap();
        assert_eq!(page.total_docs, 2);
        let titles: Vec<_> = page.docs.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["rust async", "rust intro"]);

        let q = VideoQuery::builder().search(Some("ASYNC".into())).build().unwrap();
        let page = db.list_videos(&q).unwrap();
        assert_eq!(page.docs.len(), 1);
        assert_eq!(page.docs[0].title, "rust async");
    }

    #[test]
    fn listing_defaults_to_newest_first_and_pages() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        for i in 0..7 {
            seed_video(&db, alice, &format!("v{i}"), 0);
        }

        let q = VideoQuery::builder()
            .page(PageRequest::new(Some(2), Some(3)))
            .build()
            .unwrap();
        let page = db.list_videos(&q).unwrap();
        let titles: Vec<_> = page.docs.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["v3", "v2", "v1"]);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn unpublished_videos_hidden_when_requested() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let hidden = seed_video(&db, alice, "draft", 0);
        seed_video(&db, alice, "live", 0);

        assert_eq!(db.toggle_publish(hidden).unwrap(), Some(false));

        let q = VideoQuery::builder().published_only(true).build().unwrap();
        let page = db.list_videos(&q).unwrap();
        assert_eq!(page.total_docs, 1);
        assert_eq!(page.docs[0].title, "live");

        assert_eq!(db.toggle_publish(hidden).unwrap(), Some(true));
        assert_eq!(db.toggle_publish(Uuid::new_v4()).unwrap(), None);
    }

    #[test]
    fn drafts_are_visible_to_their_owner_only() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        let draft = seed_video(&db, alice, "draft", 0);

        assert!(db.video_visible_to(draft, bob).unwrap());
        db.toggle_publish(draft).unwrap();
        assert!(db.video_visible_to(draft, alice).unwrap());
        assert!(!db.video_visible_to(draft, bob).unwrap());
        assert!(!db.video_visible_to(Uuid::new_v4(), alice).unwrap());
    }

    #[test]
    fn patch_keeps_untouched_columns() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let id = seed_video(&db, alice, "original", 0);

        db.update_video(
            id,
            &VideoPatch {
                title: Some("renamed".into()),
                ..Default::default()
            },
        )
        .unwrap();
        db.increment_views(id).unwrap();

        let video = db.get_video(id).unwrap().unwrap();
        assert_eq!(video.title, "renamed");
        assert_eq!(video.description, "about original");
        assert_eq!(video.views, 1);
    }
}
