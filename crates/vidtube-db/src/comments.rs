use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;
use vidtube_types::models::Comment;

use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

const COMMENT_COLUMNS: &str = "id, content, video_id, owner_id, created_at, updated_at";

impl Database {
    pub fn create_comment(&self, video: Uuid, owner: Uuid, content: &str) -> Result<Comment> {
        let id = new_id();
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO comments (id, content, video_id, owner_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING {COMMENT_COLUMNS}"
                ),
                rusqlite::params![id, content, video.to_string(), owner.to_string(), now],
                comment_from_row,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                [id.to_string()],
                comment_from_row,
            )
            .optional()
        })
    }

    pub fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<Comment>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE comments SET content = ?1, updated_at = ?2 WHERE id = ?3
                     RETURNING {COMMENT_COLUMNS}"
                ),
                rusqlite::params![content, now_timestamp(), id.to_string()],
                comment_from_row,
            )
            .optional()
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(removed == 1)
        })
    }
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_at(row, 0)?,
        content: row.get(1)?,
        video: uuid_at(row, 2)?,
        owner: uuid_at(row, 3)?,
        created_at: timestamp_at(row, 4)?,
        updated_at: timestamp_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user, seed_video};

    #[test]
    fn comment_lifecycle() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let video = seed_video(&db, alice, "clip", 0);

        let comment = db.create_comment(video, alice, "first!").unwrap();
        assert_eq!(comment.owner, alice);
        assert_eq!(comment.video, video);

        let updated = db.update_comment(comment.id, "edited").unwrap().unwrap();
        assert_eq!(updated.content, "edited");
        assert!(updated.updated_at >= comment.updated_at);

        assert!(db.delete_comment(comment.id).unwrap());
        assert!(db.get_comment(comment.id).unwrap().is_none());
        assert!(db.update_comment(comment.id, "gone").unwrap().is_none());
    }

    #[test]
    fn deleting_video_cascades_to_comments() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let video = seed_video(&db, alice, "clip", 0);
        let comment = db.create_comment(video, alice, "hi").unwrap();

        assert!(db.delete_video(video).unwrap());
        assert!(db.get_comment(comment.id).unwrap().is_none());
    }
}
