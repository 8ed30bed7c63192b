use anyhow::Result;
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;
use vidtube_types::models::LikedVideo;

use crate::models::{LikeTarget, Toggle};
use crate::videos::{VIDEO_COLUMNS, video_from_row_at};
use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

impl Database {
    /// Toggle a like: removes it if present, inserts it otherwise.
    ///
    /// Runs as one immediate transaction on the writer connection, so two
    /// concurrent toggles on the same (user, target) serialize instead of
    /// racing into duplicate rows.
    pub fn toggle_like(&self, user: Uuid, target: LikeTarget) -> Result<Toggle> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let outcome = toggle_like_in(&tx, user, target)?;
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Videos the user has liked, most recent like first. Drafts of other
    /// channels are left out.
    pub fn liked_videos(&self, user: Uuid) -> Result<Vec<LikedVideo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT l.id, l.created_at, {VIDEO_COLUMNS}
                 FROM likes l
                 JOIN videos v ON v.id = l.video_id
                 WHERE l.liked_by = ?1 AND l.video_id IS NOT NULL
                   AND (v.is_published = 1 OR v.owner_id = ?1)
                 ORDER BY l.created_at DESC, l.rowid DESC"
            ))?;
            let rows = stmt
                .query_map([user.to_string()], |row| {
                    Ok(LikedVideo {
                        id: uuid_at(row, 0)?,
                        created_at: timestamp_at(row, 1)?,
                        video: video_from_row_at(row, 2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_likes(&self, target: LikeTarget) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                &format!("SELECT COUNT(*) FROM likes WHERE {} = ?1", target.column()),
                [target.id().to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn toggle_like_in(conn: &Connection, user: Uuid, target: LikeTarget) -> Result<Toggle> {
    let target_id = target.id().to_string();

    let exists: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", target.table()),
            [&target_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Ok(Toggle::Missing);
    }

    let removed = conn.execute(
        &format!("DELETE FROM likes WHERE liked_by = ?1 AND {} = ?2", target.column()),
        rusqlite::params![user.to_string(), target_id],
    )?;
    if removed > 0 {
        return Ok(Toggle::Removed);
    }

    conn.execute(
        &format!(
            "INSERT INTO likes (id, liked_by, {}, created_at) VALUES (?1, ?2, ?3, ?4)",
            target.column()
        ),
        rusqlite::params![new_id(), user.to_string(), target_id, now_timestamp()],
    )?;
    Ok(Toggle::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user, seed_video};

    #[test]
    fn serialized_toggles_alternate() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let video = seed_video(&db, alice, "clip", 0);
        let target = LikeTarget::Video(video);

        assert_eq!(db.toggle_like(alice, target).unwrap(), Toggle::Created);
        assert_eq!(db.count_likes(target).unwrap(), 1);
        assert_eq!(db.toggle_like(alice, target).unwrap(), Toggle::Removed);
        assert_eq!(db.count_likes(target).unwrap(), 0);
        assert_eq!(db.toggle_like(alice, target).unwrap(), Toggle::Created);
        assert_eq!(db.toggle_like(alice, target).unwrap(), Toggle::Removed);
        assert_eq!(db.count_likes(target).unwrap(), 0);
    }

    #[test]
    fn concurrent_toggles_never_duplicate() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let target = LikeTarget::Video(seed_video(&db, alice, "clip", 0));

        for rounds in [7usize, 8] {
            let before = db.count_likes(target).unwrap();
            std::thread::scope(|scope| {
                for _ in 0..rounds {
                    scope.spawn(|| db.toggle_like(alice, target).unwrap());
                }
            });
            let after = db.count_likes(target).unwrap();
            assert!(after <= 1);
            let flipped = rounds % 2 == 1;
            assert_eq!(after != before, flipped);
        }
    }

    #[test]
    fn missing_target_is_reported() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let outcome = db.toggle_like(alice, LikeTarget::Tweet(Uuid::new_v4())).unwrap();
        assert_eq!(outcome, Toggle::Missing);
    }

    #[test]
    fn likes_on_different_kinds_are_independent() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let video = seed_video(&db, alice, "clip", 0);
        let comment = db.create_comment(video, alice, "nice").unwrap();
        let tweet = db.create_tweet(alice, "hello").unwrap();

        db.toggle_like(alice, LikeTarget::Video(video)).unwrap();
        db.toggle_like(alice, LikeTarget::Comment(comment.id)).unwrap();
        db.toggle_like(alice, LikeTarget::Tweet(tweet.id)).unwrap();

        assert_eq!(db.count_likes(LikeTarget::Video(video)).unwrap(), 1);
        assert_eq!(db.count_likes(LikeTarget::Comment(comment.id)).unwrap(), 1);
        assert_eq!(db.count_likes(LikeTarget::Tweet(tweet.id)).unwrap(), 1);

        let liked = db.liked_videos(alice).unwrap();
        assert_eq!(liked.len(), 1);
        assert_eq!(liked[0].video.id, video);
    }

    #[test]
    fn like_row_requires_exactly_one_target() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let video = seed_video(&db, alice, "clip", 0);
        let tweet = db.create_tweet(alice, "hello").unwrap();

        let result = db.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO likes (id, liked_by, video_id, tweet_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    new_id(),
                    alice.to_string(),
                    video.to_string(),
                    tweet.id.to_string(),
                    now_timestamp()
                ],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }
}
