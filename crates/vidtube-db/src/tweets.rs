use anyhow::Result;
use rusqlite::Row;
use uuid::Uuid;
use vidtube_types::models::{ChannelSummary, Page, Tweet, TweetWithOwner};

use crate::pagination::PageRequest;
use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

const TWEET_COLUMNS: &str = "id, content, owner_id, created_at, updated_at";

impl Database {
    pub fn create_tweet(&self, owner: Uuid, content: &str) -> Result<Tweet> {
        let id = new_id();
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "INSERT INTO tweets (id, content, owner_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4) RETURNING {TWEET_COLUMNS}"
                ),
                rusqlite::params![id, content, owner.to_string(), now],
                tweet_from_row,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_tweet(&self, id: Uuid) -> Result<Option<Tweet>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id = ?1"),
                [id.to_string()],
                tweet_from_row,
            )
            .optional()
        })
    }

    pub fn update_tweet(&self, id: Uuid, content: &str) -> Result<Option<Tweet>> {
        self.with_conn_mut(|conn| {
            conn.query_row(
                &format!(
                    "UPDATE tweets SET content = ?1, updated_at = ?2 WHERE id = ?3
                     RETURNING {TWEET_COLUMNS}"
                ),
                rusqlite::params![content, now_timestamp(), id.to_string()],
                tweet_from_row,
            )
            .optional()
        })
    }

    pub fn delete_tweet(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM tweets WHERE id = ?1", [id.to_string()])?;
            Ok(removed == 1)
        })
    }

    /// Newest-first tweets, optionally restricted to one owner, with the
    /// owner's public fields joined in.
    pub fn list_tweets(&self, owner: Option<Uuid>, req: PageRequest) -> Result<Page<TweetWithOwner>> {
        let owner = owner.map(|o| o.to_string());
        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tweets WHERE ?1 IS NULL OR owner_id = ?1",
                [&owner],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT t.id, t.content, t.created_at, t.updated_at,
                        u.id, u.username, u.email, u.avatar
                 FROM tweets t
                 JOIN users u ON u.id = t.owner_id
                 WHERE ?1 IS NULL OR t.owner_id = ?1
                 ORDER BY t.created_at DESC, t.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let docs = stmt
                .query_map(
                    rusqlite::params![owner, i64::from(req.limit()), req.offset()],
                    |row| {
                        Ok(TweetWithOwner {
                            id: uuid_at(row, 0)?,
                            content: row.get(1)?,
                            created_at: timestamp_at(row, 2)?,
                            updated_at: timestamp_at(row, 3)?,
                            owner: ChannelSummary {
                                id: uuid_at(row, 4)?,
                                username: row.get(5)?,
                                email: row.get(6)?,
                                avatar: row.get(7)?,
                            },
                        })
                    },
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(req.into_page(docs, total as u64))
        })
    }
}

fn tweet_from_row(row: &Row<'_>) -> rusqlite::Result<Tweet> {
    Ok(Tweet {
        id: uuid_at(row, 0)?,
        content: row.get(1)?,
        owner: uuid_at(row, 2)?,
        created_at: timestamp_at(row, 3)?,
        updated_at: timestamp_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user};

    #[test]
    fn list_filters_by_owner() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        db.create_tweet(alice, "a1").unwrap();
        db.create_tweet(bob, "b1").unwrap();
        db.create_tweet(alice, "a2").unwrap();

        let all = db.list_tweets(None, PageRequest::default()).unwrap();
        assert_eq!(all.total_docs, 3);
        assert_eq!(all.docs[0].content, "a2");

        let mine = db.list_tweets(Some(alice), PageRequest::default()).unwrap();
        let contents: Vec<_> = mine.docs.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["a2", "a1"]);
        assert_eq!(mine.docs[0].owner.username, "alice");
    }

    #[test]
    fn update_and_delete() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let tweet = db.create_tweet(alice, "draft").unwrap();

        let updated = db.update_tweet(tweet.id, "final").unwrap().unwrap();
        assert_eq!(updated.content, "final");
        assert!(db.delete_tweet(tweet.id).unwrap());
        assert!(!db.delete_tweet(tweet.id).unwrap());
        assert!(db.get_tweet(tweet.id).unwrap().is_none());
    }
}
