use anyhow::Result;
use rusqlite::TransactionBehavior;
use uuid::Uuid;
use vidtube_types::models::{ChannelSummary, SubscribedChannelEntry, SubscriberEntry};

use crate::models::Toggle;
use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

impl Database {
    /// Subscribe `subscriber` to `channel`, or unsubscribe if already
    /// subscribed. Same single-transaction shape as like toggles.
    pub fn toggle_subscription(&self, subscriber: Uuid, channel: Uuid) -> Result<Toggle> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let channel_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM users WHERE id = ?1", [channel.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            if channel_exists.is_none() {
                return Ok(Toggle::Missing);
            }

            let removed = tx.execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1 AND channel_id = ?2",
                rusqlite::params![subscriber.to_string(), channel.to_string()],
            )?;
            let outcome = if removed > 0 {
                Toggle::Removed
            } else {
                tx.execute(
                    "INSERT INTO subscriptions (id, subscriber_id, channel_id, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![
                        new_id(),
                        subscriber.to_string(),
                        channel.to_string(),
                        now_timestamp()
                    ],
                )?;
                Toggle::Created
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Everyone subscribed to `channel`, newest subscription first.
    pub fn channel_subscribers(&self, channel: Uuid) -> Result<Vec<SubscriberEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.created_at, u.id, u.username, u.email, u.avatar
                 FROM subscriptions s
                 JOIN users u ON u.id = s.subscriber_id
                 WHERE s.channel_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )?;
            let rows = stmt
                .query_map([channel.to_string()], |row| {
                    Ok(SubscriberEntry {
                        id: uuid_at(row, 0)?,
                        created_at: timestamp_at(row, 1)?,
                        subscriber: ChannelSummary {
                            id: uuid_at(row, 2)?,
                            username: row.get(3)?,
                            email: row.get(4)?,
                            avatar: row.get(5)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Channels `subscriber` follows, newest subscription first.
    pub fn subscribed_channels(&self, subscriber: Uuid) -> Result<Vec<SubscribedChannelEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.created_at, u.id, u.username, u.email, u.avatar
                 FROM subscriptions s
                 JOIN users u ON u.id = s.channel_id
                 WHERE s.subscriber_id = ?1
                 ORDER BY s.created_at DESC, s.rowid DESC",
            )?;
            let rows = stmt
                .query_map([subscriber.to_string()], |row| {
                    Ok(SubscribedChannelEntry {
                        id: uuid_at(row, 0)?,
                        created_at: timestamp_at(row, 1)?,
                        channel: ChannelSummary {
                            id: uuid_at(row, 2)?,
                            username: row.get(3)?,
                            email: row.get(4)?,
                            avatar: row.get(5)?,
                        },
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user};

    #[test]
    fn toggle_and_list_both_directions() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        let carol = seed_user(&db, "carol");

        assert_eq!(db.toggle_subscription(bob, alice).unwrap(), Toggle::Created);
        assert_eq!(db.toggle_subscription(carol, alice).unwrap(), Toggle::Created);

        let subs = db.channel_subscribers(alice).unwrap();
        let names: Vec<_> = subs.iter().map(|s| s.subscriber.username.as_str()).collect();
        assert_eq!(names, ["carol", "bob"]);

        let following = db.subscribed_channels(bob).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].channel.id, alice);

        assert_eq!(db.toggle_subscription(bob, alice).unwrap(), Toggle::Removed);
        assert_eq!(db.channel_subscribers(alice).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_toggles_never_duplicate() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");

        for rounds in [5usize, 6] {
            let before = db.channel_subscribers(alice).unwrap().len();
            std::thread::scope(|scope| {
                for _ in 0..rounds {
                    scope.spawn(|| db.toggle_subscription(bob, alice).unwrap());
                }
            });
            let after = db.channel_subscribers(alice).unwrap().len();
            assert!(after <= 1);
            assert_eq!(after != before, rounds % 2 == 1);
        }
    }

    #[test]
    fn unknown_channel_is_missing() {
        let (_dir, db) = open_temp();
        let bob = seed_user(&db, "bob");
        assert_eq!(
            db.toggle_subscription(bob, Uuid::new_v4()).unwrap(),
            Toggle::Missing
        );
    }
}
