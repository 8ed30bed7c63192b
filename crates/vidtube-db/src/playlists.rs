use anyhow::Result;
use rusqlite::Connection;
use uuid::Uuid;
use vidtube_types::models::{Playlist, PlaylistVideo};

use crate::{Database, OptionalExt, new_id, now_timestamp, timestamp_at, uuid_at};

const PLAYLIST_COLUMNS: &str = "id, name, description, owner_id, created_at, updated_at";

impl Database {
    pub fn create_playlist(&self, owner: Uuid, name: &str, description: &str) -> Result<Playlist> {
        let id = new_id();
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO playlists (id, name, description, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![id, name, description, owner.to_string(), now],
            )?;
            load_playlist(conn, &id, None)?.ok_or_else(|| anyhow::anyhow!("Playlist {} vanished", id))
        })
    }

    /// One playlist as `viewer` sees it: drafts of other channels are left
    /// out of its video list.
    pub fn get_playlist(&self, id: Uuid, viewer: Uuid) -> Result<Option<Playlist>> {
        self.with_conn(|conn| load_playlist(conn, &id.to_string(), Some(viewer)))
    }

    /// All playlists owned by `owner`, newest first, each with the videos
    /// `viewer` may see.
    pub fn playlists_by_owner(&self, owner: Uuid, viewer: Uuid) -> Result<Vec<Playlist>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM playlists WHERE owner_id = ?1 ORDER BY created_at DESC, rowid DESC",
            )?;
            let ids = stmt
                .query_map([owner.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut playlists = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(playlist) = load_playlist(conn, &id, Some(viewer))? {
                    playlists.push(playlist);
                }
            }
            Ok(playlists)
        })
    }

    /// Change name and/or description. `None` keeps the stored value.
    pub fn update_playlist(
        &self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Option<Playlist>> {
        let id = id.to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE playlists SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    updated_at = ?3
                 WHERE id = ?4",
                rusqlite::params![name, description, now_timestamp(), id],
            )?;
            load_playlist(conn, &id, None)
        })
    }

    pub fn delete_playlist(&self, id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM playlists WHERE id = ?1", [id.to_string()])?;
            Ok(removed == 1)
        })
    }

    /// Append a video; adding one that is already present is a no-op and
    /// keeps its original position.
    pub fn add_video_to_playlist(&self, playlist: Uuid, video: Uuid) -> Result<Option<Playlist>> {
        let playlist = playlist.to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO playlist_videos (playlist_id, video_id, position)
                 SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
                 FROM playlist_videos WHERE playlist_id = ?1",
                rusqlite::params![playlist, video.to_string()],
            )?;
            touch_playlist(conn, &playlist)?;
            load_playlist(conn, &playlist, None)
        })
    }

    pub fn remove_video_from_playlist(&self, playlist: Uuid, video: Uuid) -> Result<Option<Playlist>> {
        let playlist = playlist.to_string();
        self.with_conn_mut(|conn| {
            conn.execute(
                "DELETE FROM playlist_videos WHERE playlist_id = ?1 AND video_id = ?2",
                rusqlite::params![playlist, video.to_string()],
            )?;
            touch_playlist(conn, &playlist)?;
            load_playlist(conn, &playlist, None)
        })
    }
}

fn touch_playlist(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE playlists SET updated_at = ?1 WHERE id = ?2",
        rusqlite::params![now_timestamp(), id],
    )?;
    Ok(())
}

/// `viewer` defaults to the playlist owner, which is who mutations answer to.
fn load_playlist(conn: &Connection, id: &str, viewer: Option<Uuid>) -> Result<Option<Playlist>> {
    let playlist = conn
        .query_row(
            &format!("SELECT {PLAYLIST_COLUMNS} FROM playlists WHERE id = ?1"),
            [id],
            |row| {
                Ok(Playlist {
                    id: uuid_at(row, 0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    owner: uuid_at(row, 3)?,
                    videos: Vec::new(),
                    created_at: timestamp_at(row, 4)?,
                    updated_at: timestamp_at(row, 5)?,
                })
            },
        )
        .optional()?;

    let Some(mut playlist) = playlist else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT v.id, v.title, v.description
         FROM playlist_videos pv
         JOIN videos v ON v.id = pv.video_id
         WHERE pv.playlist_id = ?1 AND (v.is_published = 1 OR v.owner_id = ?2)
         ORDER BY pv.position",
    )?;
    let viewer = viewer.unwrap_or(playlist.owner).to_string();
    playlist.videos = stmt
        .query_map([id, viewer.as_str()], |row| {
            Ok(PlaylistVideo {
                id: uuid_at(row, 0)?,
                title: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(playlist))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user, seed_video};

    #[test]
    fn videos_are_ordered_and_deduplicated() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let first = seed_video(&db, alice, "first", 0);
        let second = seed_video(&db, alice, "second", 0);
        let playlist = db.create_playlist(alice, "mix", "").unwrap();

        db.add_video_to_playlist(playlist.id, first).unwrap();
        db.add_video_to_playlist(playlist.id, second).unwrap();
        let after = db.add_video_to_playlist(playlist.id, first).unwrap().unwrap();

        let ids: Vec<_> = after.videos.iter().map(|v| v.id).collect();
        assert_eq!(ids, [first, second]);

        let after = db.remove_video_from_playlist(playlist.id, first).unwrap().unwrap();
        assert_eq!(after.videos.len(), 1);
        assert_eq!(after.videos[0].title, "second");
    }

    #[test]
    fn other_channels_drafts_are_hidden_from_viewers() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let bob = seed_user(&db, "bob");
        let live = seed_video(&db, bob, "live", 0);
        let draft = seed_video(&db, bob, "draft", 0);
        let playlist = db.create_playlist(alice, "mix", "").unwrap();
        db.add_video_to_playlist(playlist.id, live).unwrap();
        db.add_video_to_playlist(playlist.id, draft).unwrap();
        db.toggle_publish(draft).unwrap();

        let seen_by_alice = db.get_playlist(playlist.id, alice).unwrap().unwrap();
        let titles: Vec<_> = seen_by_alice.videos.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["live"]);

        let seen_by_bob = db.get_playlist(playlist.id, bob).unwrap().unwrap();
        assert_eq!(seen_by_bob.videos.len(), 2);
    }

    #[test]
    fn update_keeps_missing_fields() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let playlist = db.create_playlist(alice, "mix", "chill").unwrap();

        let updated = db.update_playlist(playlist.id, Some("remix"), None).unwrap().unwrap();
        assert_eq!(updated.name, "remix");
        assert_eq!(updated.description, "chill");

        assert!(db.update_playlist(Uuid::new_v4(), Some("x"), None).unwrap().is_none());
    }

    #[test]
    fn owner_listing_and_delete() {
        let (_dir, db) = open_temp();
        let alice = seed_user(&db, "alice");
        let older = db.create_playlist(alice, "older", "").unwrap();
        db.create_playlist(alice, "newer", "").unwrap();

        let names: Vec<_> = db
            .playlists_by_owner(alice, alice)
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, ["newer", "older"]);

        assert!(db.delete_playlist(older.id).unwrap());
        assert_eq!(db.playlists_by_owner(alice, alice).unwrap().len(), 1);
    }
}
