use anyhow::Result;
use rusqlite::{Connection, Row};
use uuid::Uuid;

use crate::models::{NewUser, UserRow};
use crate::{Database, OptionalExt, is_unique_violation, new_id, now_timestamp, timestamp_at, uuid_at};

const USER_COLUMNS: &str = "id, username, email, full_name, password, avatar, cover_image, refresh_token, created_at, updated_at";

impl Database {
    /// Insert a new identity. Returns `None` when the username or email is
    /// already registered. Username and email are stored lower-cased.
    pub fn create_user(&self, user: &NewUser) -> Result<Option<Uuid>> {
        let id = new_id();
        let now = now_timestamp();
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, email, full_name, password, avatar, cover_image, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                rusqlite::params![
                    id,
                    user.username.to_lowercase(),
                    user.email.to_lowercase(),
                    user.full_name,
                    user.password_hash,
                    user.avatar,
                    user.cover_image,
                    now,
                ],
            );
            match inserted {
                Ok(_) => Ok(Some(id.parse()?)),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &id.to_string()))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username = ?1", &username.to_lowercase()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &email.to_lowercase()))
    }

    /// Existence check for a referenced identity (channel, tweet owner, ...).
    pub fn user_exists(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Refresh token --

    /// Overwrite (or clear, with `None`) the single active refresh token.
    pub fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token = ?1 WHERE id = ?2",
                rusqlite::params![token, id.to_string()],
            )?;
            Ok(changed == 1)
        })
    }

    /// Compare-and-swap the refresh token: only succeeds while `current` is
    /// still the persisted value.
    pub fn replace_refresh_token(&self, id: Uuid, current: &str, next: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET refresh_token = ?1 WHERE id = ?2 AND refresh_token = ?3",
                rusqlite::params![next, id.to_string(), current],
            )?;
            Ok(changed == 1)
        })
    }

    // -- Account --

    pub fn update_password(&self, id: Uuid, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET password = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![password_hash, now_timestamp(), id.to_string()],
            )?;
            Ok(())
        })
    }

    /// Returns `false` when the email is already used by another identity.
    pub fn update_account(&self, id: Uuid, full_name: &str, email: &str) -> Result<bool> {
        let email = email.to_lowercase();
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users SET full_name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4",
                rusqlite::params![full_name, email, now_timestamp(), id.to_string()],
            );
            match updated {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn update_avatar(&self, id: Uuid, url: &str) -> Result<()> {
        self.update_image_column(id, "avatar", url)
    }

    pub fn update_cover_image(&self, id: Uuid, url: &str) -> Result<()> {
        self.update_image_column(id, "cover_image", url)
    }

    fn update_image_column(&self, id: Uuid, column: &'static str, url: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                &format!("UPDATE users SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                rusqlite::params![url, now_timestamp(), id.to_string()],
            )?;
            Ok(())
        })
    }
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"))?;
    stmt.query_row([value], user_from_row).optional()
}

pub(crate) fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: uuid_at(row, 0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        full_name: row.get(3)?,
        password: row.get(4)?,
        avatar: row.get(5)?,
        cover_image: row.get(6)?,
        refresh_token: row.get(7)?,
        created_at: timestamp_at(row, 8)?,
        updated_at: timestamp_at(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, seed_user};

    fn alice() -> NewUser {
        NewUser {
            username: "Alice".into(),
            email: "a@x.com".into(),
            full_name: "Alice A".into(),
            password_hash: "hash".into(),
            avatar: "https://media.test/a.png".into(),
            cover_image: String::new(),
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (_dir, db) = open_temp();
        assert!(db.create_user(&alice()).unwrap().is_some());
        assert!(db.create_user(&alice()).unwrap().is_none());

        let mut same_email = alice();
        same_email.username = "other".into();
        assert!(db.create_user(&same_email).unwrap().is_none());
    }

    #[test]
    fn username_is_case_folded() {
        let (_dir, db) = open_temp();
        let id = db.create_user(&alice()).unwrap().unwrap();
        let row = db.get_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.username, "alice");
    }

    #[test]
    fn email_is_case_folded() {
        let (_dir, db) = open_temp();
        let id = db.create_user(&alice()).unwrap().unwrap();
        assert_eq!(db.get_user_by_email("A@X.COM").unwrap().unwrap().id, id);

        let mut shouting = alice();
        shouting.username = "alice2".into();
        shouting.email = "A@X.com".into();
        assert!(db.create_user(&shouting).unwrap().is_none());

        let bob = seed_user(&db, "bob");
        assert!(!db.update_account(bob, "Bob", "A@x.COM").unwrap());
        assert!(db.update_account(bob, "Bob", "Bob@Example.COM").unwrap());
        assert_eq!(db.get_user_by_id(bob).unwrap().unwrap().email, "bob@example.com");
    }

    #[test]
    fn refresh_token_compare_and_swap() {
        let (_dir, db) = open_temp();
        let id = seed_user(&db, "bob");

        assert!(!db.replace_refresh_token(id, "nothing-stored", "t1").unwrap());
        db.set_refresh_token(id, Some("t1")).unwrap();
        assert!(db.replace_refresh_token(id, "t1", "t2").unwrap());
        assert!(!db.replace_refresh_token(id, "t1", "t3").unwrap());

        db.set_refresh_token(id, None).unwrap();
        let row = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(row.refresh_token, None);
    }

    #[test]
    fn update_account_detects_taken_email() {
        let (_dir, db) = open_temp();
        let bob = seed_user(&db, "bob");
        seed_user(&db, "carol");

        assert!(!db.update_account(bob, "Bob", "carol@example.com").unwrap());
        assert!(db.update_account(bob, "Bob B", "bob2@example.com").unwrap());
        let row = db.get_user_by_id(bob).unwrap().unwrap();
        assert_eq!(row.full_name, "Bob B");
        assert_eq!(row.email, "bob2@example.com");
    }
}
