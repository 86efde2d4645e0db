use crate::Database;
use crate::models::{MessageRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    // -- Messages --

    pub fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, creator_id, content, view_token, secret, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    row.id,
                    row.creator_id,
                    row.content,
                    row.view_token,
                    row.secret,
                    row.expires_at,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// True when another record already holds this view token. The
    /// allocator's pre-check; the UNIQUE constraint remains the backstop.
    pub fn token_exists(&self, view_token: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE view_token = ?1",
                [view_token],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn find_by_view_token(&self, view_token: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE view_token = ?1"
            ))?;
            stmt.query_row([view_token], read_message_row).optional()
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"
            ))?;
            stmt.query_row([id], read_message_row).optional()
        })
    }

    pub fn list_by_creator(&self, creator_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE creator_id = ?1
                 ORDER BY created_at DESC"
            ))?;
            let rows = stmt
                .query_map([creator_id], read_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Compare-and-set for the one-time view: marks the message viewed only
    /// if nobody has viewed it yet and it has not expired. Returns false when
    /// the transition was lost and the caller reports a uniform not-found.
    pub fn mark_viewed(&self, view_token: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET viewed_at = ?2
                 WHERE view_token = ?1 AND viewed_at IS NULL AND expires_at > ?2",
                (view_token, now),
            )?;
            Ok(changed > 0)
        })
    }

    /// Compare-and-set for the single response: allowed once, after the view
    /// and before expiry.
    pub fn set_response(&self, view_token: &str, response: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET response = ?2
                 WHERE view_token = ?1 AND viewed_at IS NOT NULL
                   AND response IS NULL AND expires_at > ?3",
                (view_token, response, now),
            )?;
            Ok(changed > 0)
        })
    }

    /// Replace content (and token, when a secret message was re-sealed) of a
    /// still-pending message.
    pub fn update_content(
        &self,
        id: &str,
        creator_id: &str,
        content: &str,
        view_token: &str,
        secret: bool,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET content = ?3, view_token = ?4, secret = ?5
                 WHERE id = ?1 AND creator_id = ?2 AND viewed_at IS NULL",
                rusqlite::params![id, creator_id, content, view_token, secret],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn update_expiry(&self, id: &str, creator_id: &str, expires_at: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET expires_at = ?3
                 WHERE id = ?1 AND creator_id = ?2 AND viewed_at IS NULL",
                (id, creator_id, expires_at),
            )?;
            Ok(changed > 0)
        })
    }

    pub fn delete_message(&self, id: &str, creator_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND creator_id = ?2",
                (id, creator_id),
            )?;
            Ok(changed > 0)
        })
    }

    /// Physically drop everything past its deadline. Passive expiry never
    /// depends on this running; it only bounds residue.
    pub fn purge_expired(&self, now: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let purged = conn.execute("DELETE FROM messages WHERE expires_at <= ?1", [now])?;
            Ok(purged)
        })
    }
}

const MESSAGE_COLUMNS: &str =
    "id, creator_id, content, view_token, secret, expires_at, viewed_at, response, created_at";

fn read_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        creator_id: row.get(1)?,
        content: row.get(2)?,
        view_token: row.get(3)?,
        secret: row.get(4)?,
        expires_at: row.get(5)?,
        viewed_at: row.get(6)?,
        response: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// True when an insert bounced off a UNIQUE constraint: the store's
/// authoritative answer to a token collision the pre-check missed.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::format_ts;
    use chrono::{Duration, Utc};

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user("creator-1", "ada", "hash").unwrap();
        db
    }

    fn row(token: &str, expires_at: &str) -> MessageRow {
        MessageRow {
            id: format!("msg-{token}"),
            creator_id: "creator-1".into(),
            content: r#"["hi"]"#.into(),
            view_token: token.into(),
            secret: false,
            expires_at: expires_at.into(),
            viewed_at: None,
            response: None,
            created_at: format_ts(Utc::now()),
        }
    }

    #[test]
    fn duplicate_view_token_is_a_unique_violation() {
        let db = test_db();
        let later = format_ts(Utc::now() + Duration::hours(1));

        db.insert_message(&row("brave-falcon", &later)).unwrap();

        let mut dup = row("brave-falcon", &later);
        dup.id = "msg-other".into();
        let err = db.insert_message(&dup).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn mark_viewed_wins_exactly_once() {
        let db = test_db();
        let now = Utc::now();
        let later = format_ts(now + Duration::hours(1));
        db.insert_message(&row("calm-otter", &later)).unwrap();

        let now = format_ts(now);
        assert!(db.mark_viewed("calm-otter", &now).unwrap());
        assert!(!db.mark_viewed("calm-otter", &now).unwrap());

        let seen = db.find_by_view_token("calm-otter").unwrap().unwrap();
        assert_eq!(seen.viewed_at.as_deref(), Some(now.as_str()));
    }

    #[test]
    fn mark_viewed_refuses_expired() {
        let db = test_db();
        let now = Utc::now();
        let past = format_ts(now - Duration::hours(1));
        db.insert_message(&row("tidy-heron", &past)).unwrap();

        assert!(!db.mark_viewed("tidy-heron", &format_ts(now)).unwrap());
    }

    #[test]
    fn response_requires_a_prior_view_and_sets_once() {
        let db = test_db();
        let now = Utc::now();
        let later = format_ts(now + Duration::hours(1));
        db.insert_message(&row("sunny-brook", &later)).unwrap();
        let now = format_ts(now);

        assert!(!db.set_response("sunny-brook", "\u{1f389}", &now).unwrap());
        assert!(db.mark_viewed("sunny-brook", &now).unwrap());
        assert!(db.set_response("sunny-brook", "\u{1f389}", &now).unwrap());
        assert!(!db.set_response("sunny-brook", "\u{1f614}", &now).unwrap());

        let seen = db.find_by_view_token("sunny-brook").unwrap().unwrap();
        assert_eq!(seen.response.as_deref(), Some("\u{1f389}"));
    }

    #[test]
    fn updates_only_touch_pending_messages() {
        let db = test_db();
        let now = Utc::now();
        let later = format_ts(now + Duration::hours(1));
        db.insert_message(&row("witty-plum", &later)).unwrap();

        let farther = format_ts(now + Duration::hours(48));
        assert!(db.update_expiry("msg-witty-plum", "creator-1", &farther).unwrap());

        assert!(db.mark_viewed("witty-plum", &format_ts(now)).unwrap());
        assert!(!db.update_expiry("msg-witty-plum", "creator-1", &farther).unwrap());
        assert!(
            !db.update_content("msg-witty-plum", "creator-1", "[]", "witty-plum", false)
                .unwrap()
        );
    }

    #[test]
    fn delete_reports_missing_rows() {
        let db = test_db();
        let later = format_ts(Utc::now() + Duration::hours(1));
        db.insert_message(&row("rosy-fern", &later)).unwrap();

        assert!(db.delete_message("msg-rosy-fern", "creator-1").unwrap());
        assert!(!db.delete_message("msg-rosy-fern", "creator-1").unwrap());
    }

    #[test]
    fn purge_drops_only_expired_rows() {
        let db = test_db();
        let now = Utc::now();
        db.insert_message(&row("lucky-reef", &format_ts(now - Duration::minutes(5))))
            .unwrap();
        db.insert_message(&row("merry-pine", &format_ts(now + Duration::minutes(5))))
            .unwrap();

        assert_eq!(db.purge_expired(&format_ts(now)).unwrap(), 1);
        assert!(db.find_by_view_token("lucky-reef").unwrap().is_none());
        assert!(db.find_by_view_token("merry-pine").unwrap().is_some());
    }
}
