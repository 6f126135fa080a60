use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{UserRow, UserSummaryRow};
use crate::{Database, DbError, Result, now_timestamp};

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, bio, profile_picture, created_at, updated_at";

impl Database {
    /// Insert a user. Duplicate usernames or emails are rejected by the UNIQUE
    /// constraints and come back as [`DbError::Conflict`].
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<UserRow> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, username, email, password_hash, now],
            )
            .map_err(DbError::from_user_insert)?;

            Ok(UserRow {
                id: id.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                display_name: None,
                bio: None,
                profile_picture: None,
                created_at: now.clone(),
                updated_at: now,
            })
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Look a user up by username or email. `None` arguments never match.
    pub fn find_user_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM users WHERE username = ?1 OR email = ?2
                 ORDER BY CASE WHEN username = ?1 THEN 0 ELSE 1 END
                 LIMIT 1",
                USER_COLUMNS
            );
            let row = conn
                .query_row(&sql, params![username, email], row_to_user)
                .optional()?;
            Ok(row)
        })
    }

    /// Self-service profile update. `None` keeps the stored value, an empty
    /// string clears it. Returns `None` if the user does not exist.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<Option<UserRow>> {
        let now = now_timestamp();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET
                    display_name = CASE WHEN ?1 IS NULL THEN display_name
                                        WHEN ?1 = '' THEN NULL
                                        ELSE ?1 END,
                    bio          = CASE WHEN ?2 IS NULL THEN bio
                                        WHEN ?2 = '' THEN NULL
                                        ELSE ?2 END,
                    updated_at   = ?3
                 WHERE id = ?4",
                params![display_name, bio, now, id],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    /// Case-insensitive (Unicode) substring search over username and display
    /// name. An empty query matches everyone.
    pub fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserSummaryRow>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, display_name, profile_picture
                 FROM users
                 WHERE fold_case(username) LIKE ?1 ESCAPE '\\'
                    OR fold_case(display_name) LIKE ?1 ESCAPE '\\'
                 ORDER BY username
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![pattern, limit], row_to_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch user cards for a set of ids. Unknown ids are skipped.
    pub fn get_user_summaries(&self, ids: &[String]) -> Result<Vec<UserSummaryRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, username, display_name, profile_picture FROM users WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), row_to_summary)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    let row = conn.query_row(&sql, [id], row_to_user).optional()?;
    Ok(row)
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        display_name: row.get(4)?,
        bio: row.get(5)?,
        profile_picture: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserSummaryRow> {
    Ok(UserSummaryRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        profile_picture: row.get(3)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn add_user(db: &Database, username: &str) -> UserRow {
        db.create_user(
            &Uuid::new_v4().to_string(),
            username,
            &format!("{}@example.com", username),
            "hash",
        )
        .unwrap()
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "alice");

        let err = db
            .create_user(&Uuid::new_v4().to_string(), "alice", "other@example.com", "hash")
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m.contains("Username")));
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "alice");

        let err = db
            .create_user(&Uuid::new_v4().to_string(), "alice2", "alice@example.com", "hash")
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict(ref m) if m.contains("Email")));
    }

    #[test]
    fn finds_by_username_or_email() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");

        let by_name = db.find_user_by_username_or_email(Some("alice"), None).unwrap();
        assert_eq!(by_name.unwrap().id, alice.id);

        let by_email = db
            .find_user_by_username_or_email(Some("alice@example.com"), Some("alice@example.com"))
            .unwrap();
        assert_eq!(by_email.unwrap().id, alice.id);

        assert!(db.find_user_by_username_or_email(None, None).unwrap().is_none());
        assert!(db.find_user_by_username_or_email(Some("bob"), None).unwrap().is_none());
    }

    #[test]
    fn profile_update_keeps_and_clears_fields() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");

        let row = db
            .update_profile(&alice.id, Some("Alice"), Some("hello"))
            .unwrap()
            .unwrap();
        assert_eq!(row.display_name.as_deref(), Some("Alice"));
        assert_eq!(row.bio.as_deref(), Some("hello"));
        assert!(row.updated_at >= row.created_at);

        let row = db.update_profile(&alice.id, None, Some("")).unwrap().unwrap();
        assert_eq!(row.display_name.as_deref(), Some("Alice"));
        assert_eq!(row.bio, None);

        assert!(db.update_profile("missing", Some("x"), None).unwrap().is_none());
    }

    #[test]
    fn search_is_case_insensitive_and_literal() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");
        add_user(&db, "bob");
        add_user(&db, "al_bundy");
        db.update_profile(&alice.id, Some("Wonderland"), None).unwrap();

        let hits = db.search_users("ALI", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "alice");

        let hits = db.search_users("wonder", 20).unwrap();
        assert_eq!(hits[0].username, "alice");

        // `_` is matched literally, not as a wildcard
        let hits = db.search_users("l_", 20).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "al_bundy");

        assert_eq!(db.search_users("", 20).unwrap().len(), 3);
        assert_eq!(db.search_users("", 2).unwrap().len(), 2);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let db = Database::open_in_memory().unwrap();
        let elodie = add_user(&db, "elodie");
        add_user(&db, "eloise");
        db.update_profile(&elodie.id, Some("Élodie Ørsted"), None).unwrap();

        for query in ["ÉLODIE", "élodie", "éLoDiE", "ørsted", "ØRSTED"] {
            let hits = db.search_users(query, 20).unwrap();
            assert_eq!(hits.len(), 1, "query {:?}", query);
            assert_eq!(hits[0].id, elodie.id);
        }
    }

    #[test]
    fn summaries_skip_unknown_ids() {
        let db = Database::open_in_memory().unwrap();
        let alice = add_user(&db, "alice");

        let rows = db
            .get_user_summaries(&[alice.id.clone(), "nope".to_string()])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(db.get_user_summaries(&[]).unwrap().is_empty());
        assert!(db.user_exists(&alice.id).unwrap());
        assert!(!db.user_exists("nope").unwrap());
    }
}
