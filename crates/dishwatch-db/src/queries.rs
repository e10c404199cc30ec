use crate::Database;
use crate::models::{DishRow, NewReport, SummaryRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    /// Insert-or-ignore then lookup: resubmitting under an existing
    /// username reuses the row instead of creating a duplicate.
    pub fn ensure_user(&self, username: &str) -> Result<i64> {
        self.with_conn(|conn| ensure_user(conn, username))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, username FROM users WHERE username = ?1")?;
            let row = stmt
                .query_row([username], |row| {
                    Ok(UserRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    // -- Reports --

    /// Write one submission: the owning user (created on first sight),
    /// a summary row with `total_missing` fixed at the number of dish
    /// ids, and one dish row per id, all in a single transaction.
    /// Returns the new summary id.
    pub fn insert_report(&self, report: &NewReport<'_>) -> Result<i64> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let user_id = ensure_user(&tx, report.username)?;

            tx.execute(
                "INSERT INTO missing_summary (timestamp, total_missing, comment, user_id)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    report.timestamp,
                    report.dish_ids.len() as i64,
                    report.comment,
                    user_id
                ],
            )?;
            let summary_id = tx.last_insert_rowid();

            for dish_id in report.dish_ids {
                tx.execute(
                    "INSERT INTO missing_dishes (dish_id, date, dining_hall, meal, user_id, summary_id)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        dish_id,
                        report.date,
                        report.dining_hall,
                        report.meal,
                        user_id,
                        summary_id
                    ],
                )?;
            }

            tx.commit()?;
            Ok(summary_id)
        })
    }

    /// Most recent summaries first, joined with the submitting user.
    pub fn list_summaries(&self, limit: u32) -> Result<Vec<SummaryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.timestamp, s.total_missing, s.comment, s.user_id, u.username
                 FROM missing_summary s
                 JOIN users u ON s.user_id = u.id
                 ORDER BY s.id DESC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(SummaryRow {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        total_missing: row.get(2)?,
                        comment: row.get(3)?,
                        user_id: row.get(4)?,
                        username: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn dishes_for_summary(&self, summary_id: i64) -> Result<Vec<DishRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, dish_id, date, dining_hall, meal, user_id, summary_id
                 FROM missing_dishes
                 WHERE summary_id = ?1
                 ORDER BY id",
            )?;

            let rows = stmt
                .query_map([summary_id], |row| {
                    Ok(DishRow {
                        id: row.get(0)?,
                        dish_id: row.get(1)?,
                        date: row.get(2)?,
                        dining_hall: row.get(3)?,
                        meal: row.get(4)?,
                        user_id: row.get(5)?,
                        summary_id: row.get(6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn ensure_user(conn: &Connection, username: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO users (username) VALUES (?1)",
        [username],
    )?;
    let id = conn.query_row(
        "SELECT id FROM users WHERE username = ?1",
        [username],
        |row| row.get(0),
    )?;
    Ok(id)
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

    fn sample_report<'a>(username: &'a str, dish_ids: &'a [i64]) -> NewReport<'a> {
        NewReport {
            username,
            dish_ids,
            date: "2026-08-30",
            dining_hall: "Tower",
            meal: "Lunch",
            comment: Some("ran out before noon"),
            timestamp: "2026-08-30T12:05:00",
        }
    }

    #[test]
    fn report_writes_one_summary_and_n_dishes() {
        let db = Database::open_in_memory().unwrap();

        let dish_ids = [101, 102, 103];
        let summary_id = db.insert_report(&sample_report("amh", &dish_ids)).unwrap();

        let summaries = db.list_summaries(10).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, summary_id);
        assert_eq!(summaries[0].total_missing, 3);
        assert_eq!(summaries[0].username, "amh");
        assert_eq!(summaries[0].comment.as_deref(), Some("ran out before noon"));

        let dishes = db.dishes_for_summary(summary_id).unwrap();
        assert_eq!(dishes.len(), 3);
        for (dish, expected_id) in dishes.iter().zip(dish_ids) {
            assert_eq!(dish.dish_id, expected_id);
            assert_eq!(dish.summary_id, summary_id);
            assert_eq!(dish.user_id, summaries[0].user_id);
            assert_eq!(dish.dining_hall, "Tower");
            assert_eq!(dish.meal, "Lunch");
        }
    }

    #[test]
    fn resubmission_reuses_user_row() {
        let db = Database::open_in_memory().unwrap();

        let first = db.insert_report(&sample_report("amh", &[7])).unwrap();
        let second = db.insert_report(&sample_report("amh", &[8, 9])).unwrap();
        assert_ne!(first, second);

        let summaries = db.list_summaries(10).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].user_id, summaries[1].user_id);

        // Only one user row total
        let user = db.get_user_by_username("amh").unwrap().unwrap();
        assert_eq!(user.id, summaries[0].user_id);
        let count: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn ensure_user_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let a = db.ensure_user("kit").unwrap();
        let b = db.ensure_user("kit").unwrap();
        assert_eq!(a, b);

        let other = db.ensure_user("ray").unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn checkpoint_makes_main_file_a_complete_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports.db");

        let db = Database::open(&path).unwrap();
        db.insert_report(&sample_report("amh", &[1, 2, 3])).unwrap();

        // In WAL mode the report lives in the -wal sidecar until a
        // checkpoint folds it into the main file.
        db.checkpoint().unwrap();

        let copy = dir.path().join("snapshot.db");
        std::fs::copy(&path, &copy).unwrap();

        let snapshot = Database::open(&copy).unwrap();
        let summaries = snapshot.list_summaries(10).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].total_missing, 3);
        assert_eq!(snapshot.dishes_for_summary(summaries[0].id).unwrap().len(), 3);
    }

    #[test]
    fn summaries_come_back_newest_first() {
        let db = Database::open_in_memory().unwrap();
        db.insert_report(&sample_report("amh", &[1])).unwrap();
        db.insert_report(&sample_report("kit", &[2, 3])).unwrap();

        let summaries = db.list_summaries(10).unwrap();
        assert_eq!(summaries[0].username, "kit");
        assert_eq!(summaries[1].username, "amh");
    }
}
