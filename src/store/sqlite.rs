use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SubfeedError};
use crate::domain::{CaptionRecord, ScheduleRecord, WeekBucket};
use crate::store::Store;

const SCHEDULE_COLUMNS: &str = "id, item_id, week, status, air_time, title, genres, caption_count,
     start_date, end_date, source_site, recent_episode, updated_at";

const CAPTION_COLUMNS: &str = "id, item_id, title, episode, author_name, source_site, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| SubfeedError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            SubfeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<ScheduleRecord> {
        Ok(ScheduleRecord {
            id: row.get(0)?,
            item_id: row.get(1)?,
            week: WeekBucket::parse(&row.get::<_, String>(2)?).unwrap_or_default(),
            status: row.get(3)?,
            air_time: row.get(4)?,
            title: row.get(5)?,
            genres: row.get(6)?,
            caption_count: row.get(7)?,
            start_date: row.get(8)?,
            end_date: row.get(9)?,
            source_site: row.get(10)?,
            recent_episode: row.get(11)?,
            updated_at: row
                .get::<_, String>(12)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn caption_from_row(row: &Row<'_>) -> rusqlite::Result<CaptionRecord> {
        Ok(CaptionRecord {
            id: row.get(0)?,
            item_id: row.get(1)?,
            title: row.get(2)?,
            episode: row.get(3)?,
            author_name: row.get(4)?,
            source_site: row.get(5)?,
            updated_at: row
                .get::<_, String>(6)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn find_schedule(&self, item_id: i64) -> Result<Option<ScheduleRecord>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE item_id = ?1"),
                params![item_id],
                Self::schedule_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn upsert_schedule(&self, record: &ScheduleRecord) -> Result<i64> {
        let conn = self.conn()?;

        if record.is_new() {
            // A concurrent writer may have created the row since it was looked
            // up; the conflict clause turns that race into last-write-wins.
            conn.execute(
                "INSERT INTO schedules (item_id, week, status, air_time, title, genres, caption_count,
                     start_date, end_date, source_site, recent_episode, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(item_id) DO UPDATE SET
                     week = excluded.week,
                     status = excluded.status,
                     air_time = excluded.air_time,
                     title = excluded.title,
                     genres = excluded.genres,
                     caption_count = excluded.caption_count,
                     start_date = excluded.start_date,
                     end_date = excluded.end_date,
                     source_site = excluded.source_site,
                     recent_episode = excluded.recent_episode,
                     updated_at = excluded.updated_at",
                params![
                    record.item_id,
                    record.week.as_str(),
                    record.status,
                    record.air_time,
                    record.title,
                    record.genres,
                    record.caption_count,
                    record.start_date,
                    record.end_date,
                    record.source_site,
                    record.recent_episode,
                    record.updated_at.to_rfc3339()
                ],
            )?;

            let id = conn.query_row(
                "SELECT id FROM schedules WHERE item_id = ?1",
                params![record.item_id],
                |row| row.get(0),
            )?;
            return Ok(id);
        }

        let changed = conn.execute(
            "UPDATE schedules SET item_id = ?1, week = ?2, status = ?3, air_time = ?4, title = ?5,
                 genres = ?6, caption_count = ?7, start_date = ?8, end_date = ?9, source_site = ?10,
                 recent_episode = ?11, updated_at = ?12
             WHERE id = ?13",
            params![
                record.item_id,
                record.week.as_str(),
                record.status,
                record.air_time,
                record.title,
                record.genres,
                record.caption_count,
                record.start_date,
                record.end_date,
                record.source_site,
                record.recent_episode,
                record.updated_at.to_rfc3339(),
                record.id
            ],
        )?;

        if changed == 0 {
            return Err(SubfeedError::Database(rusqlite::Error::QueryReturnedNoRows));
        }

        Ok(record.id)
    }

    fn get_all_schedules(&self) -> Result<Vec<ScheduleRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {SCHEDULE_COLUMNS} FROM schedules ORDER BY title, item_id"
        ))?;

        let records = stmt
            .query_map([], Self::schedule_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_schedules(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM schedules", [], |row| row.get(0))?;
        Ok(count)
    }

    fn find_caption(&self, item_id: i64, episode: &str) -> Result<Option<CaptionRecord>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!(
                    "SELECT {CAPTION_COLUMNS} FROM captions WHERE item_id = ?1 AND episode = ?2"
                ),
                params![item_id, episode],
                Self::caption_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn upsert_caption(&self, record: &CaptionRecord) -> Result<i64> {
        let conn = self.conn()?;

        if record.is_new() {
            conn.execute(
                "INSERT INTO captions (item_id, title, episode, author_name, source_site, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(item_id, episode) DO UPDATE SET
                     title = excluded.title,
                     author_name = excluded.author_name,
                     source_site = excluded.source_site,
                     updated_at = excluded.updated_at",
                params![
                    record.item_id,
                    record.title,
                    record.episode,
                    record.author_name,
                    record.source_site,
                    record.updated_at.to_rfc3339()
                ],
            )?;

            let id = conn.query_row(
                "SELECT id FROM captions WHERE item_id = ?1 AND episode = ?2",
                params![record.item_id, record.episode],
                |row| row.get(0),
            )?;
            return Ok(id);
        }

        let changed = conn.execute(
            "UPDATE captions SET item_id = ?1, title = ?2, episode = ?3, author_name = ?4,
                 source_site = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                record.item_id,
                record.title,
                record.episode,
                record.author_name,
                record.source_site,
                record.updated_at.to_rfc3339(),
                record.id
            ],
        )?;

        if changed == 0 {
            return Err(SubfeedError::Database(rusqlite::Error::QueryReturnedNoRows));
        }

        Ok(record.id)
    }

    fn get_captions_by_item(&self, item_id: i64) -> Result<Vec<CaptionRecord>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CAPTION_COLUMNS} FROM captions WHERE item_id = ?1 ORDER BY updated_at DESC"
        ))?;

        let records = stmt
            .query_map(params![item_id], Self::caption_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn count_captions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM captions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaptionEntry, ScheduleEntry};

    fn schedule_entry(item_id: i64, title: &str) -> ScheduleEntry {
        ScheduleEntry {
            item_id,
            week: WeekBucket::Fri,
            status: "ON".into(),
            air_time: "22:00".into(),
            title: title.into(),
            genres: "Action".into(),
            caption_count: 1,
            start_date: "2023-10-06".into(),
            end_date: String::new(),
            source_site: "https://example.com".into(),
        }
    }

    #[test]
    fn test_find_schedule_missing() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.find_schedule(42).unwrap().is_none());
    }

    #[test]
    fn test_schedule_insert_then_find() {
        let store = SqliteStore::in_memory().unwrap();

        let mut record = ScheduleRecord::new(42);
        record.apply(&schedule_entry(42, "Show"));
        let id = store.upsert_schedule(&record).unwrap();
        assert!(id > 0);

        let found = store.find_schedule(42).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.title, "Show");
        assert_eq!(found.week, WeekBucket::Fri);
        assert_eq!(found.recent_episode, None);
    }

    #[test]
    fn test_schedule_update_overwrites() {
        let store = SqliteStore::in_memory().unwrap();

        let mut record = ScheduleRecord::new(42);
        record.apply(&schedule_entry(42, "Old Title"));
        store.upsert_schedule(&record).unwrap();

        let mut existing = store.find_schedule(42).unwrap().unwrap();
        existing.apply(&schedule_entry(42, "New Title"));
        existing.recent_episode = Some("4".into());
        store.upsert_schedule(&existing).unwrap();

        assert_eq!(store.count_schedules().unwrap(), 1);
        let found = store.find_schedule(42).unwrap().unwrap();
        assert_eq!(found.title, "New Title");
        assert_eq!(found.recent_episode, Some("4".into()));
    }

    #[test]
    fn test_schedule_insert_race_is_last_write_wins() {
        let store = SqliteStore::in_memory().unwrap();

        let mut first = ScheduleRecord::new(7);
        first.apply(&schedule_entry(7, "First"));
        let mut second = ScheduleRecord::new(7);
        second.apply(&schedule_entry(7, "Second"));

        let id1 = store.upsert_schedule(&first).unwrap();
        let id2 = store.upsert_schedule(&second).unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.count_schedules().unwrap(), 1);
        assert_eq!(store.find_schedule(7).unwrap().unwrap().title, "Second");
    }

    #[test]
    fn test_update_of_deleted_row_fails() {
        let store = SqliteStore::in_memory().unwrap();
        let mut record = ScheduleRecord::new(1);
        record.id = 999;
        assert!(store.upsert_schedule(&record).is_err());
    }

    #[test]
    fn test_get_all_schedules_ordering() {
        let store = SqliteStore::in_memory().unwrap();

        for (id, title) in [(3, "Charlie"), (1, "Alpha"), (2, "Bravo")] {
            let mut record = ScheduleRecord::new(id);
            record.apply(&schedule_entry(id, title));
            store.upsert_schedule(&record).unwrap();
        }

        let all = store.get_all_schedules().unwrap();
        let titles: Vec<&str> = all.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Bravo", "Charlie"]);
    }

    #[test]
    fn test_caption_keyed_by_item_and_episode() {
        let store = SqliteStore::in_memory().unwrap();
        let entry = CaptionEntry {
            episode: "7".into(),
            uploaded_at: "2023-11-18T23:15:31".into(),
            source_site: "https://blog.example.com".into(),
            author_name: "Team".into(),
        };

        let mut record = CaptionRecord::new(10, "7");
        record.apply("Show", &entry);
        store.upsert_caption(&record).unwrap();

        let mut other_episode = CaptionRecord::new(10, "8");
        other_episode.apply("Show", &CaptionEntry { episode: "8".into(), ..entry.clone() });
        store.upsert_caption(&other_episode).unwrap();

        let mut other_item = CaptionRecord::new(11, "7");
        other_item.apply("Other Show", &entry);
        store.upsert_caption(&other_item).unwrap();

        assert_eq!(store.count_captions().unwrap(), 3);
        assert!(store.find_caption(10, "7").unwrap().is_some());
        assert!(store.find_caption(10, "9").unwrap().is_none());
        assert_eq!(store.get_captions_by_item(10).unwrap().len(), 2);
    }

    #[test]
    fn test_caption_update_keeps_single_row() {
        let store = SqliteStore::in_memory().unwrap();
        let entry = CaptionEntry {
            episode: "1".into(),
            uploaded_at: "2023-11-18T23:15:31".into(),
            source_site: "https://a.example.com".into(),
            author_name: "A".into(),
        };

        let mut record = CaptionRecord::new(5, "1");
        record.apply("Show", &entry);
        store.upsert_caption(&record).unwrap();

        let mut existing = store.find_caption(5, "1").unwrap().unwrap();
        existing.apply(
            "Show",
            &CaptionEntry {
                source_site: "https://b.example.com".into(),
                author_name: "B".into(),
                ..entry
            },
        );
        store.upsert_caption(&existing).unwrap();

        assert_eq!(store.count_captions().unwrap(), 1);
        let found = store.find_caption(5, "1").unwrap().unwrap();
        assert_eq!(found.author_name, "B");
        assert_eq!(found.source_site, "https://b.example.com");
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subfeed.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            let mut record = ScheduleRecord::new(1);
            record.apply(&schedule_entry(1, "Persisted"));
            store.upsert_schedule(&record).unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.find_schedule(1).unwrap().unwrap().title, "Persisted");
    }
}
