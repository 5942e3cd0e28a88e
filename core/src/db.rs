use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{ActivityLevel, JournalEntry, MealType, NewJournalEntry, Profile, Sex};
use crate::nutrients::{NutrientTotals, coerce_number};
use crate::service::JournalStore;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct Database {
    conn: Connection,
}

impl FromSql for MealType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
    }
}

impl ToSql for MealType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

fn date_column(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => coerce_number(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Rebuilds a stored snapshot. Labels resolve through the alias table again;
/// malformed JSON reads as an empty snapshot.
fn snapshot_from_json(raw: &str) -> NutrientTotals {
    match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
        Ok(map) => NutrientTotals::from_row(map.iter().map(|(k, v)| (k.as_str(), json_amount(v)))),
        Err(e) => {
            warn!("malformed nutrient snapshot: {e}");
            NutrientTotals::new()
        }
    }
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS journal (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    uuid TEXT NOT NULL UNIQUE,
                    date TEXT NOT NULL,
                    meal TEXT NOT NULL,
                    food_name TEXT NOT NULL,
                    quantity_g REAL NOT NULL,
                    nutrients_json TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_journal_date ON journal(date);

                CREATE TABLE IF NOT EXISTS favorites (
                    name TEXT PRIMARY KEY,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS profile (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    sex TEXT NOT NULL,
                    age INTEGER NOT NULL,
                    height_cm REAL NOT NULL,
                    weight_kg REAL NOT NULL,
                    activity TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // Expects columns:
    // 0: id, 1: uuid, 2: date, 3: meal, 4: food_name, 5: quantity_g,
    // 6: nutrients_json, 7: created_at
    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<JournalEntry> {
        let date: String = row.get(2)?;
        let nutrients: String = row.get(6)?;
        Ok(JournalEntry {
            id: row.get(0)?,
            uuid: row.get(1)?,
            date: date_column(2, &date)?,
            meal: row.get(3)?,
            food_name: row.get(4)?,
            quantity_g: row.get(5)?,
            nutrients: snapshot_from_json(&nutrients),
            created_at: row.get(7)?,
        })
    }

    // --- Journal ---

    pub fn insert_entry(&self, entry: &NewJournalEntry) -> Result<JournalEntry> {
        let now = Local::now().to_rfc3339();
        let uuid = Uuid::new_v4().to_string();
        let date_str = entry.date.format(DATE_FORMAT).to_string();
        let nutrients =
            serde_json::to_string(&entry.nutrients).context("Failed to encode nutrients")?;
        self.conn.execute(
            "INSERT INTO journal (uuid, date, meal, food_name, quantity_g, nutrients_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                uuid,
                date_str,
                entry.meal,
                entry.food_name,
                entry.quantity_g,
                nutrients,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, food = %entry.food_name, date = %date_str, "journal entry added");
        self.get_entry(id)
    }

    pub fn get_entry(&self, id: i64) -> Result<JournalEntry> {
        self.conn
            .query_row(
                "SELECT id, uuid, date, meal, food_name, quantity_g, nutrients_json, created_at
                 FROM journal WHERE id = ?1",
                params![id],
                Self::entry_from_row,
            )
            .context("Journal entry not found")
    }

    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM journal WHERE id = ?1", params![id])?;
        if rows > 0 {
            debug!(id, "journal entry deleted");
        }
        Ok(rows > 0)
    }

    pub fn get_entries_for_date(&self, date: NaiveDate) -> Result<Vec<JournalEntry>> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, date, meal, food_name, quantity_g, nutrients_json, created_at
             FROM journal WHERE date = ?1 ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![date_str], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Entries with `start <= date <= end`, by date then insertion order.
    pub fn get_entries_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<JournalEntry>> {
        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, uuid, date, meal, food_name, quantity_g, nutrients_json, created_at
             FROM journal WHERE date >= ?1 AND date <= ?2 ORDER BY date, id",
        )?;
        let entries = stmt
            .query_map(params![start_str, end_str], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn last_date_with_entries(&self) -> Result<Option<NaiveDate>> {
        let last: Option<String> =
            self.conn
                .query_row("SELECT MAX(date) FROM journal", [], |row| row.get(0))?;
        last.map(|d| {
            NaiveDate::parse_from_str(&d, DATE_FORMAT)
                .with_context(|| format!("Invalid journal date '{d}'"))
        })
        .transpose()
    }

    /// Removes the most recently inserted entry for `date`.
    pub fn delete_last_for_date(&self, date: NaiveDate) -> Result<bool> {
        let date_str = date.format(DATE_FORMAT).to_string();
        let last: Option<i64> = self
            .conn
            .query_row(
                "SELECT MAX(id) FROM journal WHERE date = ?1",
                params![date_str],
                |row| row.get(0),
            )?;
        match last {
            Some(id) => self.delete_entry(id),
            None => Ok(false),
        }
    }

    /// Distinct food names, most recently logged first.
    pub fn recent_food_names(&self, limit: usize) -> Result<Vec<String>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT food_name FROM journal
             GROUP BY food_name
             ORDER BY MAX(id) DESC
             LIMIT ?1",
        )?;
        let names = stmt
            .query_map(params![limit], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // --- Favorites ---

    pub fn add_favorite(&self, name: &str) -> Result<bool> {
        let now = Local::now().to_rfc3339();
        let rows = self.conn.execute(
            "INSERT OR IGNORE INTO favorites (name, created_at) VALUES (?1, ?2)",
            params![name, now],
        )?;
        Ok(rows > 0)
    }

    pub fn remove_favorite(&self, name: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM favorites WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    pub fn list_favorites(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM favorites ORDER BY name COLLATE NOCASE")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // --- Profile ---

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO profile (id, sex, age, height_cm, weight_kg, activity, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.sex.as_str(),
                profile.age,
                profile.height_cm,
                profile.weight_kg,
                profile.activity.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    /// The saved profile, or the default one when nothing was saved yet.
    pub fn load_profile(&self) -> Result<Profile> {
        let row: Option<(String, u32, f64, f64, String)> = self
            .conn
            .query_row(
                "SELECT sex, age, height_cm, weight_kg, activity FROM profile WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;
        let Some((sex, age, height_cm, weight_kg, activity)) = row else {
            return Ok(Profile::default());
        };
        Ok(Profile {
            sex: sex.parse::<Sex>().context("Invalid stored profile")?,
            age,
            height_cm,
            weight_kg,
            activity: ActivityLevel::from_label(&activity),
        })
    }
}

impl JournalStore for Database {
    fn insert(&self, entry: &NewJournalEntry) -> Result<JournalEntry> {
        self.insert_entry(entry)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        self.delete_entry(id)
    }

    fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<JournalEntry>> {
        self.get_entries_for_date(date)
    }

    fn fetch_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<JournalEntry>> {
        self.get_entries_in_range(start, end)
    }

    fn last_date_with_entries(&self) -> Result<Option<NaiveDate>> {
        Database::last_date_with_entries(self)
    }

    fn delete_last_for_date(&self, date: NaiveDate) -> Result<bool> {
        Database::delete_last_for_date(self, date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrients::Nutrient;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn new_entry(date: NaiveDate, food: &str, quantity_g: f64, protein_100g: f64) -> NewJournalEntry {
        let per_100g = NutrientTotals::from_row([("Protéines_g", protein_100g)]);
        NewJournalEntry {
            date,
            meal: MealType::Lunch,
            food_name: food.to_string(),
            quantity_g,
            nutrients: per_100g.for_quantity(quantity_g),
        }
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_insert_round_trips_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let entry = db.insert_entry(&new_entry(day(1), "Poulet", 150.0, 20.0)).unwrap();

        assert_eq!(entry.food_name, "Poulet");
        assert_eq!(entry.meal, MealType::Lunch);
        assert_eq!(entry.date, day(1));
        assert!(!entry.uuid.is_empty());
        assert_eq!(entry.nutrients.get(&Nutrient::Protein), 30.0);

        let fetched = db.get_entry(entry.id).unwrap();
        assert_eq!(fetched.nutrients.get(&Nutrient::Protein), 30.0);
        assert_eq!(fetched.nutrients, entry.nutrients);
    }

    #[test]
    fn test_delete_entry() {
        let db = Database::open_in_memory().unwrap();
        let entry = db.insert_entry(&new_entry(day(1), "Poulet", 150.0, 20.0)).unwrap();
        assert!(db.delete_entry(entry.id).unwrap());
        assert!(!db.delete_entry(entry.id).unwrap());
        assert!(db.get_entries_for_date(day(1)).unwrap().is_empty());
        assert!(db.get_entry(entry.id).is_err());
    }

    #[test]
    fn test_entries_for_date_and_range() {
        let db = Database::open_in_memory().unwrap();
        db.insert_entry(&new_entry(day(3), "C", 100.0, 1.0)).unwrap();
        db.insert_entry(&new_entry(day(1), "A", 100.0, 1.0)).unwrap();
        db.insert_entry(&new_entry(day(1), "B", 100.0, 1.0)).unwrap();
        db.insert_entry(&new_entry(day(9), "D", 100.0, 1.0)).unwrap();

        let first: Vec<_> = db
            .get_entries_for_date(day(1))
            .unwrap()
            .into_iter()
            .map(|e| e.food_name)
            .collect();
        assert_eq!(first, vec!["A", "B"]);

        let range: Vec<_> = db
            .get_entries_in_range(day(1), day(3))
            .unwrap()
            .into_iter()
            .map(|e| e.food_name)
            .collect();
        assert_eq!(range, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_last_date_and_undo() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.last_date_with_entries().unwrap(), None);
        assert!(!db.delete_last_for_date(day(2)).unwrap());

        db.insert_entry(&new_entry(day(2), "A", 100.0, 1.0)).unwrap();
        db.insert_entry(&new_entry(day(2), "B", 100.0, 1.0)).unwrap();
        db.insert_entry(&new_entry(day(1), "C", 100.0, 1.0)).unwrap();
        assert_eq!(db.last_date_with_entries().unwrap(), Some(day(2)));

        assert!(db.delete_last_for_date(day(2)).unwrap());
        let left = db.get_entries_for_date(day(2)).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].food_name, "A");
    }

    #[test]
    fn test_recent_food_names() {
        let db = Database::open_in_memory().unwrap();
        for food in ["Pomme", "Riz", "Pomme", "Pain"] {
            db.insert_entry(&new_entry(day(1), food, 100.0, 1.0)).unwrap();
        }
        assert_eq!(db.recent_food_names(10).unwrap(), vec!["Pain", "Pomme", "Riz"]);
        assert_eq!(db.recent_food_names(1).unwrap(), vec!["Pain"]);
    }

    #[test]
    fn test_malformed_snapshot_reads_empty() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO journal (uuid, date, meal, food_name, quantity_g, nutrients_json, created_at)
                 VALUES ('u1', '2024-03-01', 'snack', 'Biscuit', 30.0, 'not json', 'now')",
                [],
            )
            .unwrap();
        let entries = db.get_entries_for_date(day(1)).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].nutrients.is_empty());
    }

    #[test]
    fn test_stored_aliases_resolve_on_read() {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute(
                "INSERT INTO journal (uuid, date, meal, food_name, quantity_g, nutrients_json, created_at)
                 VALUES ('u1', '2024-03-01', 'dinner', 'Saumon', 100.0,
                         '{\"omega3_ala_g\": 0.2, \"Oméga-3 ALA-g\": \"0,1\", \"Sel_g\": null}', 'now')",
                [],
            )
            .unwrap();
        let entry = &db.get_entries_for_date(day(1)).unwrap()[0];
        assert!((entry.nutrients.get(&Nutrient::AlphaLinolenicOmega3) - 0.3).abs() < 1e-9);
        assert!(entry.nutrients.get(&Nutrient::Salt).abs() < f64::EPSILON);
    }

    #[test]
    fn test_favorites() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_favorite("riz").unwrap());
        assert!(db.add_favorite("Pomme").unwrap());
        assert!(!db.add_favorite("Pomme").unwrap());
        assert_eq!(db.list_favorites().unwrap(), vec!["Pomme", "riz"]);
        assert!(db.remove_favorite("riz").unwrap());
        assert!(!db.remove_favorite("riz").unwrap());
        assert_eq!(db.list_favorites().unwrap(), vec!["Pomme"]);
    }

    #[test]
    fn test_profile_default_and_save() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_profile().unwrap(), Profile::default());

        let profile = Profile {
            sex: Sex::Female,
            age: 31,
            height_cm: 165.0,
            weight_kg: 58.5,
            activity: ActivityLevel::VeryIntense,
        };
        db.save_profile(&profile).unwrap();
        assert_eq!(db.load_profile().unwrap(), profile);

        let older = Profile { age: 32, ..profile };
        db.save_profile(&older).unwrap();
        assert_eq!(db.load_profile().unwrap().age, 32);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("totum.db");
        {
            let db = Database::open(&path).unwrap();
            db.insert_entry(&new_entry(day(1), "Pomme", 120.0, 0.3)).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get_entries_for_date(day(1)).unwrap().len(), 1);
    }
}
