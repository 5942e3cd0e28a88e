use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate};

use crate::coach::{analyze_day, analyze_period};
use crate::db::Database;
use crate::food_table::FoodTable;
use crate::models::{
    DailySummary, Food, JournalEntry, MealGroup, MealType, NewJournalEntry, Profile,
    WeeklySummary, validate_profile, validate_quantity,
};
use crate::nutrients::NutrientTotals;
use crate::search::{self, BoostState, DEFAULT_RECENT_CAPACITY, SearchHit, SearchOptions};
use crate::targets::{DailyTargets, micro_progress};

/// Append-only journal storage.
///
/// `Database` is the SQLite implementation; totals and reports only need
/// this trait.
pub trait JournalStore {
    fn insert(&self, entry: &NewJournalEntry) -> Result<JournalEntry>;
    fn delete(&self, id: i64) -> Result<bool>;
    /// Entries for one day, in insertion order.
    fn fetch_by_date(&self, date: NaiveDate) -> Result<Vec<JournalEntry>>;
    /// Entries with `start <= date <= end`.
    fn fetch_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<JournalEntry>>;
    fn last_date_with_entries(&self) -> Result<Option<NaiveDate>>;
    /// Removes the newest entry of `date`; `false` when the day is empty.
    fn delete_last_for_date(&self, date: NaiveDate) -> Result<bool>;
}

/// First day of the seven-day window ending on `end`.
#[must_use]
pub fn week_start(end: NaiveDate) -> NaiveDate {
    end.checked_sub_days(Days::new(6)).unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn sum_entries(entries: &[JournalEntry]) -> NutrientTotals {
    let mut totals = NutrientTotals::new();
    for entry in entries {
        totals.merge(&entry.nutrients);
    }
    totals
}

pub fn daily_totals(store: &dyn JournalStore, date: NaiveDate) -> Result<NutrientTotals> {
    Ok(sum_entries(&store.fetch_by_date(date)?))
}

pub fn weekly_totals(store: &dyn JournalStore, end: NaiveDate) -> Result<NutrientTotals> {
    Ok(sum_entries(&store.fetch_range(week_start(end), end)?))
}

pub fn build_daily_summary(
    store: &dyn JournalStore,
    date: NaiveDate,
    profile: &Profile,
) -> Result<DailySummary> {
    let entries = store.fetch_by_date(date)?;
    let mut meals: Vec<MealGroup> = Vec::new();

    for meal in MealType::ALL {
        let meal_entries: Vec<JournalEntry> = entries
            .iter()
            .filter(|e| e.meal == meal)
            .cloned()
            .collect();

        if meal_entries.is_empty() {
            continue;
        }

        let subtotal = sum_entries(&meal_entries);
        meals.push(MealGroup {
            meal,
            entries: meal_entries,
            subtotal,
        });
    }

    let totals = sum_entries(&entries);
    let targets = DailyTargets::from_profile(profile);
    Ok(DailySummary {
        date,
        progress: targets.progress(&totals),
        micros: micro_progress(&totals, 1.0),
        alerts: analyze_day(&totals, &targets),
        meals,
        totals,
        targets,
    })
}

pub fn build_weekly_summary(
    store: &dyn JournalStore,
    end: NaiveDate,
    profile: &Profile,
) -> Result<WeeklySummary> {
    let start = week_start(end);
    let entries = store.fetch_range(start, end)?;
    let days_logged = entries.iter().map(|e| e.date).collect::<HashSet<_>>().len();
    let totals = sum_entries(&entries);
    let targets = DailyTargets::from_profile(profile).weekly();
    Ok(WeeklySummary {
        start,
        end,
        days_logged,
        progress: targets.progress(&totals),
        micros: micro_progress(&totals, 7.0),
        analysis: analyze_period(&totals, &targets),
        totals,
        targets,
    })
}

/// One user's working context: the food table, search boosts, and the
/// journal database.
pub struct Session {
    db: Database,
    foods: Arc<FoodTable>,
    boosts: BoostState,
}

impl Session {
    /// Wraps an open database, seeding favourites and recents from it.
    pub fn new(db: Database, foods: Arc<FoodTable>) -> Result<Self> {
        let mut boosts = BoostState::default();
        for name in db.list_favorites()? {
            boosts.add_favorite(&name);
        }
        // stored newest first; push oldest first so the newest ends up in front
        for name in db.recent_food_names(DEFAULT_RECENT_CAPACITY)?.iter().rev() {
            boosts.push_recent(name);
        }
        Ok(Self { db, foods, boosts })
    }

    pub fn open(db_path: &Path, foods: Arc<FoodTable>) -> Result<Self> {
        Self::new(Database::open(db_path)?, foods)
    }

    pub fn new_in_memory(foods: Arc<FoodTable>) -> Result<Self> {
        Self::new(Database::open_in_memory()?, foods)
    }

    #[must_use]
    pub fn foods(&self) -> &FoodTable {
        &self.foods
    }

    /// Swaps in a freshly loaded table. Journal history is unaffected.
    pub fn set_foods(&mut self, foods: Arc<FoodTable>) {
        self.foods = foods;
    }

    #[must_use]
    pub fn boosts(&self) -> &BoostState {
        &self.boosts
    }

    #[must_use]
    pub fn find_food(&self, name: &str) -> Option<&Food> {
        self.foods.get(name)
    }

    #[must_use]
    pub fn search(&self, query: &str, options: SearchOptions) -> Vec<SearchHit> {
        search::search(&self.foods.names(), query, options, &self.boosts)
    }

    // --- Journal ---

    pub fn log_food(
        &mut self,
        date: NaiveDate,
        meal: MealType,
        food_name: &str,
        quantity_g: f64,
    ) -> Result<JournalEntry> {
        validate_quantity(quantity_g)?;
        let food = self
            .foods
            .get(food_name)
            .with_context(|| format!("Unknown food '{food_name}'"))?;
        let entry = NewJournalEntry {
            date,
            meal,
            food_name: food.name.clone(),
            quantity_g,
            nutrients: food.nutrients_for(quantity_g),
        };
        let saved = self.db.insert(&entry)?;
        self.boosts.push_recent(&saved.food_name);
        Ok(saved)
    }

    pub fn delete_entry(&self, id: i64) -> Result<bool> {
        self.db.delete(id)
    }

    pub fn undo_last(&self, date: NaiveDate) -> Result<bool> {
        self.db.delete_last_for_date(date)
    }

    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<JournalEntry>> {
        self.db.fetch_by_date(date)
    }

    pub fn last_date_with_entries(&self) -> Result<Option<NaiveDate>> {
        self.db.last_date_with_entries()
    }

    pub fn daily_totals(&self, date: NaiveDate) -> Result<NutrientTotals> {
        daily_totals(&self.db, date)
    }

    pub fn weekly_totals(&self, end: NaiveDate) -> Result<NutrientTotals> {
        weekly_totals(&self.db, end)
    }

    // --- Profile & reports ---

    pub fn profile(&self) -> Result<Profile> {
        self.db.load_profile()
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        validate_profile(profile)?;
        self.db.save_profile(profile)
    }

    pub fn targets(&self) -> Result<DailyTargets> {
        Ok(DailyTargets::from_profile(&self.profile()?))
    }

    pub fn daily_report(&self, date: NaiveDate) -> Result<DailySummary> {
        build_daily_summary(&self.db, date, &self.profile()?)
    }

    pub fn weekly_report(&self, end: NaiveDate) -> Result<WeeklySummary> {
        build_weekly_summary(&self.db, end, &self.profile()?)
    }

    // --- Favorites ---

    pub fn favorites(&self) -> Result<Vec<String>> {
        self.db.list_favorites()
    }

    pub fn add_favorite(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Favorite name must not be empty");
        }
        let added = self.db.add_favorite(name)?;
        self.boosts.add_favorite(name);
        Ok(added)
    }

    pub fn remove_favorite(&mut self, name: &str) -> Result<bool> {
        let name = name.trim();
        let removed = self.db.remove_favorite(name)?;
        self.boosts.remove_favorite(name);
        Ok(removed)
    }

    /// Returns whether `name` is a favourite afterwards.
    pub fn toggle_favorite(&mut self, name: &str) -> Result<bool> {
        if self.boosts.is_favorite(name.trim()) {
            self.remove_favorite(name)?;
            Ok(false)
        } else {
            self.add_favorite(name)?;
            Ok(true)
        }
    }
}
