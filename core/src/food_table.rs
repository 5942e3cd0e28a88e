use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::models::Food;
use crate::nutrients::{NutrientTotals, canon, coerce_number, per_100g_label};

/// Read-only food table, ordered as loaded. Indexed by exact name and by
/// accent- and case-folded name.
#[derive(Debug, Clone, Default)]
pub struct FoodTable {
    foods: Vec<Food>,
    index: HashMap<String, usize>,
    folded: HashMap<String, usize>,
}

impl FoodTable {
    /// Builds a table; later foods with an already seen name are dropped.
    #[must_use]
    pub fn new(foods: Vec<Food>) -> Self {
        let mut table = Self::default();
        for food in foods {
            table.push(food);
        }
        table
    }

    fn push(&mut self, food: Food) -> bool {
        if self.index.contains_key(&food.name) {
            return false;
        }
        let i = self.foods.len();
        self.index.insert(food.name.clone(), i);
        // first food wins when two names fold together
        self.folded.entry(canon(&food.name)).or_insert(i);
        self.foods.push(food);
        true
    }

    /// Reads a food table from CSV.
    ///
    /// A `nom` (or `name`) column holds the food name. Every column whose
    /// header ends in `_100g` is a nutrient per 100 g; cells are coerced
    /// leniently and default to 0. Both `,` and `;` separators are accepted.
    pub fn from_csv_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .context("Failed to read food table")?;
        Self::from_csv_str(&text)
    }

    pub fn from_csv_str(text: &str) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(sniff_delimiter(text))
            .from_reader(text.as_bytes());

        let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

        let col =
            |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };
        let idx_name = col("nom")
            .or_else(|| col("name"))
            .context("Missing 'nom' column")?;

        let nutrient_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter_map(|(i, h)| per_100g_label(h).map(|label| (i, label.to_string())))
            .collect();
        if nutrient_cols.is_empty() {
            warn!("food table has no _100g columns");
        }

        let mut table = Self::default();
        let mut skipped = 0usize;

        for (line_num, result) in rdr.records().enumerate() {
            let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

            let name = record.get(idx_name).unwrap_or("").trim();
            if name.is_empty() {
                skipped += 1;
                continue;
            }

            let per_100g = NutrientTotals::from_row(nutrient_cols.iter().map(|(i, label)| {
                let value = record.get(*i).and_then(coerce_number).unwrap_or(0.0);
                (label.as_str(), value)
            }));

            if !table.push(Food {
                name: name.to_string(),
                per_100g,
            }) {
                debug!(name, "duplicate food name, keeping first");
                skipped += 1;
            }
        }

        debug!(foods = table.len(), skipped, "parsed food table");
        Ok(table)
    }

    /// Loads a table from disk. Absent or unreadable files log a warning and
    /// yield `None`; callers fall back to an empty table.
    #[must_use]
    pub fn load(path: &Path) -> Option<Self> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), "food table unavailable: {e}");
                return None;
            }
        };
        match Self::from_csv_reader(file) {
            Ok(table) => {
                info!(path = %path.display(), foods = table.len(), "loaded food table");
                Some(table)
            }
            Err(e) => {
                warn!(path = %path.display(), "food table unreadable: {e:#}");
                None
            }
        }
    }

    /// Exact name first, then the same name ignoring accents, case and
    /// separators ("poulet roti" finds "Poulet rôti").
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Food> {
        self.index
            .get(name)
            .or_else(|| self.folded.get(&canon(name)))
            .map(|&i| &self.foods[i])
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.foods.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Food> {
        self.foods.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.foods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }
}

fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}
