use anyhow::{Result, bail};
use serde::Serialize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use totum_core::models::{ActivityLevel, Profile, Sex};
use totum_core::nutrients::Nutrient;
use totum_core::service::Session;
use totum_core::targets::{DailyTargets, bmr, tdee};

use super::helpers::format_amount;

#[derive(Serialize)]
struct ProfileView {
    profile: Profile,
    bmr_kcal: f64,
    tdee_kcal: f64,
    targets: DailyTargets,
}

impl ProfileView {
    fn new(profile: Profile) -> Self {
        Self {
            bmr_kcal: bmr(&profile),
            tdee_kcal: tdee(&profile),
            targets: DailyTargets::from_profile(&profile),
            profile,
        }
    }

    fn print(&self) {
        #[derive(Tabled)]
        struct TargetRow {
            #[tabled(rename = "Nutrient")]
            nutrient: String,
            #[tabled(rename = "Daily target")]
            target: String,
        }

        let p = &self.profile;
        let sex = p.sex.as_str();
        let age = p.age;
        let height = p.height_cm;
        let weight = p.weight_kg;
        let activity = p.activity.as_str();
        println!("{sex}, {age} years, {height} cm, {weight} kg, activity: {activity}");
        let bmr = self.bmr_kcal;
        let tdee = self.tdee_kcal;
        println!("BMR: {bmr:.0} kcal | TDEE: {tdee:.0} kcal\n");

        let rows: Vec<TargetRow> = Nutrient::KNOWN
            .iter()
            .filter_map(|n| {
                self.targets.get(n).map(|t| TargetRow {
                    nutrient: n.to_string(),
                    target: format_amount(t),
                })
            })
            .collect();

        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{table}");
    }
}

pub(crate) fn cmd_profile_set(
    session: &Session,
    sex: Option<&str>,
    age: Option<u32>,
    height: Option<f64>,
    weight: Option<f64>,
    activity: Option<&str>,
    json: bool,
) -> Result<()> {
    if sex.is_none() && age.is_none() && height.is_none() && weight.is_none() && activity.is_none()
    {
        bail!("Nothing to update. Provide at least one of --sex, --age, --height, --weight, or --activity");
    }

    let mut profile = session.profile()?;
    if let Some(s) = sex {
        profile.sex = s.parse::<Sex>()?;
    }
    if let Some(a) = age {
        profile.age = a;
    }
    if let Some(h) = height {
        profile.height_cm = h;
    }
    if let Some(w) = weight {
        profile.weight_kg = w;
    }
    if let Some(a) = activity {
        profile.activity = ActivityLevel::from_label(a);
    }

    session.save_profile(&profile)?;

    let view = ProfileView::new(profile);
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        println!("Profile updated\n");
        view.print();
    }

    Ok(())
}

pub(crate) fn cmd_profile_show(session: &Session, json: bool) -> Result<()> {
    let view = ProfileView::new(session.profile()?);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        view.print();
    }

    Ok(())
}
