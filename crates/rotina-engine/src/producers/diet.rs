//! Diet producers: junk-food repetition, protein floor, daily goal
//! closing, and missed-meal nudges.

use rotina_core::types::{AlertCandidate, AlertKind, DiaryEntry, DomainSnapshot, Subject};

use super::{AlertProducer, EvalContext};

fn today_entries<'a>(ctx: &EvalContext<'_>, state: &'a DomainSnapshot) -> Vec<&'a DiaryEntry> {
    state.diary.iter().filter(|e| e.date == ctx.time.date).collect()
}

/// A configured keyword showing up repeatedly in the last 7 days of diary
/// text. One candidate per offending keyword, once per week.
pub struct JunkFoodProducer;

impl AlertProducer for JunkFoodProducer {
    fn name(&self) -> &'static str {
        "diet-junk-food"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let cfg = &ctx.config.diet;
        let mut out = Vec::new();
        for keyword in &cfg.junk_keywords {
            let count = state
                .diary
                .iter()
                .filter(|e| e.description.to_lowercase().contains(keyword.as_str()))
                .count() as u32;
            if count >= cfg.junk_repeat_min {
                let dedup_key = format!("{}-{}", ctx.time.week_start(), keyword);
                let message = format!(
                    "🍔 '{}' apareceu {}x no seu diário nos últimos 7 dias. Que tal variar?",
                    keyword, count
                );
                out.push(AlertCandidate::new(&subject.id, AlertKind::JunkFoodRepeat, dedup_key, message));
            }
        }
        out
    }
}

/// Protein running low late in the day. Only evaluated after the
/// configured hour; the subject's own goal wins over the global floor.
pub struct LowProteinProducer;

impl AlertProducer for LowProteinProducer {
    fn name(&self) -> &'static str {
        "diet-low-protein"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let cfg = &ctx.config.diet;
        if ctx.time.hour < cfg.protein_after_hour {
            return Vec::new();
        }
        let target = state
            .goals
            .as_ref()
            .map(|g| g.protein_g)
            .filter(|g| *g > 0.0)
            .unwrap_or(cfg.protein_min_g);
        let total: f64 = today_entries(ctx, state).iter().map(|e| e.protein_g).sum();
        if total >= target {
            return Vec::new();
        }

        let dedup_key = ctx.time.date.to_string();
        let message = format!(
            "🥩 Proteína de hoje: {:.0}g de {:.0}g. Ainda dá tempo de ajustar no jantar.",
            total, target
        );
        vec![AlertCandidate::new(&subject.id, AlertKind::LowProtein, dedup_key, message)]
    }
}

/// End-of-day goal closing. Only inside the closing window; compares
/// today's totals against the subject's goals and lists what fell short.
pub struct GoalsMissedProducer;

impl AlertProducer for GoalsMissedProducer {
    fn name(&self) -> &'static str {
        "diet-goals-missed"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        if !ctx.windows.in_closing(ctx.time.minute_of_day) {
            return Vec::new();
        }
        let goals = match &state.goals {
            Some(g) => g,
            None => return Vec::new(),
        };

        let today = today_entries(ctx, state);
        let calories: f64 = today.iter().map(|e| e.calories).sum();
        let protein: f64 = today.iter().map(|e| e.protein_g).sum();
        let water: f64 = today.iter().map(|e| e.water_ml).sum();

        let mut missed = Vec::new();
        if goals.calories > 0.0 && calories < goals.calories {
            missed.push(format!("calorias {:.0}/{:.0}", calories, goals.calories));
        }
        if goals.protein_g > 0.0 && protein < goals.protein_g {
            missed.push(format!("proteína {:.0}g/{:.0}g", protein, goals.protein_g));
        }
        if goals.water_ml > 0.0 && water < goals.water_ml {
            missed.push(format!("água {:.0}ml/{:.0}ml", water, goals.water_ml));
        }
        if missed.is_empty() {
            return Vec::new();
        }

        let dedup_key = ctx.time.date.to_string();
        let message = format!("🎯 Fechamento do dia: faltou {}.", missed.join(", "));
        vec![AlertCandidate::new(&subject.id, AlertKind::GoalsMissed, dedup_key, message)]
    }
}

/// No diary entry for the meal whose window we are inside.
///
/// Subjects with an empty last-7-days diary are never nagged — a profile
/// that isn't tracking food has nothing to miss.
pub struct MealMissingProducer;

impl AlertProducer for MealMissingProducer {
    fn name(&self) -> &'static str {
        "diet-meal-missing"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let window = match ctx.windows.meal_at(ctx.time.minute_of_day) {
            Some(w) => w,
            None => return Vec::new(),
        };
        if state.diary.is_empty() {
            return Vec::new();
        }
        let logged = state
            .diary
            .iter()
            .any(|e| e.date == ctx.time.date && e.meal.as_deref() == Some(window.label.as_str()));
        if logged {
            return Vec::new();
        }

        let dedup_key = format!("{}-{}", ctx.time.date, window.label);
        let message = format!("🍽️ Ainda não registrou seu {} de hoje.", window.label);
        vec![AlertCandidate::new(&subject.id, AlertKind::MealMissing, dedup_key, message)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::testctx;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rotina_core::config::RotinaConfig;
    use rotina_core::types::DailyGoals;

    fn subject() -> Subject {
        Subject {
            id: "u1".into(),
            name: "Ana".into(),
            phone: "11988887777".into(),
            active: true,
        }
    }

    fn entry(date: (i32, u32, u32), meal: Option<&str>, desc: &str, protein: f64) -> DiaryEntry {
        DiaryEntry {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            meal: meal.map(|m| m.to_string()),
            description: desc.into(),
            calories: 500.0,
            protein_g: protein,
            water_ml: 300.0,
        }
    }

    fn eval_at(
        producer: &dyn AlertProducer,
        hour_utc: u32,
        minute: u32,
        state: &DomainSnapshot,
        config: &RotinaConfig,
    ) -> Vec<AlertCandidate> {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, hour_utc, minute, 0).unwrap();
        let (time, windows) = testctx::at(now, config);
        let ctx = EvalContext { time: &time, windows: &windows, config };
        producer.evaluate(&subject(), &ctx, state)
    }

    #[test]
    fn junk_food_counts_across_the_week() {
        let config = RotinaConfig::default(); // min 3
        let state = DomainSnapshot {
            diary: vec![
                entry((2024, 5, 8), Some("Jantar"), "Pizza de calabresa", 30.0),
                entry((2024, 5, 9), Some("Jantar"), "pizza quatro queijos", 30.0),
                entry((2024, 5, 10), Some("Almoço"), "PIZZA com refrigerante", 30.0),
            ],
            ..Default::default()
        };
        let cands = eval_at(&JunkFoodProducer, 15, 0, &state, &config);
        assert_eq!(cands.len(), 1);
        // 2024-05-10 is a Friday; week starts Monday the 6th.
        assert_eq!(cands[0].dedup_key, "2024-05-06-pizza");
        assert!(cands[0].message.contains("3x"));
    }

    #[test]
    fn junk_food_below_repeat_count_is_quiet() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 9), None, "pizza", 10.0)],
            ..Default::default()
        };
        assert!(eval_at(&JunkFoodProducer, 15, 0, &state, &config).is_empty());
    }

    #[test]
    fn low_protein_only_after_configured_hour() {
        let config = RotinaConfig::default(); // after 18h local, floor 60g
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 10), Some("Almoço"), "salada", 20.0)],
            ..Default::default()
        };
        // 15:00 UTC = 12:00 local — too early.
        assert!(eval_at(&LowProteinProducer, 15, 0, &state, &config).is_empty());
        // 22:00 UTC = 19:00 local.
        let cands = eval_at(&LowProteinProducer, 22, 0, &state, &config);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "2024-05-10");
    }

    #[test]
    fn low_protein_prefers_subject_goal_over_floor() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 10), Some("Almoço"), "frango", 80.0)],
            goals: Some(DailyGoals { calories: 0.0, protein_g: 120.0, water_ml: 0.0 }),
            ..Default::default()
        };
        // 80g beats the 60g floor but not the 120g personal goal.
        let cands = eval_at(&LowProteinProducer, 22, 0, &state, &config);
        assert_eq!(cands.len(), 1);
    }

    #[test]
    fn goals_missed_only_inside_closing_window() {
        let config = RotinaConfig::default(); // closing 21:30–22:30 local
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 10), Some("Almoço"), "arroz e feijão", 30.0)],
            goals: Some(DailyGoals { calories: 2000.0, protein_g: 120.0, water_ml: 2000.0 }),
            ..Default::default()
        };
        // 12:00 local: outside.
        assert!(eval_at(&GoalsMissedProducer, 15, 0, &state, &config).is_empty());
        // 00:45 UTC next day = 21:45 local on the 10th.
        let now = Utc.with_ymd_and_hms(2024, 5, 11, 0, 45, 0).unwrap();
        let (time, windows) = testctx::at(now, &config);
        let ctx = EvalContext { time: &time, windows: &windows, config: &config };
        let cands = GoalsMissedProducer.evaluate(&subject(), &ctx, &state);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "2024-05-10");
        assert!(cands[0].message.contains("calorias"));
        assert!(cands[0].message.contains("água"));
    }

    #[test]
    fn meal_missing_fires_inside_window_without_entry() {
        let config = RotinaConfig::default(); // Almoço 11:30–14:00 local
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 9), Some("Almoço"), "marmita", 40.0)],
            ..Default::default()
        };
        // 15:30 UTC = 12:30 local → inside Almoço, nothing logged today.
        let cands = eval_at(&MealMissingProducer, 15, 30, &state, &config);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "2024-05-10-Almoço");
    }

    #[test]
    fn meal_missing_quiet_when_logged_or_outside_window() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 10), Some("Almoço"), "marmita", 40.0)],
            ..Default::default()
        };
        assert!(eval_at(&MealMissingProducer, 15, 30, &state, &config).is_empty());
        // 13:00 UTC = 10:00 local → between meal windows.
        let state = DomainSnapshot {
            diary: vec![entry((2024, 5, 9), Some("Almoço"), "marmita", 40.0)],
            ..Default::default()
        };
        assert!(eval_at(&MealMissingProducer, 13, 0, &state, &config).is_empty());
    }

    #[test]
    fn meal_missing_never_nags_untracked_profiles() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot::default();
        assert!(eval_at(&MealMissingProducer, 15, 30, &state, &config).is_empty());
    }
}
