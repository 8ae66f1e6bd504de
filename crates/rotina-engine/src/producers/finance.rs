//! Finance producers: low month-to-date balance and category spikes.

use rotina_core::types::{AlertCandidate, AlertKind, DomainSnapshot, Subject};

use super::{AlertProducer, EvalContext};

/// Fires when the month-to-date balance falls to the configured floor.
///
/// The dedup key embeds month, threshold, and the rounded balance: a
/// materially different balance re-alerts, the same balance does not.
pub struct LowBalanceProducer;

impl AlertProducer for LowBalanceProducer {
    fn name(&self) -> &'static str {
        "finance-low-balance"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let balance = match state.month_balance {
            Some(b) => b,
            // No transactions this month: an empty ledger is not low.
            None => return Vec::new(),
        };
        let threshold = ctx.config.finance.low_balance_threshold;
        if balance > threshold {
            return Vec::new();
        }

        let dedup_key = format!(
            "{}-{}-{}",
            ctx.time.month_key(),
            threshold.round() as i64,
            balance.round() as i64
        );
        let message = format!(
            "💰 Atenção, {}: seu saldo do mês está em R$ {:.2} (alerta abaixo de R$ {:.2}).",
            subject.name, balance, threshold
        );
        vec![AlertCandidate::new(&subject.id, AlertKind::LowBalance, dedup_key, message)]
    }
}

/// Fires once per month per category when the top expense category passes
/// an absolute total or a share of all expenses.
pub struct CategorySpikeProducer;

impl AlertProducer for CategorySpikeProducer {
    fn name(&self) -> &'static str {
        "finance-category-spike"
    }

    fn evaluate(
        &self,
        subject: &Subject,
        ctx: &EvalContext<'_>,
        state: &DomainSnapshot,
    ) -> Vec<AlertCandidate> {
        let total: f64 = state.month_expenses.iter().map(|(_, v)| v).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let top = state
            .month_expenses
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1));
        let (category, spent) = match top {
            Some((c, s)) => (c, *s),
            None => return Vec::new(),
        };

        let cfg = &ctx.config.finance;
        let share = spent / total;
        if spent < cfg.category_abs_threshold && share < cfg.category_share {
            return Vec::new();
        }

        let dedup_key = format!("{}-{}", ctx.time.month_key(), category);
        let message = format!(
            "📊 '{}' já soma R$ {:.2} este mês ({:.0}% dos seus gastos).",
            category,
            spent,
            share * 100.0
        );
        vec![AlertCandidate::new(&subject.id, AlertKind::CategorySpike, dedup_key, message)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::testctx;
    use chrono::TimeZone;
    use rotina_core::config::RotinaConfig;

    fn subject() -> Subject {
        Subject {
            id: "u1".into(),
            name: "Ana".into(),
            phone: "11988887777".into(),
            active: true,
        }
    }

    fn eval(
        producer: &dyn AlertProducer,
        state: &DomainSnapshot,
        config: &RotinaConfig,
    ) -> Vec<AlertCandidate> {
        // 2024-05-10 12:00 in São Paulo.
        let now = chrono::Utc.with_ymd_and_hms(2024, 5, 10, 15, 0, 0).unwrap();
        let (time, windows) = testctx::at(now, config);
        let ctx = EvalContext { time: &time, windows: &windows, config };
        producer.evaluate(&subject(), &ctx, state)
    }

    #[test]
    fn low_balance_key_matches_month_threshold_and_bucket() {
        let config = RotinaConfig::default(); // threshold 200
        let state = DomainSnapshot {
            month_balance: Some(150.0),
            ..Default::default()
        };
        let cands = eval(&LowBalanceProducer, &state, &config);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].kind, AlertKind::LowBalance);
        assert_eq!(cands[0].dedup_key, "2024-05-200-150");
    }

    #[test]
    fn healthy_balance_or_no_transactions_stay_quiet() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot {
            month_balance: Some(1500.0),
            ..Default::default()
        };
        assert!(eval(&LowBalanceProducer, &state, &config).is_empty());

        let state = DomainSnapshot { month_balance: None, ..Default::default() };
        assert!(eval(&LowBalanceProducer, &state, &config).is_empty());
    }

    #[test]
    fn different_balance_changes_the_key() {
        let config = RotinaConfig::default();
        let state = DomainSnapshot { month_balance: Some(80.0), ..Default::default() };
        let cands = eval(&LowBalanceProducer, &state, &config);
        assert_eq!(cands[0].dedup_key, "2024-05-200-80");
    }

    #[test]
    fn category_spike_by_share() {
        let config = RotinaConfig::default(); // share 0.4, abs 800
        let state = DomainSnapshot {
            month_expenses: vec![("Restaurante".into(), 300.0), ("Mercado".into(), 200.0)],
            ..Default::default()
        };
        let cands = eval(&CategorySpikeProducer, &state, &config);
        assert_eq!(cands.len(), 1);
        assert_eq!(cands[0].dedup_key, "2024-05-Restaurante");
    }

    #[test]
    fn category_spike_quiet_below_both_thresholds() {
        let mut config = RotinaConfig::default();
        config.finance.category_share = 0.9;
        let state = DomainSnapshot {
            month_expenses: vec![("Restaurante".into(), 300.0), ("Mercado".into(), 200.0)],
            ..Default::default()
        };
        assert!(eval(&CategorySpikeProducer, &state, &config).is_empty());
    }

    #[test]
    fn category_spike_by_absolute_total() {
        let mut config = RotinaConfig::default();
        config.finance.category_share = 0.99;
        let state = DomainSnapshot {
            month_expenses: vec![("Mercado".into(), 900.0), ("Outros".into(), 2000.0)],
            ..Default::default()
        };
        // Top category is Outros at 2000 ≥ abs threshold 800.
        let cands = eval(&CategorySpikeProducer, &state, &config);
        assert_eq!(cands[0].dedup_key, "2024-05-Outros");
    }
}
