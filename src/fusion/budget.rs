use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Mutex;
use tracing::warn;

/// Per-UTC-day cap on supplementary source calls.
#[derive(Debug)]
pub struct DailyBudget {
    cap: u32,
    state: Mutex<(NaiveDate, u32)>,
}

impl DailyBudget {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            state: Mutex::new((NaiveDate::MIN, 0)),
        }
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    /// Reserves one call. Returns `false` once the day's cap is used up.
    pub fn try_spend(&self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.0 != today {
            *state = (today, 0);
        }
        if state.1 >= self.cap {
            warn!(cap = self.cap, date = %today, "Supplementary call budget exhausted");
            return false;
        }
        state.1 += 1;
        true
    }

    pub fn used(&self, now: DateTime<Utc>) -> u32 {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.0 == now.date_naive() { state.1 } else { 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_budget_caps_and_resets_daily() {
        let budget = DailyBudget::new(2);
        let day = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();

        assert!(budget.try_spend(day));
        assert!(budget.try_spend(day));
        assert!(!budget.try_spend(day));
        assert_eq!(budget.used(day), 2);

        let next_day = day + Duration::days(1);
        assert_eq!(budget.used(next_day), 0);
        assert!(budget.try_spend(next_day));
    }

    #[test]
    fn test_zero_cap_never_spends() {
        let budget = DailyBudget::new(0);
        assert!(!budget.try_spend(Utc::now()));
    }
}
