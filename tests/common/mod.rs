#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use std::sync::atomic::{AtomicUsize, Ordering};

use stock_forecast::{DailyBar, MarketDataProvider, Result, ServiceConfig};

/// Symbol the fake provider knows nothing about.
pub const UNKNOWN_SYMBOL: &str = "ZZZZ9";

/// Deterministic provider: one bar per weekday in the requested range,
/// following a gentle trend with a weekly wobble.
#[derive(Default)]
pub struct SyntheticProvider {
    calls: AtomicUsize,
}

impl SyntheticProvider {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn daily_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if symbol == UNKNOWN_SYMBOL {
            return Ok(Vec::new());
        }

        let mut bars = Vec::new();
        let mut date = start;
        let mut i = 0.0_f64;
        while date < end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let close = 150.0 + 0.4 * i + 3.0 * (i * 0.9).sin();
                bars.push(DailyBar {
                    date,
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000_000.0,
                });
                i += 1.0;
            }
            date = date.succ_opt().unwrap();
        }
        Ok(bars)
    }
}

/// A Wednesday, so the lookback window ends on the same day.
pub fn reference_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

/// Small, seeded configuration so tests train in well under a second.
pub fn fast_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.model.look_back = 5;
    config.model.hidden_sizes = vec![8, 4];
    config.model.dropout = 0.1;
    config.training.epochs = 3;
    config.training.batch_size = 8;
    config.training.learning_rate = 0.01;
    config.training.seed = Some(42);
    config.training.log_every = 1;
    config
}
