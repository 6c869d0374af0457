use chrono::NaiveDate;
use serde::Serialize;
use std::collections::VecDeque;

use crate::error::{ForecastError, Result};
use crate::models::SequenceRegressor;
use crate::scaler::MinMaxScaler;
use crate::utils::{next_weekday, round_to_cents};

/// One projected trading day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    /// 1 for the first day after the last observation
    pub day_offset: usize,
    pub date: NaiveDate,
    /// Rounded to cents
    pub price: f64,
}

/// Autoregressive forecast: each step feeds the model's own previous output
/// back in, so point `i` depends on every point before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn prices(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Projects `days` prices past `last_date`.
///
/// `recent_scaled` must hold at least `look_back` values; only the last
/// `look_back` are used. Each step predicts the next scaled value, inverts it
/// to a price, re-scales that price and rolls it into the window.
pub fn forecast<M: SequenceRegressor + ?Sized>(
    model: &mut M,
    scaler: &MinMaxScaler,
    recent_scaled: &[f64],
    look_back: usize,
    days: usize,
    last_date: NaiveDate,
) -> Result<Forecast> {
    if look_back == 0 || recent_scaled.len() < look_back {
        return Err(ForecastError::InsufficientSamples {
            got: recent_scaled.len(),
            required: look_back.max(1),
        });
    }

    let mut window: VecDeque<f64> = recent_scaled[recent_scaled.len() - look_back..]
        .iter()
        .copied()
        .collect();
    let mut points = Vec::with_capacity(days);
    let mut date = last_date;

    for day in 1..=days {
        let input: Vec<f64> = window.iter().copied().collect();
        let next_scaled = model.predict_next(&input);
        let price = scaler.inverse(next_scaled);

        if !price.is_finite() || price <= 0.0 {
            return Err(ForecastError::PredictionInvalid(format!(
                "day {} produced a non-positive or non-finite price ({})",
                day, price
            )));
        }

        date = next_weekday(date);
        points.push(ForecastPoint {
            day_offset: day,
            date,
            price: round_to_cents(price),
        });

        window.pop_front();
        window.push_back(scaler.scale(price));
    }

    Ok(Forecast { points })
}
