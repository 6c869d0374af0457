/// Numeric and calendar helpers shared across the crate.
use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Derivative of tanh expressed through its output: 1 - tanh(x)²
pub fn tanh_grad_from_output(y: f64) -> f64 {
    1.0 - y * y
}

/// Round a price to whole cents for reporting.
pub fn round_to_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Move a weekend date back to the preceding Friday; weekdays are unchanged.
///
/// `None` only at the very start of chrono's calendar.
pub fn last_weekday_on_or_before(date: NaiveDate) -> Option<NaiveDate> {
    match date.weekday() {
        Weekday::Sat => date.checked_sub_days(Days::new(1)),
        Weekday::Sun => date.checked_sub_days(Days::new(2)),
        _ => Some(date),
    }
}

/// The first weekday strictly after `date`.
pub fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next += Duration::days(1);
    }
    next
}
