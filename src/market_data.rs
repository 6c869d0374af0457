//! Daily price history: the provider seam, the Yahoo Finance client and the
//! lookback window logic shared by every request.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ForecastError, Result};
use crate::utils::last_weekday_on_or_before;

/// One daily OHLC bar as returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A single (date, close) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Closing prices ordered by strictly increasing date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Builds a series from provider bars: sorted by date, later duplicates
    /// replace earlier ones, non-finite or non-positive closes are dropped.
    pub fn from_bars(symbol: impl Into<String>, bars: &[DailyBar]) -> Self {
        let by_date: BTreeMap<NaiveDate, f64> = bars
            .iter()
            .filter(|bar| bar.close.is_finite() && bar.close > 0.0)
            .map(|bar| (bar.date, bar.close))
            .collect();

        PriceSeries {
            symbol: symbol.into(),
            points: by_date
                .into_iter()
                .map(|(date, price)| PricePoint { date, price })
                .collect(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.price).collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Source of daily bars. Implementations must be usable from several request
/// threads at once.
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for `symbol` with `start <= date < end`.
    fn daily_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>>;
}

/// Market data settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Calendar days of history before the reference date
    pub lookback_days: i64,
    /// Fewer rows than this is `InsufficientData`
    pub min_rows: usize,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        MarketDataConfig {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 30,
            lookback_days: 90,
            min_rows: 30,
        }
    }
}

/// The [start, end) range requested for a reference date.
///
/// `start` is `lookback_days` before the reference date; `end` is the
/// reference date moved back to Friday when it falls on a weekend.
///
/// Dates whose range would leave chrono's calendar are `InvalidRequest`.
pub fn lookback_range(reference_date: NaiveDate, lookback_days: i64) -> Result<(NaiveDate, NaiveDate)> {
    let out_of_range = || ForecastError::InvalidRequest(format!("date {} is out of range", reference_date));
    let start = Duration::try_days(lookback_days)
        .and_then(|span| reference_date.checked_sub_signed(span))
        .ok_or_else(out_of_range)?;
    let end = last_weekday_on_or_before(reference_date).ok_or_else(out_of_range)?;
    Ok((start, end))
}

/// Fetches the closing-price history for one request.
///
/// Exactly one provider call, no retry. Zero rows is `DataUnavailable`, fewer
/// than `min_rows` is `InsufficientData`.
pub fn fetch_price_series(
    provider: &dyn MarketDataProvider,
    symbol: &str,
    reference_date: NaiveDate,
    config: &MarketDataConfig,
) -> Result<PriceSeries> {
    let (start, end) = lookback_range(reference_date, config.lookback_days)?;
    info!("Downloading {} data from {} to {}", symbol, start, end);

    let bars = provider.daily_bars(symbol, start, end)?;
    let in_range: Vec<DailyBar> = bars
        .into_iter()
        .filter(|bar| bar.date >= start && bar.date < end)
        .collect();
    let series = PriceSeries::from_bars(symbol, &in_range);
    info!("Downloaded {} data points for {}", series.len(), symbol);

    if series.is_empty() {
        return Err(ForecastError::DataUnavailable {
            symbol: symbol.to_string(),
            start,
            end,
        });
    }
    if series.len() < config.min_rows {
        warn!("{} only has {} rows, need {}", symbol, series.len(), config.min_rows);
        return Err(ForecastError::InsufficientData {
            symbol: symbol.to_string(),
            got: series.len(),
            required: config.min_rows,
        });
    }

    Ok(series)
}

/// Yahoo Finance chart API response
#[derive(Debug, Deserialize)]
struct YahooResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo Finance daily-bar client
pub struct YahooFinance {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl YahooFinance {
    /// Builds the blocking HTTP client. Must not be called from inside an
    /// async runtime.
    pub fn new(config: &MarketDataConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval=1d&period1={}&period2={}",
            self.base_url,
            symbol,
            start.and_time(NaiveTime::MIN).and_utc().timestamp(),
            end.and_time(NaiveTime::MIN).and_utc().timestamp()
        )
    }
}

impl MarketDataProvider for YahooFinance {
    fn daily_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyBar>> {
        let url = self.chart_url(symbol, start, end);
        log::debug!("Fetching Yahoo data from: {}", url);

        let response = self.client.get(&url).send()?;
        let status = response.status();
        let body = response.text()?;
        chart_bars(symbol, start, end, status, &body)
    }
}

/// Maps one chart response to bars or the matching error kind.
fn chart_bars(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    status: reqwest::StatusCode,
    body: &str,
) -> Result<Vec<DailyBar>> {
    if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
        return Err(ForecastError::ProviderFailure(format!(
            "Yahoo returned {} for {}",
            status, symbol
        )));
    }

    match parse_chart(body) {
        Ok(bars) => Ok(bars),
        Err(ChartError::NotFound(message)) => {
            warn!("{}", message);
            Err(ForecastError::DataUnavailable {
                symbol: symbol.to_string(),
                start,
                end,
            })
        }
        Err(_) if status == reqwest::StatusCode::NOT_FOUND => Err(ForecastError::DataUnavailable {
            symbol: symbol.to_string(),
            start,
            end,
        }),
        Err(ChartError::Api(message)) | Err(ChartError::Malformed(message)) => {
            Err(ForecastError::ProviderFailure(format!("{} ({})", message, status)))
        }
    }
}

#[derive(Debug)]
enum ChartError {
    NotFound(String),
    Api(String),
    Malformed(String),
}

/// Decodes a chart response into bars, skipping rows without a close.
fn parse_chart(body: &str) -> std::result::Result<Vec<DailyBar>, ChartError> {
    let response: YahooResponse =
        serde_json::from_str(body).map_err(|e| ChartError::Malformed(format!("unreadable chart response: {}", e)))?;

    if let Some(error) = response.chart.error {
        let message = format!("Yahoo API error: {} - {}", error.code, error.description);
        return if error.code.eq_ignore_ascii_case("not found") {
            Err(ChartError::NotFound(message))
        } else {
            Err(ChartError::Api(message))
        };
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };
    let gmtoffset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        let Some(local) = DateTime::from_timestamp(ts + gmtoffset, 0) else {
            continue;
        };
        let field = |column: &[Option<f64>]| column.get(i).copied().flatten().unwrap_or(close);

        bars.push(DailyBar {
            date: local.date_naive(),
            open: field(quote.open.as_slice()),
            high: field(quote.high.as_slice()),
            low: field(quote.low.as_slice()),
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
        });
    }

    Ok(bars)
}
