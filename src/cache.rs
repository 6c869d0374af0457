//! Optional in-memory cache of trained models.
//!
//! A model is reused only for the same symbol, the exact same closing prices
//! and the same model/training settings. Entries expire after a fixed TTL and
//! the oldest entry is evicted once the cache is full.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::metrics::Evaluation;
use crate::models::forecast_network::{ForecastNetwork, ModelConfig};
use crate::scaler::MinMaxScaler;
use crate::training::TrainingConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            ttl_secs: 3600,
            capacity: 32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    symbol: String,
    prices_hash: u64,
    settings_hash: u64,
}

impl CacheKey {
    pub fn new(symbol: &str, closes: &[f64], model: &ModelConfig, training: &TrainingConfig) -> Self {
        let mut prices = DefaultHasher::new();
        for close in closes {
            close.to_bits().hash(&mut prices);
        }

        let mut settings = DefaultHasher::new();
        model.look_back.hash(&mut settings);
        model.hidden_sizes.hash(&mut settings);
        model.dropout.to_bits().hash(&mut settings);
        training.epochs.hash(&mut settings);
        training.batch_size.hash(&mut settings);
        training.learning_rate.to_bits().hash(&mut settings);
        training.test_fraction.to_bits().hash(&mut settings);
        training.validation_split.to_bits().hash(&mut settings);
        training.seed.hash(&mut settings);

        CacheKey {
            symbol: symbol.to_string(),
            prices_hash: prices.finish(),
            settings_hash: settings.finish(),
        }
    }
}

/// Everything the forecaster needs from a finished training run.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub network: ForecastNetwork,
    pub scaler: MinMaxScaler,
    pub evaluation: Evaluation,
}

struct Entry {
    model: TrainedModel,
    inserted_at: Instant,
}

pub struct ModelCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl ModelCache {
    pub fn new(config: &CacheConfig) -> Self {
        ModelCache {
            ttl: Duration::from_secs(config.ttl_secs),
            capacity: config.capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A clone of the cached model, if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<TrainedModel> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.model.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: CacheKey, model: TrainedModel) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            Entry {
                model,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn trained() -> TrainedModel {
        let config = ModelConfig { look_back: 3, hidden_sizes: vec![2], dropout: 0.0 };
        TrainedModel {
            network: ForecastNetwork::new(&config, &mut StdRng::seed_from_u64(0)),
            scaler: MinMaxScaler::fit(&[1.0, 2.0]).unwrap(),
            evaluation: Evaluation { test_mse: 0.01, mape: 2.0, accuracy: 98.0, test_samples: 3 },
        }
    }

    fn key(symbol: &str, closes: &[f64]) -> CacheKey {
        CacheKey::new(symbol, closes, &ModelConfig::default(), &TrainingConfig::default())
    }

    #[test]
    fn test_hit_requires_same_prices() {
        let cache = ModelCache::new(&CacheConfig { enabled: true, ..CacheConfig::default() });
        cache.insert(key("AAPL", &[1.0, 2.0, 3.0]), trained());

        assert!(cache.get(&key("AAPL", &[1.0, 2.0, 3.0])).is_some());
        assert!(cache.get(&key("AAPL", &[1.0, 2.0, 3.5])).is_none());
        assert!(cache.get(&key("MSFT", &[1.0, 2.0, 3.0])).is_none());
    }

    #[test]
    fn test_settings_change_key() {
        let training = TrainingConfig { epochs: 99, ..TrainingConfig::default() };
        let a = key("AAPL", &[1.0]);
        let b = CacheKey::new("AAPL", &[1.0], &ModelConfig::default(), &training);
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_entries_dropped() {
        let cache = ModelCache::new(&CacheConfig { enabled: true, ttl_secs: 0, capacity: 4 });
        cache.insert(key("AAPL", &[1.0]), trained());
        assert!(cache.get(&key("AAPL", &[1.0])).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let cache = ModelCache::new(&CacheConfig { enabled: true, ttl_secs: 3600, capacity: 2 });
        cache.insert(key("A", &[1.0]), trained());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("B", &[1.0]), trained());
        std::thread::sleep(Duration::from_millis(2));
        cache.insert(key("C", &[1.0]), trained());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("A", &[1.0])).is_none());
        assert!(cache.get(&key("C", &[1.0])).is_some());
    }
}
