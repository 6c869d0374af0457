use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis};
use std::ops::Range;

use crate::error::{ForecastError, Result};

/// Overlapping training windows cut from a scaled series.
///
/// `inputs` is laid out as (samples, timesteps, features) with a single
/// feature; `targets[i]` is the value right after window `i`.
#[derive(Debug, Clone)]
pub struct Windows {
    pub inputs: Array3<f64>,
    pub targets: Array1<f64>,
}

impl Windows {
    /// Slice `series` into `len - look_back` windows.
    ///
    /// Fails with `InsufficientSamples` when fewer than `min_samples` windows
    /// can be built.
    pub fn build(series: ArrayView1<f64>, look_back: usize, min_samples: usize) -> Result<Self> {
        let samples = series.len().saturating_sub(look_back);
        if look_back == 0 || samples < min_samples.max(1) {
            return Err(ForecastError::InsufficientSamples {
                got: samples,
                required: min_samples.max(1),
            });
        }

        let mut inputs = Array3::zeros((samples, look_back, 1));
        let mut targets = Array1::zeros(samples);
        for i in 0..samples {
            inputs
                .slice_mut(s![i, .., 0])
                .assign(&series.slice(s![i..i + look_back]));
            targets[i] = series[i + look_back];
        }

        Ok(Windows { inputs, targets })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn look_back(&self) -> usize {
        self.inputs.len_of(Axis(1))
    }

    /// Chronological split: the first `at` windows and the rest.
    pub fn split_at(&self, at: usize) -> (Windows, Windows) {
        let at = at.min(self.len());
        let head = Windows {
            inputs: self.inputs.slice(s![..at, .., ..]).to_owned(),
            targets: self.targets.slice(s![..at]).to_owned(),
        };
        let tail = Windows {
            inputs: self.inputs.slice(s![at.., .., ..]).to_owned(),
            targets: self.targets.slice(s![at..]).to_owned(),
        };
        (head, tail)
    }

    /// Per-timestep inputs for a batch of windows, each `(features, batch)`,
    /// plus the `(1, batch)` targets.
    pub fn batch(&self, range: Range<usize>) -> (Vec<Array2<f64>>, Array2<f64>) {
        let batch = self.inputs.slice(s![range.clone(), .., ..]);
        let steps = (0..self.look_back())
            .map(|t| batch.slice(s![.., t, ..]).t().to_owned())
            .collect();
        let targets = self
            .targets
            .slice(s![range])
            .to_owned()
            .insert_axis(Axis(0));
        (steps, targets)
    }

    pub fn window(&self, index: usize) -> Vec<f64> {
        self.inputs.slice(s![index, .., 0]).to_vec()
    }
}
