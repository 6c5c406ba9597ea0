//! Frozen attack policy consulted by the tactics manager.
//!
//! A [`PolicyModel`] maps an [`EncodedState`] to a probability vector over
//! the four [`ActionChoice`] labels. The agent only reads from it; training
//! happens offline from the samples written by [`crate::training`].
//!
//! [`LinearPolicy`] is the bundled implementation: the image is average-
//! pooled into a coarse grid and fed through one softmax layer. Weights
//! are plain JSON so that any offline trainer can export them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::{EncodedState, CHANNELS};
use crate::error::{AgentError, Result};
use crate::tactics::ActionChoice;

/// A frozen classifier over encoded states.
pub trait PolicyModel {
    /// `(height, width, channels)` the model was trained on.
    fn input_shape(&self) -> (usize, usize, usize);

    /// Probability per [`ActionChoice`] label, in label order.
    fn infer(&self, state: &EncodedState) -> Result<Vec<f32>>;
}

/// Index of the largest finite value; ties resolve to the lowest index.
#[must_use]
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Run `model` and turn its output into a label.
pub fn choose(model: &dyn PolicyModel, state: &EncodedState) -> Result<ActionChoice> {
    if model.input_shape() != state.shape() {
        return Err(AgentError::ShapeMismatch {
            expected: model.input_shape(),
            actual: state.shape(),
        });
    }
    let probs = model.infer(state)?;
    if probs.len() != ActionChoice::COUNT {
        return Err(AgentError::Inference(format!(
            "expected {} outputs, got {}",
            ActionChoice::COUNT,
            probs.len()
        )));
    }
    argmax(&probs)
        .and_then(ActionChoice::from_index)
        .ok_or_else(|| AgentError::Inference("no finite output".into()))
}

/// Pooled-grid softmax classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPolicy {
    /// Shape of the images the weights were fitted on.
    pub input_shape: (usize, usize, usize),
    /// Pooling cells per image side.
    pub grid: usize,
    /// One row per label, `grid × grid × channels` columns.
    pub weights: Vec<Vec<f32>>,
    /// One bias per label.
    pub bias: Vec<f32>,
}

impl LinearPolicy {
    /// All-zero weights; infers a uniform distribution.
    #[must_use]
    pub fn zeros(input_shape: (usize, usize, usize), grid: usize) -> Self {
        let features = grid * grid * input_shape.2;
        Self {
            input_shape,
            grid,
            weights: vec![vec![0.0; features]; ActionChoice::COUNT],
            bias: vec![0.0; ActionChoice::COUNT],
        }
    }

    /// Load weights from a JSON file and check their dimensions.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |message: String| AgentError::PolicyLoad {
            path: path.display().to_string(),
            message,
        };
        let contents = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let model: Self = serde_json::from_str(&contents).map_err(|e| load_err(e.to_string()))?;
        model.check().map_err(load_err)?;
        tracing::info!(path = %path.display(), shape = ?model.input_shape, "policy model loaded");
        Ok(model)
    }

    /// Save weights as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| AgentError::InvalidState(format!("Failed to serialize policy: {e}")))?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    fn features_len(&self) -> usize {
        self.grid * self.grid * self.input_shape.2
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.grid == 0 || self.input_shape.0 < self.grid || self.input_shape.1 < self.grid {
            return Err(format!(
                "grid {} does not fit input {:?}",
                self.grid, self.input_shape
            ));
        }
        if self.input_shape.2 != CHANNELS {
            return Err(format!("expected {CHANNELS} channels, got {}", self.input_shape.2));
        }
        if self.weights.len() != ActionChoice::COUNT || self.bias.len() != ActionChoice::COUNT {
            return Err(format!("expected {} output rows", ActionChoice::COUNT));
        }
        let features = self.features_len();
        if let Some(row) = self.weights.iter().position(|w| w.len() != features) {
            return Err(format!("weight row {row} should have {features} columns"));
        }
        Ok(())
    }

    /// Mean of each channel over each grid cell, scaled to `[0, 1]`.
    fn pool(&self, state: &EncodedState) -> Vec<f32> {
        let (height, width, channels) = state.shape();
        let mut sums = vec![0.0f32; self.features_len()];
        let mut counts = vec![0u32; self.grid * self.grid];
        let pixels = state.as_slice();

        for row in 0..height {
            let cell_row = row * self.grid / height;
            for col in 0..width {
                let cell = cell_row * self.grid + col * self.grid / width;
                counts[cell] += 1;
                let i = (row * width + col) * channels;
                for ch in 0..channels {
                    sums[cell * channels + ch] += f32::from(pixels[i + ch]);
                }
            }
        }
        for (cell, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            for ch in 0..channels {
                sums[cell * channels + ch] /= count as f32 * 255.0;
            }
        }
        sums
    }
}

impl PolicyModel for LinearPolicy {
    fn input_shape(&self) -> (usize, usize, usize) {
        self.input_shape
    }

    fn infer(&self, state: &EncodedState) -> Result<Vec<f32>> {
        self.check().map_err(AgentError::Inference)?;
        let features = self.pool(state);
        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(&features).map(|(w, f)| w * f).sum::<f32>() + b)
            .collect();
        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
