//! Supervised samples for the offline policy trainer.
//!
//! Each time a label is chosen in [`crate::config::TacticsMode::Choice`]
//! with recording on, the agent appends `(one_hot(label), state)`. The log
//! lives in memory for the whole session and is written once, as a single
//! versioned bincode file, when the session is won.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::EncodedState;
use crate::error::{AgentError, Result};
use crate::tactics::ActionChoice;

/// Training file format version for compatibility.
pub const TRAINING_VERSION: u32 = 1;

/// One labelled state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSample {
    /// One-hot label over [`ActionChoice`] indices.
    pub label: [u8; ActionChoice::COUNT],
    /// Encoded state the label was chosen for.
    pub state: EncodedState,
}

impl TrainingSample {
    /// Sample for `choice`.
    #[must_use]
    pub fn new(choice: ActionChoice, state: EncodedState) -> Self {
        Self {
            label: choice.one_hot(),
            state,
        }
    }

    /// The labelled choice (arg-max of the one-hot vector).
    #[must_use]
    pub fn choice(&self) -> Option<ActionChoice> {
        let (index, &max) = self
            .label
            .iter()
            .enumerate()
            .max_by_key(|&(i, &v)| (v, std::cmp::Reverse(i)))?;
        if max == 0 {
            return None;
        }
        ActionChoice::from_index(index)
    }
}

/// Append-only session sample buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingLog {
    /// File format version.
    pub version: u32,
    /// Seed of the session that produced the samples.
    pub seed: u64,
    /// Samples in the order they were recorded.
    pub samples: Vec<TrainingSample>,
}

impl TrainingLog {
    /// Empty log for a session.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            version: TRAINING_VERSION,
            seed,
            samples: Vec::new(),
        }
    }

    /// Append a sample.
    pub fn push(&mut self, choice: ActionChoice, state: EncodedState) {
        self.samples.push(TrainingSample::new(choice, state));
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples per label, in label order.
    #[must_use]
    pub fn label_counts(&self) -> [usize; ActionChoice::COUNT] {
        let mut counts = [0; ActionChoice::COUNT];
        for choice in self.samples.iter().filter_map(TrainingSample::choice) {
            counts[choice.index()] += 1;
        }
        counts
    }

    /// Copy with every label truncated to the rarest label's count,
    /// keeping the earliest samples of each label.
    #[must_use]
    pub fn balanced(&self) -> Self {
        let lowest = self.label_counts().into_iter().min().unwrap_or(0);
        let mut kept = [0usize; ActionChoice::COUNT];
        let samples = self
            .samples
            .iter()
            .filter(|s| {
                let Some(choice) = s.choice() else {
                    return false;
                };
                let slot = &mut kept[choice.index()];
                *slot += 1;
                *slot <= lowest
            })
            .cloned()
            .collect();
        Self {
            version: self.version,
            seed: self.seed,
            samples,
        }
    }

    /// Save the log to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_bytes()?)?;
        Ok(())
    }

    /// Save the log to a file that must not exist yet.
    ///
    /// Fails with an [`std::io::ErrorKind::AlreadyExists`] I/O error instead
    /// of replacing earlier samples.
    pub fn save_new<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        file.write_all(&bytes)?;
        Ok(())
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| {
            AgentError::TrainingFormat(format!("Failed to serialize training log: {e}"))
        })
    }

    /// Load a log from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let log: Self = bincode::deserialize(&bytes).map_err(|e| {
            AgentError::TrainingFormat(format!("Failed to deserialize training log: {e}"))
        })?;

        if log.version != TRAINING_VERSION {
            return Err(AgentError::TrainingFormat(format!(
                "Training log version mismatch: expected {}, got {}",
                TRAINING_VERSION, log.version
            )));
        }

        Ok(log)
    }
}
