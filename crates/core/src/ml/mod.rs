//! Relevance Scoring Model
//!
//! A small feed-forward network mapping an item feature vector to a relevance
//! score in `[0, 1]`. The model is retrained from scratch for every catalog
//! generation; nothing is persisted.
//!
//! Training first tries the primary architecture. If it cannot be built or
//! its fit diverges, a smaller network trained with plain SGD is tried. When
//! both fail the caller gets [`ModelError::Exhausted`] and ranks without a
//! model.

pub mod network;
pub mod optimizer;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use network::{Activation, LayerSpec, Network};
pub use optimizer::{Optimizer, OptimizerKind};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("invalid network architecture: {0}")]
    InvalidArchitecture(String),
    #[error("cannot train on an empty dataset")]
    EmptyTrainingSet,
    #[error("{features} feature rows but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },
    #[error("feature row {row} has {found} values, expected {expected}")]
    DimensionMismatch { row: usize, expected: usize, found: usize },
    #[error("training diverged at epoch {epoch}")]
    Diverged { epoch: usize },
    #[error("no architecture could be trained: {}", attempts.join("; "))]
    Exhausted { attempts: Vec<String> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Primary,
    Fallback,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Architecture {
    pub kind: ModelKind,
    pub layers: Vec<LayerSpec>,
    pub optimizer: OptimizerKind,
}

impl Architecture {
    /// dense(32, relu, L2) -> dropout -> dense(16, relu, L2) -> dropout ->
    /// dense(8, relu) -> dense(1, sigmoid), Adam.
    pub fn primary(config: &TrainingConfig) -> Self {
        Self {
            kind: ModelKind::Primary,
            layers: vec![
                LayerSpec::dense(32, Activation::Relu)
                    .with_l2(config.l2)
                    .with_dropout(config.dropout),
                LayerSpec::dense(16, Activation::Relu)
                    .with_l2(config.l2)
                    .with_dropout(config.dropout),
                LayerSpec::dense(8, Activation::Relu),
                LayerSpec::dense(1, Activation::Sigmoid),
            ],
            optimizer: OptimizerKind::Adam { learning_rate: config.learning_rate },
        }
    }

    /// dense(8, relu) -> dense(4, relu) -> dense(1, sigmoid), plain SGD, no
    /// regularization.
    pub fn fallback(config: &TrainingConfig) -> Self {
        Self {
            kind: ModelKind::Fallback,
            layers: vec![
                LayerSpec::dense(8, Activation::Relu),
                LayerSpec::dense(4, Activation::Relu),
                LayerSpec::dense(1, Activation::Sigmoid),
            ],
            optimizer: OptimizerKind::Sgd { learning_rate: config.fallback_learning_rate },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Batch size is `min(batch_size_cap, sample count)`.
    pub batch_size_cap: usize,
    /// Fraction of samples (taken from the end) held out for validation.
    pub validation_split: f64,
    pub learning_rate: f64,
    pub fallback_learning_rate: f64,
    pub l2: f64,
    pub dropout: f64,
    pub seed: u64,
}

impl TrainingConfig {
    pub const DEFAULT_EPOCHS: usize = 50;
    pub const DEFAULT_BATCH_SIZE_CAP: usize = 8;
    pub const DEFAULT_VALIDATION_SPLIT: f64 = 0.2;
    pub const DEFAULT_LEARNING_RATE: f64 = 0.001;
    pub const DEFAULT_FALLBACK_LEARNING_RATE: f64 = 0.01;
    pub const DEFAULT_L2: f64 = 0.001;
    pub const DEFAULT_DROPOUT: f64 = 0.2;
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: Self::DEFAULT_EPOCHS,
            batch_size_cap: Self::DEFAULT_BATCH_SIZE_CAP,
            validation_split: Self::DEFAULT_VALIDATION_SPLIT,
            learning_rate: Self::DEFAULT_LEARNING_RATE,
            fallback_learning_rate: Self::DEFAULT_FALLBACK_LEARNING_RATE,
            l2: Self::DEFAULT_L2,
            dropout: Self::DEFAULT_DROPOUT,
            seed: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub final_loss: Option<f64>,
    pub validation_loss: Option<f64>,
}

/// A fitted network together with the metadata of the fit.
#[derive(Clone, Debug)]
pub struct ScoringModel {
    kind: ModelKind,
    network: Network,
    report: TrainingReport,
    trained_at: DateTime<Utc>,
}

impl ScoringModel {
    /// Trains the primary architecture, falling back to the smaller one.
    pub fn train(
        features: &[Vec<f64>],
        labels: &[f64],
        config: &TrainingConfig,
    ) -> Result<Self, ModelError> {
        let architectures = [Architecture::primary(config), Architecture::fallback(config)];
        Self::train_with(&architectures, features, labels, config)
    }

    /// Tries each architecture in order and returns the first successful fit.
    pub fn train_with(
        architectures: &[Architecture],
        features: &[Vec<f64>],
        labels: &[f64],
        config: &TrainingConfig,
    ) -> Result<Self, ModelError> {
        validate_training_set(features, labels)?;

        let mut attempts = Vec::with_capacity(architectures.len());
        for architecture in architectures {
            let mut rng = StdRng::seed_from_u64(config.seed);
            match Self::fit(architecture, features, labels, config, &mut rng) {
                Ok(model) => return Ok(model),
                Err(error) => {
                    tracing::warn!(
                        event_name = "engine.model.fit_failed",
                        architecture = architecture.kind.as_str(),
                        error = %error,
                        "scoring model fit failed"
                    );
                    attempts.push(format!("{}: {error}", architecture.kind.as_str()));
                }
            }
        }

        Err(ModelError::Exhausted { attempts })
    }

    fn fit(
        architecture: &Architecture,
        features: &[Vec<f64>],
        labels: &[f64],
        config: &TrainingConfig,
        rng: &mut StdRng,
    ) -> Result<Self, ModelError> {
        let input_dim = features.first().map_or(0, Vec::len);
        let mut network = Network::new(input_dim, &architecture.layers, rng)?;
        let mut optimizer = architecture.optimizer.build();

        let total = features.len();
        let split = config.validation_split.clamp(0.0, 1.0);
        let mut split_at = ((total as f64) * (1.0 - split)).floor() as usize;
        if split_at == 0 {
            // too few samples to hold any out
            split_at = total;
        }
        let mut train_indices: Vec<usize> = (0..split_at).collect();
        let validation_indices: Vec<usize> = (split_at..total).collect();
        let batch_size = config.batch_size_cap.min(total).max(1);

        let mut final_loss = None;
        let mut validation_loss = None;

        for epoch in 0..config.epochs {
            train_indices.shuffle(rng);

            let mut epoch_loss = 0.0;
            let mut batches = 0usize;
            for chunk in train_indices.chunks(batch_size) {
                let inputs: Vec<&[f64]> = chunk.iter().map(|i| features[*i].as_slice()).collect();
                let targets: Vec<f64> = chunk.iter().map(|i| labels[*i]).collect();
                epoch_loss += network.train_batch(&inputs, &targets, &mut optimizer, rng);
                batches += 1;
            }
            let epoch_loss = epoch_loss / batches.max(1) as f64;

            if !epoch_loss.is_finite() || !network.is_finite() {
                return Err(ModelError::Diverged { epoch });
            }

            final_loss = Some(epoch_loss);
            validation_loss = mean_loss(&network, features, labels, &validation_indices);

            if epoch % 10 == 0 {
                tracing::debug!(
                    event_name = "engine.model.epoch",
                    architecture = architecture.kind.as_str(),
                    epoch,
                    loss = epoch_loss,
                    val_loss = ?validation_loss,
                    "training progress"
                );
            }
        }

        tracing::info!(
            event_name = "engine.model.fitted",
            architecture = architecture.kind.as_str(),
            parameters = network.parameter_count(),
            learning_rate = architecture.optimizer.learning_rate(),
            epochs = config.epochs,
            loss = ?final_loss,
            "scoring model fitted"
        );

        Ok(Self {
            kind: architecture.kind,
            network,
            report: TrainingReport {
                epochs_run: config.epochs,
                training_samples: split_at,
                validation_samples: validation_indices.len(),
                final_loss,
                validation_loss,
            },
            trained_at: Utc::now(),
        })
    }

    /// Relevance score in `[0, 1]`. Deterministic for a fitted model.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let score = self.network.predict(features);
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// A model fit for zero epochs still has its random initial weights and
    /// must not be used for ranking.
    pub fn is_trained(&self) -> bool {
        self.report.epochs_run > 0
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }
}

fn validate_training_set(features: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ModelError::LabelCountMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }
    let expected = features[0].len();
    if let Some((row, found)) =
        features.iter().map(Vec::len).enumerate().find(|(_, len)| *len != expected)
    {
        return Err(ModelError::DimensionMismatch { row, expected, found });
    }
    Ok(())
}

fn mean_loss(network: &Network, features: &[Vec<f64>], labels: &[f64], indices: &[usize]) -> Option<f64> {
    if indices.is_empty() {
        return None;
    }
    let total: f64 = indices
        .iter()
        .map(|i| Network::binary_cross_entropy(network.predict(&features[*i]), labels[*i]))
        .sum();
    Some(total / indices.len() as f64)
}
