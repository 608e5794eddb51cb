pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod domain_utils;
pub mod fusion;
pub mod heuristics;
pub mod message;
pub mod reputation;
pub mod server;

pub use analyzer::{AnalysisResult, Analyzer};
pub use classifier::{ClassifierAdapter, LinearTextModel, TextClassifier};
pub use config::Config;
pub use fusion::{FusionEngine, Verdict};
pub use heuristics::EvaluationResult;
pub use message::ParsedMessage;
pub use reputation::{ReputationAdapter, ReputationEntry, ReputationLookup};
