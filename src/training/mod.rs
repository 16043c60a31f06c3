//! Offline training: labeled warehouse exports → candidate model + validation report → registry.

mod cancel;
mod dataset;
mod pipeline;

pub use cancel::CancelToken;
pub use dataset::{build_examples, class_weights, time_split, to_dataset, Example, TimeSplit};
pub use pipeline::{PipelineOutcome, TrainingPipeline, TrainingRun};
