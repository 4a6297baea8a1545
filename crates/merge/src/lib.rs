//! Merge job dispatch.
//!
//! Turns a confirmed queue snapshot into files on disk, hands them to a merge
//! engine in submission order and reports the outcome back to the queue
//! manager. The engine and the reference resolver are collaborators behind
//! traits; [`FfmpegEngine`] is the stock engine.

pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod resolve;

pub use {
    dispatcher::{DispatchReport, Dispatcher},
    engine::{EngineError, MergeEngine, MergeStrategy, TargetSpec},
    error::{Error, Result},
    ffmpeg::FfmpegEngine,
    resolve::ReferenceResolver,
};
