//! Error types for the orbit simulation and its renderers.

use std::path::PathBuf;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A command-line flag had a value that could not be parsed.
    #[error("invalid value '{value}' for {flag}")]
    InvalidFlag { flag: &'static str, value: String },

    /// An argument that is not a known flag.
    #[error("unexpected argument '{0}' (see --help)")]
    UnexpectedArgument(String),

    /// A flag was given without its value.
    #[error("missing value for {0}")]
    MissingValue(&'static str),

    /// A physical or numerical parameter is outside its supported domain.
    #[error("invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The initial radius lies on or inside the event horizon.
    #[error("initial radius r0 = {r0} is not outside the event horizon r = {horizon}")]
    InsideHorizon { r0: f64, horizon: f64 },

    /// vr0² + V_eff(r0, L) < 0, so no real energy exists.
    #[error("energy radicand is negative ({radicand}); no real conserved energy")]
    NegativeEnergyRadicand { radicand: f64 },

    /// The ODE solver stopped before reaching the end of the span.
    #[error("integration failed at tau = {tau}: {message}")]
    IntegrationFailed { tau: f64, message: String },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create window surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to read back rendered frame: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("failed to write {path}: {source}")]
    SaveImage {
        path: PathBuf,
        source: image::ImageError,
    },
}
