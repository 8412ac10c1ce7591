//! Services that keep I/O and progress reporting out of the pixel pipeline

pub mod io;
pub mod progress;

pub use io::{ImageIOService, ALLOWED_EXTENSIONS};
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
