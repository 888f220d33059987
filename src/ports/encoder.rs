use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::process::Output;

/// Runs the external video encoder with a prepared argument list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EncoderExecutor: Send + Sync {
    /// Spawns the encoder, waits for it to exit, and returns its captured output.
    /// An `Err` means the process could not be launched at all.
    async fn run_encoder(&self, args: Vec<OsString>) -> io::Result<Output>;
}
