//! Entry point for the accessibility worker process.
//!
//! Standard input and standard output carry the frame protocol, so all
//! diagnostics go to standard error. The process exits with status 0 once the
//! host stops after the controller closes its input or a shutdown signal
//! arrives, and with status 1 on startup errors or channel faults.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stderr = io::stderr().lock();
    axhost_worker::run(std::env::args_os(), &mut stderr)
}
