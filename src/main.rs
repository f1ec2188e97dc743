//! zettel - Folgezettel tree tool

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = zettel_forest::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
