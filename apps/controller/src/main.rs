use led_controller::app::run;

use std::process::ExitCode;

use log::error;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("LED controller failed: {e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
