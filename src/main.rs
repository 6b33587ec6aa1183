// src/main.rs

use stagerun::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("stagerun: failed to initialise logging: {err:#}");
    }

    match run(args).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => {
            eprintln!("stagerun error: {err:#}");
            std::process::exit(1);
        }
    }
}
