mod args;
mod build;

use clap::Parser;
use log::{error, info, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;
use crate::build::{error_chain, run_build};

fn main() {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();
    info!("args: {:?}", args);

    match run_build(&args.build_options()) {
        Ok(summary) => {
            info!("summary: {:?}", summary);
        }
        Err(e) => {
            error!("Build failed: {}", error_chain(&e));
            eprintln!("An error occured {}", error_chain(&e));
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(1);
        }
    }
}
