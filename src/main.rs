//! groundtruth CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use groundtruth::cli::args::*;
use groundtruth::cli::commands::*;
use groundtruth::cli::output::format_error;

fn main() {
    let args = GroundTruthArgs::parse();

    let log_level = match args.verbosity() {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    Builder::new()
        .filter_level(log_level)
        .parse_env("GROUNDTRUTH_LOG")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    let format = args.output_format;
    if let Err(e) = execute_command(args) {
        eprintln!("{}", format_error(&e, format));
        process::exit(1);
    }
}
