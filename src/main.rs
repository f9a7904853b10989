use std::{error::Error, process::ExitCode};

use scope_stream_speed::{
    DeviceSession, RunReport, Termination, acquisition,
    config::{self, StreamConfig},
    plan::configure,
    progress::StatusProgress,
    sim::{SimConfig, SimulatedScope},
};

fn main() -> ExitCode {
    env_logger::init();

    let matches = match config::command().try_get_matches() {
        Ok(matches) => matches,
        Err(err) => {
            let _ = err.print();
            // help and version go to stdout and are not failures
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match speed_test(&matches) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn speed_test(matches: &clap::ArgMatches) -> Result<RunReport, Box<dyn Error>> {
    let config = StreamConfig::from_matches(matches)?;
    let sim = SimConfig::from_matches(matches)?;

    println!(
        "{} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut device = SimulatedScope::open(config.serial_number, sim)?;
    println!(
        "Device: {} (serial number {})",
        device.name(),
        device.serial_number()
    );

    let plan = configure(&mut device, &config)?;
    print!("{}", plan);
    println!("Start: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));

    let mut progress = StatusProgress::new(&plan);
    let report = acquisition::run(&mut device, &plan, &mut progress);
    progress.finish();

    match &report.termination {
        Termination::Completed => println!(
            "Fetched {:.02} MB in {:.02} s ({:.02} MB/s)",
            report.bytes_fetched as f64 / 1e6,
            report.elapsed.as_secs_f64(),
            report.throughput() / 1e6
        ),
        Termination::Failed(err) => eprintln!(
            "{} (after {}/{} blocks)",
            err, report.blocks_completed, report.block_count
        ),
    }

    Ok(report)
}
