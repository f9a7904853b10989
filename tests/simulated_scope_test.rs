//! End-to-end runs against the threaded simulated scope.

use scope_stream_speed::{
    Termination,
    acquisition::{self, Error},
    buffers::SampleEncoding,
    config::StreamConfig,
    plan::configure,
    progress::Progress,
    sim::{SimConfig, SimulatedScope},
};

// 5 ms blocks, 20 of them
fn fast_config(encoding: SampleEncoding) -> StreamConfig {
    StreamConfig {
        sample_frequency: 200e3,
        record_length: 1000,
        duration: 0.1,
        encoding,
        ..StreamConfig::default()
    }
}

fn roomy() -> SimConfig {
    SimConfig {
        fifo_blocks: 64,
        ..SimConfig::default()
    }
}

#[test]
fn scaled_run_completes() {
    let mut scope = SimulatedScope::open(0, roomy()).unwrap();
    let plan = configure(&mut scope, &fast_config(SampleEncoding::Scaled)).unwrap();

    let mut last = None;
    let report = acquisition::run(&mut scope, &plan, &mut |p: Progress| last = Some(p));

    assert!(report.is_success(), "{:?}", report.termination);
    assert_eq!(report.blocks_completed, plan.block_count);
    assert_eq!(scope.blocks_fetched(), plan.block_count);
    assert!(!scope.is_running());
    assert_eq!(last.map(|p| p.percent()), Some(100.0));
}

#[test]
fn raw_run_completes() {
    let mut scope = SimulatedScope::open(0, roomy()).unwrap();
    let config = StreamConfig {
        resolution: Some(14),
        active_channel_count: 2,
        ..fast_config(SampleEncoding::Raw)
    };
    let plan = configure(&mut scope, &config).unwrap();
    assert_eq!(plan.resolution, 14);

    let report = acquisition::run(&mut scope, &plan, &mut |_: Progress| {});

    assert!(report.is_success(), "{:?}", report.termination);
    assert_eq!(report.buffers_released, 2);
    assert_eq!(report.bytes_fetched, plan.block_count * 2 * 1000 * 2);
}

#[test]
fn removal_fails_the_run() {
    let sim = SimConfig {
        remove_after: Some(3),
        ..roomy()
    };
    let mut scope = SimulatedScope::open(0, sim).unwrap();
    let plan = configure(&mut scope, &fast_config(SampleEncoding::Scaled)).unwrap();

    let report = acquisition::run(&mut scope, &plan, &mut |_: Progress| {});

    assert!(matches!(
        report.termination,
        Termination::Failed(Error::DeviceRemoved)
    ));
    assert!(report.blocks_completed <= 3);
    assert!(!scope.is_running());
}

#[test]
fn fetch_error_fails_the_run() {
    let sim = SimConfig {
        fail_fetch_after: Some(5),
        ..roomy()
    };
    let mut scope = SimulatedScope::open(0, sim).unwrap();
    let plan = configure(&mut scope, &fast_config(SampleEncoding::Scaled)).unwrap();

    let report = acquisition::run(&mut scope, &plan, &mut |_: Progress| {});

    assert!(matches!(
        report.termination,
        Termination::Failed(Error::FetchFailure(_))
    ));
    assert_eq!(report.blocks_completed, 5);
    assert!(!scope.is_running());
}

#[test]
fn full_fifo_is_reported_as_overflow() {
    let sim = SimConfig {
        fifo_blocks: 0,
        ..SimConfig::default()
    };
    let mut scope = SimulatedScope::open(0, sim).unwrap();
    let plan = configure(&mut scope, &fast_config(SampleEncoding::Scaled)).unwrap();

    let report = acquisition::run(&mut scope, &plan, &mut |_: Progress| {});

    assert!(matches!(
        report.termination,
        Termination::Failed(Error::DataOverflow)
    ));
    assert_eq!(report.blocks_completed, 0);
    assert_eq!(report.buffers_released, 4);
}

#[test]
fn unknown_serial_is_not_opened() {
    assert!(SimulatedScope::open(42, SimConfig::default()).is_err());
}
