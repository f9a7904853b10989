//! Command line surface of the speed test.

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use crate::{buffers::SampleEncoding, sim::SimConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing value for --{0}")]
    Missing(&'static str),

    #[error("invalid {name}: {value} (must be positive and finite)")]
    Invalid { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// `None` keeps the device's current resolution.
    pub resolution: Option<u8>,
    /// `0` selects every channel of the device.
    pub active_channel_count: u16,
    pub sample_frequency: f64,
    pub record_length: u64,
    /// Requested run length in seconds.
    pub duration: f64,
    /// `0` opens the first device found.
    pub serial_number: u32,
    pub encoding: SampleEncoding,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: None,
            active_channel_count: 0,
            sample_frequency: 10e3,
            record_length: 5000,
            duration: 60.0,
            serial_number: 0,
            encoding: SampleEncoding::Scaled,
        }
    }
}

pub fn command() -> Command {
    Command::new("scope-stream-speed")
        .about("Measure sustained streaming throughput of an oscilloscope")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("resolution")
                .short('b')
                .long("resolution")
                .value_parser(value_parser!(u8))
                .help("Resolution in bits [default: device default]"),
        )
        .arg(
            Arg::new("channels")
                .short('c')
                .long("channels")
                .value_parser(value_parser!(u16))
                .default_value("0")
                .help("Active channel count, 0 for all channels"),
        )
        .arg(
            Arg::new("frequency")
                .short('f')
                .long("frequency")
                .value_parser(value_parser!(f64))
                .default_value("10000")
                .help("Sample frequency in Hz"),
        )
        .arg(
            Arg::new("record-length")
                .short('l')
                .long("record-length")
                .value_parser(value_parser!(u64).range(1..))
                .default_value("5000")
                .help("Record length in samples"),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_parser(value_parser!(f64))
                .default_value("60")
                .help("Duration in seconds"),
        )
        .arg(
            Arg::new("serial")
                .short('s')
                .long("serial")
                .value_parser(value_parser!(u32))
                .default_value("0")
                .help("Device serial number, 0 for the first device found"),
        )
        .arg(
            Arg::new("raw")
                .short('r')
                .long("raw")
                .action(ArgAction::SetTrue)
                .help("Fetch raw samples instead of floats"),
        )
        .arg(
            Arg::new("sim-channels")
                .long("sim-channels")
                .value_parser(value_parser!(u16).range(1..))
                .default_value("4")
                .help("Channel count of the simulated scope"),
        )
        .arg(
            Arg::new("sim-fifo")
                .long("sim-fifo")
                .value_parser(value_parser!(usize))
                .default_value("16")
                .help("Blocks the simulated scope buffers before overflowing"),
        )
        .arg(
            Arg::new("sim-serial")
                .long("sim-serial")
                .value_parser(value_parser!(u32))
                .default_value("29513")
                .help("Serial number reported by the simulated scope"),
        )
}

fn required<T: Clone + Send + Sync + 'static>(
    matches: &ArgMatches,
    id: &'static str,
) -> Result<T, Error> {
    matches.get_one::<T>(id).cloned().ok_or(Error::Missing(id))
}

fn positive(name: &'static str, value: f64) -> Result<f64, Error> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(Error::Invalid { name, value })
    }
}

impl StreamConfig {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, Error> {
        Ok(Self {
            resolution: matches
                .get_one::<u8>("resolution")
                .copied()
                .filter(|bits| *bits != 0),
            active_channel_count: required(matches, "channels")?,
            sample_frequency: positive("sample frequency", required(matches, "frequency")?)?,
            record_length: required(matches, "record-length")?,
            duration: positive("duration", required(matches, "duration")?)?,
            serial_number: required(matches, "serial")?,
            encoding: if matches.get_flag("raw") {
                SampleEncoding::Raw
            } else {
                SampleEncoding::Scaled
            },
        })
    }
}

impl SimConfig {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, Error> {
        Ok(Self {
            serial_number: required(matches, "sim-serial")?,
            channel_count: required(matches, "sim-channels")?,
            fifo_blocks: required(matches, "sim-fifo")?,
            ..Self::default()
        })
    }
}
