//! Mode S downlink demodulator
//!
//! Turns a 2 Msps stream of unsigned 8-bit I/Q baseband samples from a
//! 1090 MHz receiver into CRC-validated Mode S frames: magnitude lookup,
//! preamble detection, pulse-position bit slicing, parity checking with
//! single-bit repair, and confidence-based filtering of address/parity
//! downlinks whose recovered ICAO address would otherwise be
//! indistinguishable from CRC noise.
//!
//! ```no_run
//! use squitter::{Config, Demodulator, IqSample};
//!
//! let mut demod = Demodulator::new(Config::default(), |frame| {
//!     println!("{}", frame);
//! });
//! let samples = [IqSample::new(127, 127); 512];
//! demod.process(&samples).unwrap();
//! ```

pub mod config;
pub mod crc;
pub mod demodulator;
pub mod error;
pub mod frame;
pub mod icao;
pub mod magnitude;

pub use config::Config;
pub use demodulator::{Demodulator, FrameSink};
pub use error::DemodError;
pub use frame::{AddressClass, DownlinkFormat, Frame};
pub use icao::{ConfidenceLevel, IcaoFilter};
pub use magnitude::{IqSample, MagnitudeLut};
