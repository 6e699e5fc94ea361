//! Mode S signal demodulation
//!
//! Detects Mode S preambles in the magnitude stream, slices the
//! pulse-position-modulated bits that follow, and routes CRC-validated
//! frames through the ICAO trust filter to the consumer callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, tick, Receiver, Sender, TryRecvError};
use tracing::{error, info};

use crate::config::Config;
use crate::error::DemodError;
use crate::frame::{self, AddressClass, DownlinkFormat, Frame, LONG_FRAME_BITS, LONG_FRAME_BYTES};
use crate::icao::IcaoFilter;
use crate::magnitude::{IqSample, MagnitudeLut};

/// Preamble duration in samples at 2 Msps (8 us, four pulses).
const PREAMBLE_SAMPLES: usize = 16;
/// Ring capacity: one preamble plus two samples per long-frame bit.
const RING_LEN: usize = PREAMBLE_SAMPLES + 2 * LONG_FRAME_BITS;
/// Worker nap when the producer queue is empty.
const IDLE_SLEEP: Duration = Duration::from_millis(100);
/// Period of the trust-filter eviction sweep.
const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Fixed ring of the most recent magnitude samples. After every push the
/// cursor points at the oldest sample, which is where a candidate preamble
/// would begin.
struct SampleRing {
    buf: [u16; RING_LEN],
    cursor: usize,
}

impl SampleRing {
    fn new() -> Self {
        Self {
            buf: [0; RING_LEN],
            cursor: 0,
        }
    }

    #[inline]
    fn push(&mut self, mag: u16) {
        self.buf[self.cursor] = mag;
        self.cursor = (self.cursor + 1) % RING_LEN;
    }

    /// Sample at `offset` from the start of the candidate window.
    #[inline]
    fn at(&self, offset: usize) -> u16 {
        self.buf[(self.cursor + offset) % RING_LEN]
    }

    /// Check the candidate window against the preamble: pulses at sample
    /// offsets 0, 2, 7 and 9, quiet elsewhere. Offset 10 is left
    /// unconstrained; it straddles the pulse decay.
    fn preamble_match(&self) -> bool {
        let m = |k: usize| u32::from(self.at(k));

        // Pulse shape, strict comparisons on raw magnitudes.
        if !(m(0) > m(1)
            && m(1) < m(2)
            && m(2) > m(3)
            && m(3) < m(0)
            && m(4) < m(0)
            && m(5) < m(0)
            && m(6) < m(0)
            && m(7) > m(8)
            && m(8) < m(9)
            && m(9) > m(6))
        {
            return false;
        }

        // Average of the four pulse peaks. The divisor is 6, not 4: the
        // off samples only have to clear two thirds of the peak level.
        let high = (m(0) + m(2) + m(7) + m(9)) / 6;

        if m(4) >= high || m(5) >= high {
            return false;
        }

        // The 2 us gap before the first data chip must stay quiet.
        if m(11) >= high || m(12) >= high || m(13) >= high || m(14) >= high {
            return false;
        }

        true
    }

    /// Slice the two-samples-per-bit PPM payload that follows the
    /// preamble: early pulse = 1, late pulse = 0.
    ///
    /// Bails out once the first byte shows an empty or unknown downlink
    /// format, and at completion when the parity tail is identically zero.
    /// Downward magnitude drift between adjacent bit cells is compensated
    /// by nudging the second half-chip up before comparing.
    fn slice_frame(&self) -> Option<([u8; LONG_FRAME_BYTES], usize)> {
        let mut frame = [0u8; LONG_FRAME_BYTES];
        let mut target_bits = LONG_FRAME_BITS;
        let mut prev_avg = 0.0f64;

        let mut bit = 0;
        while bit < target_bits {
            let s0 = f64::from(self.at(PREAMBLE_SAMPLES + 2 * bit));
            let mut s1 = f64::from(self.at(PREAMBLE_SAMPLES + 2 * bit + 1));

            let mut avg = (s1 + s0) * 0.5;
            if prev_avg > 0.0 {
                let correction = -20.0 * (avg - prev_avg) / avg;
                if correction > 0.0 {
                    s1 += correction;
                    avg = (s1 + s0) * 0.5;
                }
            }
            prev_avg = avg;

            if s0 > s1 {
                frame[bit / 8] |= 1u8 << (7 - bit % 8);
            }

            if bit == 7 {
                if frame[0] == 0 {
                    return None;
                }
                target_bits = DownlinkFormat::from_frame_byte(frame[0])?.bit_length();
            }
            bit += 1;
        }

        // A real reply never carries all-zero parity.
        let len = target_bits / 8;
        if frame[len - 3] == 0 && frame[len - 2] == 0 && frame[len - 1] == 0 {
            return None;
        }

        Some((frame, len))
    }
}

/// Consumer callback for validated frames.
pub type FrameSink = Box<dyn FnMut(Frame) + Send>;

/// Everything the sample path touches. Owned by the caller in synchronous
/// mode, moved into the worker thread in asynchronous mode.
struct Pipeline {
    lut: MagnitudeLut,
    ring: SampleRing,
    filter: Arc<IcaoFilter>,
    sink: FrameSink,
}

impl Pipeline {
    fn push_sample(&mut self, sample: IqSample) {
        self.ring.push(self.lut.lookup(sample));

        if !self.ring.preamble_match() {
            return;
        }
        let Some((bytes, len)) = self.ring.slice_frame() else {
            return;
        };
        let Some((frame, class)) = frame::classify(&bytes[..len]) else {
            return;
        };

        let now = Instant::now();
        let emit = match class {
            AddressClass::ParityInterrogator => self.filter.note_interrogator(frame.icao(), now),
            AddressClass::AddressParity => self.filter.note_address(frame.icao(), now),
        };
        if emit {
            (self.sink)(frame);
        }
    }
}

/// Mode S demodulator.
///
/// Construct with a frame callback, then either feed sample slices inline
/// with [`Demodulator::process`], or hand the pipeline to a dedicated
/// worker with [`Demodulator::start`] / [`Demodulator::stop`]. Only one
/// worker may run per demodulator, and inline processing is unavailable
/// while it does.
pub struct Demodulator {
    pipeline: Option<Pipeline>,
    filter: Arc<IcaoFilter>,
    worker: Option<JoinHandle<Pipeline>>,
    sweeper: Option<JoinHandle<()>>,
    sweep_stop: Option<Sender<()>>,
    running: Arc<AtomicBool>,
}

impl Demodulator {
    pub fn new<F>(config: Config, sink: F) -> Self
    where
        F: FnMut(Frame) + Send + 'static,
    {
        let filter = Arc::new(IcaoFilter::new(config.confidence, config.icao_timeout));
        Self {
            pipeline: Some(Pipeline {
                lut: MagnitudeLut::new(),
                ring: SampleRing::new(),
                filter: Arc::clone(&filter),
                sink: Box::new(sink),
            }),
            filter,
            worker: None,
            sweeper: None,
            sweep_stop: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The trust filter shared with the worker and the sweep timer.
    pub fn filter(&self) -> &IcaoFilter {
        &self.filter
    }

    /// Demodulate a bounded slice of samples inline on the caller's
    /// thread.
    pub fn process(&mut self, samples: &[IqSample]) -> Result<(), DemodError> {
        let pipeline = self.pipeline.as_mut().ok_or(DemodError::PipelineBusy)?;
        for &sample in samples {
            pipeline.push_sample(sample);
        }
        Ok(())
    }

    /// Start the worker thread draining `samples`, plus the eviction sweep
    /// timer. Frames are delivered on the worker thread; the callback must
    /// not block for long.
    pub fn start(&mut self, samples: Receiver<IqSample>) -> Result<(), DemodError> {
        if self.worker.is_some() {
            return Err(DemodError::WorkerRunning);
        }
        let mut pipeline = self.pipeline.take().ok_or(DemodError::WorkerRunning)?;

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        self.worker = Some(thread::spawn(move || {
            info!("demodulator worker started");
            while running.load(Ordering::Acquire) {
                match samples.try_recv() {
                    Ok(sample) => pipeline.push_sample(sample),
                    // A missing producer looks the same as an idle one;
                    // only stop() ends the loop.
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {
                        thread::sleep(IDLE_SLEEP);
                    }
                }
            }
            info!("demodulator worker stopped");
            pipeline
        }));

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let filter = Arc::clone(&self.filter);
        self.sweeper = Some(thread::spawn(move || {
            let ticker = tick(SWEEP_INTERVAL);
            loop {
                select! {
                    recv(ticker) -> _ => filter.sweep(Instant::now()),
                    recv(stop_rx) -> _ => break,
                }
            }
        }));
        self.sweep_stop = Some(stop_tx);

        Ok(())
    }

    /// Signal the worker to exit at its next iteration check and reclaim
    /// the pipeline for inline use. Pending queue entries are not drained.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            match worker.join() {
                Ok(pipeline) => self.pipeline = Some(pipeline),
                Err(_) => error!("demodulator worker panicked"),
            }
        }
        // Dropping the sender wakes the sweeper out of its select.
        self.sweep_stop.take();
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.join();
        }
    }
}

impl Drop for Demodulator {
    fn drop(&mut self) {
        self.stop();
    }
}
