//! Lock-free SPSC ring buffer for raw capture samples.
//!
//! Uses `ringbuf::HeapRb<i16>` whose wait-free `push_slice` is safe to
//! call from the real-time audio callback. The consumer half sits
//! behind the blocking [`crate::audio::AudioSource::read`] implementation
//! on the worker thread.

pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Type alias for the producer half — held by the audio callback thread.
pub type CaptureProducer = ringbuf::HeapProd<i16>;

/// Type alias for the consumer half — held by the worker thread.
pub type CaptureConsumer = ringbuf::HeapCons<i16>;

/// Transport capacity: 2^18 = 262 144 i16 samples ≈ 16 s at 16 kHz.
/// Far more than one inference pass can stall; the analysis ring only
/// ever needs the most recent second.
pub const CAPTURE_RING_CAPACITY: usize = 1 << 18;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
pub fn create_capture_ring() -> (CaptureProducer, CaptureConsumer) {
    HeapRb::<i16>::new(CAPTURE_RING_CAPACITY).split()
}
