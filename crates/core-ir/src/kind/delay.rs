//! Delay (z^-N) and TappedDelay nodes.

use core_types::NumericValue;

/// Buffer implementation selection for a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayBuffer {
    /// Pick automatically: circular buffer for N >= 2 (or N = 1 with vector
    /// input), shift register otherwise.
    Auto,
    ShiftRegister,
    CircularBuffer,
}

/// A Delay (z^-N) block.
///
/// The initial-condition sequence has length `delay * elements_per_sample`
/// after broadcast; index 0 is presented first.  `earliest_first` selects
/// which end of the buffer holds the newest sample: `false` stores new values
/// at the end, `true` at the start.
#[derive(Debug, Clone, PartialEq)]
pub struct Delay {
    pub delay: usize,
    pub init_conditions: Vec<NumericValue>,
    pub buffer: DelayBuffer,
    /// Round a circular buffer up to a power of two and wrap by bitmask.
    pub round_circular_to_pow2: bool,
    pub earliest_first: bool,
    /// Reserve one extra slot, adjacent to the newest sample, that also
    /// exposes the current input (used by TappedDelay and FIFO absorption).
    pub allocate_extra_space: bool,
}

impl Delay {
    pub fn new(delay: usize, init_conditions: Vec<NumericValue>) -> Delay {
        Delay {
            delay,
            init_conditions,
            buffer: DelayBuffer::Auto,
            round_circular_to_pow2: false,
            earliest_first: false,
            allocate_extra_space: false,
        }
    }

    /// Resolve `Auto` for an element count per sample.
    pub fn resolved_buffer(&self, elements_per_sample: usize) -> DelayBuffer {
        match self.buffer {
            DelayBuffer::Auto => {
                if self.delay >= 2 || (self.delay == 1 && elements_per_sample > 1) {
                    DelayBuffer::CircularBuffer
                } else {
                    DelayBuffer::ShiftRegister
                }
            }
            other => other,
        }
    }

    /// Allocated buffer length in samples (before the extra slot), honoring
    /// power-of-two rounding for circular buffers.
    pub fn buffer_len(&self, elements_per_sample: usize) -> usize {
        let logical = self.delay + usize::from(self.allocate_extra_space);
        match self.resolved_buffer(elements_per_sample) {
            DelayBuffer::CircularBuffer if self.round_circular_to_pow2 => {
                logical.next_power_of_two()
            }
            _ => logical,
        }
    }

    /// Broadcast a scalar initial condition across the whole buffer.
    pub fn broadcast_init(&mut self, elements_per_sample: usize) {
        let needed = self.delay * elements_per_sample;
        if self.init_conditions.len() == 1 && needed > 1 {
            let v = self.init_conditions[0];
            self.init_conditions = vec![v; needed];
        }
    }
}

/// A Delay that exposes its full buffer to the consumer, optionally also
/// exposing the current input sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TappedDelay {
    pub delay: Delay,
    /// Expose the current input as the extra slot.
    pub include_current: bool,
}

impl TappedDelay {
    pub fn new(delay: usize, init_conditions: Vec<NumericValue>, include_current: bool) -> TappedDelay {
        let mut d = Delay::new(delay, init_conditions);
        d.allocate_extra_space = include_current;
        TappedDelay { delay: d, include_current }
    }

    /// Number of samples visible to the consumer.
    pub fn exposed_len(&self) -> usize {
        self.delay.delay + usize::from(self.include_current)
    }
}
