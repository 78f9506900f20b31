//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

/// Moving-sum smoothing filter over the last `N` samples
///
/// The first sample seeds the whole window, so the very first output is
/// already fully weighted.
#[derive(Debug, Clone)]
pub struct MovingSumFilter<const N: usize> {
    /// Sample window, `next` points at the oldest entry
    buff: [i32; N],
    next: usize,
    sum: i64,
    initialized: bool,
}

impl<const N: usize> Default for MovingSumFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MovingSumFilter<N> {
    /// Creates an empty filter
    pub const fn new() -> Self {
        assert!(N > 0, "filter window must not be empty");
        MovingSumFilter {
            buff: [0; N],
            next: 0,
            sum: 0,
            initialized: false,
        }
    }

    /// Adds a sample and returns the filtered value
    pub fn add(&mut self, val: i32) -> i32 {
        if !self.initialized {
            self.buff = [val; N];
            self.sum = N as i64 * val as i64;
            self.next = 0;
            self.initialized = true;
            return val;
        }

        self.sum -= self.buff[self.next] as i64;
        self.buff[self.next] = val;
        self.sum += val as i64;
        self.next = (self.next + 1) % N;

        (self.sum / N as i64) as i32
    }

    /// Current filtered value, `None` before the first sample
    pub fn value(&self) -> Option<i32> {
        self.initialized.then(|| (self.sum / N as i64) as i32)
    }

    /// Forgets all samples
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
