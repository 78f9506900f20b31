use tracing::debug;

use super::pulse::{BitValue, Pulse};
use super::FRAME_SLOTS;
use crate::core::US_PER_SEC;
use crate::time::util::diff_us;

/// One received second of a minute frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BitSlot {
    /// Received value
    pub value: BitValue,
    /// Length of the pulse that produced the value (us)
    pub len_us: u32,
}

/// Positional buffer for the bits of one minute
#[derive(Debug, Clone)]
pub struct BitSlots {
    slots: [BitSlot; FRAME_SLOTS],
}

impl Default for BitSlots {
    fn default() -> Self {
        BitSlots {
            slots: [BitSlot::default(); FRAME_SLOTS],
        }
    }
}

impl BitSlots {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a buffer from plain values, as produced by the telegram encoder
    pub fn from_values(values: &[BitValue; FRAME_SLOTS]) -> Self {
        let mut slots = Self::new();
        for (slot, value) in slots.slots.iter_mut().zip(values) {
            slot.value = *value;
        }
        slots
    }

    /// Marks every slot undefined
    pub fn clear(&mut self) {
        self.slots = [BitSlot::default(); FRAME_SLOTS];
    }

    /// Second index of a bit that started `elapsed_us` after the sync, rounded to the nearest second
    pub fn slot_index(elapsed_us: u32) -> usize {
        let mut idx = elapsed_us / US_PER_SEC;
        if elapsed_us % US_PER_SEC > US_PER_SEC / 2 {
            idx += 1;
        }
        idx as usize
    }

    /// Stores a classified pulse relative to the sync time
    ///
    /// Returns the slot index, or `None` if the pulse falls outside the frame
    /// or lost against a shorter pulse already in the slot.
    pub fn store(&mut self, pulse: &Pulse, sync_us: u32) -> Option<usize> {
        let elapsed = diff_us(pulse.start_us, sync_us);
        let idx = Self::slot_index(elapsed);

        debug!(
            elapsed_ms = elapsed / 1000,
            idx,
            len_ms = pulse.len_us / 1000,
            value = ?pulse.value,
            "bit received"
        );

        let slot = self.slots.get_mut(idx)?;
        // Shorter pulses are closer to the nominal width
        if slot.value.is_defined() && pulse.len_us >= slot.len_us {
            return None;
        }

        *slot = BitSlot {
            value: pulse.value,
            len_us: pulse.len_us,
        };
        Some(idx)
    }

    /// Value at `idx`, undefined when out of range
    pub fn value(&self, idx: usize) -> BitValue {
        self.slots.get(idx).map_or(BitValue::Undefined, |slot| slot.value)
    }

    /// Slot at `idx`
    pub fn get(&self, idx: usize) -> Option<&BitSlot> {
        self.slots.get(idx)
    }

    /// Overwrites the value of one slot
    pub fn set_value(&mut self, idx: usize, value: BitValue) -> bool {
        match self.slots.get_mut(idx) {
            Some(slot) => {
                slot.value = value;
                true
            }
            None => false,
        }
    }

    /// Number of defined slots
    pub fn defined_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_defined()).count()
    }
}
