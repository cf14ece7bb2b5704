//! Time-ordered child keys for `push`.
//!
//! A key is 8 characters of millisecond timestamp followed by 12 random
//! characters, both drawn from an alphabet whose byte order matches its
//! digit order. Keys generated within the same millisecond increment the
//! random tail, so lexical order always equals generation order.

use std::sync::Mutex;

use rand::Rng;

const ALPHABET: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

pub struct PushIdGenerator {
    last: Mutex<(i64, [u8; RANDOM_CHARS])>,
}

impl PushIdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self { last: Mutex::new((i64::MIN, [0; RANDOM_CHARS])) }
    }

    /// Generate the next key for the given timestamp (ms since epoch).
    pub fn next_at(&self, now_ms: i64) -> String {
        let mut last = self
            .last
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Clocks can step backwards; never let keys do the same.
        let ts = now_ms.max(last.0);
        if ts == last.0 {
            increment(&mut last.1);
        } else {
            let mut rng = rand::rng();
            for digit in &mut last.1 {
                *digit = rng.random_range(0..64);
            }
        }
        last.0 = ts;

        let mut key = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        let mut time_digits = [0u8; TIME_CHARS];
        let mut remaining = u64::try_from(ts).unwrap_or(0);
        for slot in time_digits.iter_mut().rev() {
            // Masked to 6 bits, so the cast cannot truncate.
            #[allow(clippy::cast_possible_truncation)]
            let digit = (remaining % 64) as u8;
            *slot = digit;
            remaining /= 64;
        }
        for digit in time_digits.iter().chain(last.1.iter()) {
            key.push(char::from(ALPHABET[usize::from(*digit)]));
        }
        key
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn increment(digits: &mut [u8; RANDOM_CHARS]) {
    for digit in digits.iter_mut().rev() {
        if *digit < 63 {
            *digit += 1;
            return;
        }
        *digit = 0;
    }
}
