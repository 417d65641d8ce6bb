//! Welcome banner quotes shown above each conversation.

use crate::conversation::Message;

const AUTHOR: &str = "Dr. Ferdinand Porsche";

const QUOTES: &[&str] = &[
    "I couldn't find the sports car of my dreams, so I built it myself.",
    "Change is easy. Improvement is far more difficult.",
    "If one does not fail at times, then one has not challenged himself.",
    "In the beginning, I looked around and could not find quite the car I dreamed of, \
     so I decided to build it myself.",
];

/// Banner text for the quote at `index` (wraps around).
pub fn quote_text(index: usize) -> String {
    format!("“{}”\n— {}", QUOTES[index % QUOTES.len()], AUTHOR)
}

/// A randomly chosen quote as a `quote` message. Falls back to the first quote when the OS RNG
/// is unavailable.
pub fn random_quote() -> Message {
    let mut buf = [0u8; 8];
    let index = match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf) as usize,
        Err(e) => {
            log::debug!("getrandom failed, using first quote: {}", e);
            0
        }
    };
    Message::quote(quote_text(index))
}
