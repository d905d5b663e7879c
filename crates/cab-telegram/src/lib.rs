//! Telegram adapter (teloxide).
//!
//! Thin I/O glue around the core dispatcher: command parsing, typing
//! indicator, and rendering of replies and typed failures. No governance
//! logic lives here.

pub mod handlers;
pub mod router;

/// Telegram's hard message length cap.
pub const MESSAGE_LIMIT: usize = 4096;

/// Split a reply into Telegram-sized chunks on char boundaries, preferring
/// line breaks when one is in reach.
pub fn split_for_telegram(text: &str) -> Vec<String> {
    if text.chars().count() <= MESSAGE_LIMIT {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if count + line_len > MESSAGE_LIMIT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }

        if line_len > MESSAGE_LIMIT {
            // A single oversized line: hard-split on the char boundary.
            for ch in line.chars() {
                if count == MESSAGE_LIMIT {
                    chunks.push(std::mem::take(&mut current));
                    count = 0;
                }
                current.push(ch);
                count += 1;
            }
        } else {
            current.push_str(line);
            count += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
