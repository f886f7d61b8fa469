//! UI utilities for the client.

use std::io::Write;

/// Prompt shown by the line editor.
pub fn prompt(user_id: i32) -> String {
    format!("{}> ", user_id)
}

/// Redisplay the prompt after printing an inbound message
pub fn redisplay_prompt(user_id: i32) {
    print!("{}", prompt(user_id));
    std::io::stdout().flush().ok();
}
