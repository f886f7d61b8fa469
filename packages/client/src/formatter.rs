//! Message formatting utilities for client display.

use chrono::{DateTime, Local};

use crate::codec::{Frame, RecipientId};
use crate::dispatcher::LifecycleEvent;
use crate::relay::RelayEnvelope;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format an inbound frame.
    ///
    /// # Arguments
    ///
    /// * `frame` - The decoded frame
    /// * `raw` - Show the frame as-is instead of interpreting the relay prefix
    /// * `received_at` - Local time the frame arrived
    ///
    /// # Returns
    ///
    /// A formatted string describing the frame
    pub fn format_frame(frame: &Frame, raw: bool, received_at: DateTime<Local>) -> String {
        let at = format_time(received_at);
        if raw {
            return format!(
                "\n[{}] to {}: {}\n",
                at,
                frame.recipient_id(),
                Self::format_payload(frame.payload())
            );
        }

        match RelayEnvelope::try_from(frame) {
            Ok(RelayEnvelope::PeerOpened { peer, .. }) => {
                format!("\n+ peer {} joined at {}\n", peer, at)
            }
            Ok(RelayEnvelope::Data { sender, frame }) => format!(
                "\n------------------------------------------------------------\n\
                 @{} -> {}: {}\n\
                 received at {}\n\
                 ------------------------------------------------------------\n",
                sender,
                frame.recipient_id(),
                Self::format_payload(frame.payload()),
                at
            ),
            Err(e) => {
                tracing::debug!("Frame is not relayed ({}), showing it raw", e);
                Self::format_frame(frame, true, received_at)
            }
        }
    }

    /// Render a payload as text when it is valid UTF-8, otherwise as a size.
    pub fn format_payload(payload: &[u8]) -> String {
        match std::str::from_utf8(payload) {
            Ok("") => "(empty)".to_string(),
            Ok(text) => text.to_string(),
            Err(_) => format!("[binary {} bytes]", payload.len()),
        }
    }

    pub fn format_lifecycle(event: &LifecycleEvent) -> String {
        match event {
            LifecycleEvent::Open => "\nConnected.\n".to_string(),
            LifecycleEvent::Close { code: Some(code), reason } if !reason.is_empty() => {
                format!("\nDisconnected ({}: {}).\n", code, reason)
            }
            LifecycleEvent::Close { code: Some(code), .. } => format!("\nDisconnected ({}).\n", code),
            LifecycleEvent::Close { code: None, .. } => "\nDisconnected.\n".to_string(),
            LifecycleEvent::Error(e) => format!("\nConnection error: {}\n", e),
        }
    }

    /// Format a confirmation message after sending
    pub fn format_sent_confirmation(recipient_id: RecipientId, sent_at: DateTime<Local>) -> String {
        format!("sent to {} at {}\n", recipient_id, format_time(sent_at))
    }
}

fn format_time(at: DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}
