//! Interactive session: join, relay stdin lines, print inbound frames.

use chrono::Local;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::dispatcher::LifecycleEvent;
use crate::error::{ClientError, TransportError};
use crate::formatter::MessageFormatter;
use crate::handshake::{HandshakeDescriptor, JoinRequest};
use crate::input::{InputCommand, parse_input};
use crate::ui::{prompt, redisplay_prompt};

/// Run one interactive session. There is no reconnection: once the
/// connection closes the session ends.
pub async fn run_client(
    config: ClientConfig,
    request: JoinRequest,
    raw: bool,
) -> Result<(), ClientError> {
    let user_id = request.user_id;
    let mut client = Client::new(config);

    client.on_frame(move |frame| {
        print!("{}", MessageFormatter::format_frame(frame, raw, Local::now()));
        redisplay_prompt(user_id);
    });
    client.on_lifecycle(|event| {
        if let LifecycleEvent::Error(e) = event {
            tracing::warn!("Transport error: {}", e);
        }
        print!("{}", MessageFormatter::format_lifecycle(event));
    });

    let descriptor = HandshakeDescriptor::from_serializable(&request)?;
    tracing::info!(
        "Joining room {} as user {} (stream '{}')",
        request.room_id,
        user_id,
        request.stream
    );
    client.join(&descriptor)?;
    client.wait_open().await?;

    println!(
        "\nYou are user {} in room {}. Lines are broadcast; '@<id> text' addresses one peer; /quit exits.\n",
        user_id, request.room_id
    );

    // rustyline blocks, so it gets its own thread
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();
    let _readline_handle = std::thread::spawn(move || readline_loop(user_id, input_tx));

    loop {
        tokio::select! {
            line = input_rx.recv() => {
                let Some(line) = line else {
                    break;
                };
                match parse_input(&line, user_id) {
                    Some(InputCommand::Send { recipient_id, text }) => {
                        if client.send(text, recipient_id) {
                            print!("{}", MessageFormatter::format_sent_confirmation(recipient_id, Local::now()));
                        }
                    }
                    Some(InputCommand::Quit) => break,
                    None => {}
                }
            }
            () = client.closed() => {
                tracing::info!("Server closed the connection");
                return Err(TransportError::Socket("connection lost".to_string()).into());
            }
        }
    }

    client.close();
    client.closed().await;
    tracing::info!("Session ended");
    Ok(())
}

fn readline_loop(user_id: i32, input_tx: mpsc::UnboundedSender<String>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            tracing::error!("Failed to initialize readline: {}", e);
            return;
        }
    };

    let prompt = prompt(user_id);
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str()).ok();
                }
                if input_tx.send(line).is_err() {
                    // Session is gone
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                tracing::info!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                tracing::info!("EOF");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {}", err);
                break;
            }
        }
    }
}
