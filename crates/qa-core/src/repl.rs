//! Interactive chat loop.
//!
//! Reads lines from stdin, sends them through the configured mode, and
//! streams the reply into the terminal. Errors never end the loop: the
//! user sees an apology line and the prompt comes back.

use std::io::{self, Write};

use qa_backend::ChatClient;
use qa_protocol::{Role, SessionContext};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::config::{ChatMode, Config};
use crate::render::{StreamPrinter, TraceRenderer};
use crate::style::Style;

/// What to do with one line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Quit,
    Clear,
    Send(&'a str),
}

fn classify(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
        Input::Quit
    } else if trimmed.eq_ignore_ascii_case("clear") {
        Input::Clear
    } else {
        Input::Send(trimmed)
    }
}

/// Session ids are client-generated, like the web client's.
pub fn fresh_session_id() -> String {
    format!("cli_{}", chrono::Utc::now().timestamp_millis())
}

pub async fn run_repl(config: &Config, mut session: SessionContext) -> io::Result<()> {
    let client = ChatClient::new();
    let style = Style::new();
    let mut out = io::stdout();

    let mode = match config.server.mode {
        ChatMode::Chat => "chat",
        ChatMode::Agent => "agent",
    };
    println!("qachat — {mode} mode, server {}", session.base_url);
    println!("type 'quit' to exit, 'clear' to start a new conversation");
    println!();

    show_history(&client, &session, &style).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}you:{} ", style.bold_start(), style.reset());
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match classify(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Clear => {
                session.session_id = fresh_session_id();
                println!("started a new conversation");
                continue;
            }
            Input::Send(content) => {
                print!("{}ai:{} ", style.bold_start(), style.reset());
                out.flush()?;

                let result = match config.server.mode {
                    ChatMode::Chat if config.server.stream => {
                        stream_chat(&client, &session, content, &mut out).await
                    }
                    ChatMode::Chat => send_chat(config, &client, &session, content, &style).await,
                    ChatMode::Agent => {
                        stream_agent(config, &client, &session, content, &mut out).await
                    }
                };

                if let Err(e) = result {
                    println!("sorry — something went wrong, please try again.");
                    eprintln!("[qachat] error: {e}");
                }
            }
        }
    }

    println!("bye");
    Ok(())
}

async fn stream_chat(
    client: &ChatClient,
    session: &SessionContext,
    content: &str,
    out: &mut io::Stdout,
) -> Result<(), qa_backend::BackendError> {
    let mut printer = StreamPrinter::new(Style::new());
    let _ = printer.show_indicator(out);

    let result = client
        .send_streaming(session, content, |buf| {
            let _ = printer.update(out, buf);
        })
        .await;

    let _ = printer.finish(out);
    result.map(|_| ())
}

async fn stream_agent(
    config: &Config,
    client: &ChatClient,
    session: &SessionContext,
    content: &str,
    out: &mut io::Stdout,
) -> Result<(), qa_backend::BackendError> {
    let mut renderer = TraceRenderer::new(
        Style::new(),
        StreamPrinter::new(Style::new()),
        config.ui.show_thinking,
    );
    let _ = renderer.show_indicator(out);

    let result = client
        .send_agent_streaming(session, content, |events, answer| {
            let _ = renderer.update(out, events, answer);
        })
        .await;

    let _ = renderer.finish(out);
    result.map(|_| ())
}

async fn send_chat(
    config: &Config,
    client: &ChatClient,
    session: &SessionContext,
    content: &str,
    style: &Style,
) -> Result<(), qa_backend::BackendError> {
    let reply = client.send(session, content).await?;
    if config.ui.timestamps {
        println!(
            "{}[{}]{} {}",
            style.dim_start(),
            reply.timestamp.format("%H:%M:%S"),
            style.reset(),
            reply.content
        );
    } else {
        println!("{}", reply.content);
    }
    Ok(())
}

/// Print existing history for a resumed conversation, dimmed.
async fn show_history(client: &ChatClient, session: &SessionContext, style: &Style) {
    match client.history(session).await {
        Ok(resp) if !resp.messages.is_empty() => {
            for msg in &resp.messages {
                let who = match msg.role {
                    Role::User => "you",
                    Role::Assistant => "ai",
                };
                println!(
                    "{}{}: {}{}",
                    style.dim_start(),
                    who,
                    msg.content,
                    style.reset()
                );
            }
            println!();
        }
        Ok(_) => {}
        // Fresh sessions have no server-side history; nothing to show.
        Err(e) => debug!(error = %e, "no history available"),
    }
}
