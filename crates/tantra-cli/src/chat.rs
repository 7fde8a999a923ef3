//! Interactive chat loop

use std::io::Write;

use colored::Colorize;
use tantra_core::{ConnectionStatus, Message, Role};
use tantra_realtime::SendOutcome;
use tantra_store::AppStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::app::App;

pub async fn run(app: &App, session: Option<String>, new: bool) -> anyhow::Result<()> {
    app.require(&app.guard(), "/chat")?;

    let store = &app.store;
    match session {
        Some(id) => {
            if !store.load_session(&id) {
                anyhow::bail!("Unknown session: {}", id);
            }
        }
        None if new || store.current_session_id().is_none() => {
            store.create_new_session();
        }
        None => {}
    }
    let session_id = store.current_session_id().unwrap_or_default();
    let span = tantra_observability::create_session_span(Some(&session_id));

    let user = app.auth.user().map(|u| u.username).unwrap_or_default();
    println!("{}", "🤖 Tantra Interactive Chat".cyan().bold());
    println!("{}", format!("Signed in as {}", user).dimmed());
    println!("{}", format!("Session ID: {}", session_id).dimmed());
    println!(
        "{}",
        "Type 'exit' or 'quit' to leave, '/help' for commands".dimmed()
    );
    println!();

    for message in store.messages() {
        print_message(&message);
    }

    let notifications = app.print_notifications();
    let printer = print_replies(store.clone());
    let session_watch = app.auth.watch_session();

    let channel = app.channel();
    if app.config.realtime.enabled {
        channel.connect();
    }
    channel.load_initial_state().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("{}", "👋 Goodbye!".cyan());
            break;
        }
        if input.is_empty() {
            continue;
        }
        if !app.auth.is_authenticated() {
            println!("{}", "Session expired. Run `tantra login` again.".red());
            break;
        }

        if let Some(command) = input.strip_prefix('/') {
            slash_command(app, command);
            continue;
        }

        match channel.send(input).instrument(span.clone()).await {
            SendOutcome::Pushed => tracing::debug!("Message pushed over realtime channel"),
            SendOutcome::Answered(_) => {}
            SendOutcome::Failed(reason) => tracing::debug!("Send failed: {}", reason),
        }
    }

    channel.disconnect();
    channel.wait().await;
    store.save_current_session();
    app.persist().await;

    printer.abort();
    notifications.abort();
    session_watch.abort();
    Ok(())
}

fn slash_command(app: &App, command: &str) {
    let store = &app.store;
    match command {
        "help" => {
            println!("{}", "/new       start a new session".dimmed());
            println!("{}", "/clear     clear messages in this session".dimmed());
            println!("{}", "/status    show connection state".dimmed());
            println!("{}", "/errors    show unresolved errors".dimmed());
        }
        "new" => {
            store.save_current_session();
            let id = store.create_new_session();
            println!("{}", format!("Session ID: {}", id).dimmed());
        }
        "clear" => store.clear_messages(),
        "status" => {
            let status = store.connection_status();
            let line = format!("Connection: {:?}", status);
            match status {
                ConnectionStatus::Connected => println!("{}", line.green()),
                ConnectionStatus::Connecting => println!("{}", line.yellow()),
                ConnectionStatus::Disconnected => println!("{}", line.red()),
            }
        }
        "errors" => {
            let unresolved = store.snapshot().unresolved_errors();
            println!("{}", format!("{} unresolved error(s)", unresolved).yellow());
        }
        other => println!("{}", format!("Unknown command: /{}", other).red()),
    }
}

pub fn print_message(message: &Message) {
    match message.role {
        Role::User => println!("{} {}", "You:".cyan().bold(), message.content),
        Role::Assistant => println!("{} {}", "Assistant:".green().bold(), message.content),
        Role::System => println!("{}", message.content.dimmed()),
    }
}

/// Print assistant and system messages as they land in the store
fn print_replies(store: AppStore) -> JoinHandle<()> {
    let mut revisions = store.subscribe();
    let mut seen = store.messages().len();
    let mut typing = store.is_typing();

    tokio::spawn(async move {
        while revisions.changed().await.is_ok() {
            let messages = store.messages();
            if messages.len() < seen {
                seen = messages.len();
            }
            for message in &messages[seen..] {
                if message.role != Role::User {
                    println!();
                    print_message(message);
                }
            }
            seen = messages.len();

            let now_typing = store.is_typing();
            if now_typing && !typing {
                println!("{}", "Assistant is typing...".dimmed());
            }
            typing = now_typing;
        }
    })
}
