//! Line-oriented chat REPL backed by the session store.

use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::api::{ApiError, ChatCompletionRequest, ChatMessage, DEFAULT_MODEL};
use crate::cli::say::print_streamed_reply;
use crate::cli::sessions::find;
use crate::cli::{CliContext, TerminalHost};
use crate::core::error_handler::{ErrorHandler, HandleOptions};
use crate::core::routes::{Navigation, Route};
use crate::core::session::{ChatSession, SessionStore};

const QUIT_COMMANDS: [&str; 2] = ["/quit", "/exit"];

pub async fn run_chat(
    context: &CliContext,
    model: Option<String>,
    session_id: Option<String>,
) -> Result<(), Box<dyn Error>> {
    match context.route_guard().check(Route::Chat) {
        Navigation::Redirect(route) => {
            debug!(%route, "Chat is not available yet");
            return Err(Box::new(ApiError::unconfigured()));
        }
        Navigation::Proceed { title } => println!("💬 {title}"),
    }

    let client = context.client()?;
    let store = context.sessions()?;
    let _listener = store.subscribe(|event| debug!(?event, "Session store changed"));

    let mut session = match session_id {
        Some(id) => Some(resume(&store, &id, model.as_deref())?),
        None => None,
    };
    let model = model
        .or_else(|| session.as_ref().map(|s| s.model.clone()))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    println!("Model: {model}. Type /quit to leave, Ctrl+C cancels a reply.");
    println!();

    let errors = ErrorHandler::new(Arc::new(TerminalHost));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if QUIT_COMMANDS.contains(&input) {
            break;
        }

        let history = session.as_ref().map(|s| s.messages.as_slice()).unwrap_or(&[]);
        let request = ChatCompletionRequest::new(model.clone(), with_user_message(history, input));

        match print_streamed_reply(&client, &request, &mut io::stdout()).await {
            Ok(reply) => {
                let id = match &session {
                    Some(existing) => existing.id.clone(),
                    None => store.create_session(&model)?.id,
                };
                store.append_message(&id, ChatMessage::user(input))?;
                if !reply.text.is_empty() {
                    store.append_message(&id, ChatMessage::assistant(reply.text))?;
                }
                if reply.cancelled {
                    eprintln!("⏹️  Cancelled");
                }
                session = store.session(&id);
            }
            Err(err) => {
                errors.handle(
                    err.as_ref(),
                    HandleOptions {
                        redirect_on_auth: true,
                        ..HandleOptions::default()
                    },
                );
            }
        }
    }

    if let Some(session) = session {
        println!("💾 Saved as session {}", session.id);
    }
    Ok(())
}

/// Load a saved session, switching its model when one was given.
fn resume(
    store: &SessionStore,
    id: &str,
    model: Option<&str>,
) -> Result<ChatSession, Box<dyn Error>> {
    let mut session = find(store, id)?;
    println!(
        "Resuming '{}' ({} messages)",
        session.name,
        session.messages.len()
    );
    if let Some(model) = model.filter(|model| *model != session.model) {
        session.model = model.to_string();
        session = store.save_session(session)?;
    }
    Ok(session)
}

fn with_user_message(history: &[ChatMessage], input: &str) -> Vec<ChatMessage> {
    let mut messages = history.to_vec();
    messages.push(ChatMessage::user(input));
    messages
}
