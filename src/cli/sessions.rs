//! `ichat sessions ...` subcommands.

use std::error::Error;

use chrono::{DateTime, Local};

use crate::api::Role;
use crate::cli::{CliContext, SessionCommands};
use crate::core::session::{ChatSession, SessionStore};

pub fn run(context: &CliContext, command: SessionCommands) -> Result<(), Box<dyn Error>> {
    let store = context.sessions()?;
    match command {
        SessionCommands::List => {
            let sessions = store.sorted_sessions();
            if sessions.is_empty() {
                println!("No saved sessions. Start one with 'ichat chat'.");
            }
            for session in &sessions {
                println!("{}", summary_line(session));
            }
        }
        SessionCommands::Show { id } => {
            let session = find(&store, &id)?;
            for line in transcript(&session) {
                println!("{line}");
            }
        }
        SessionCommands::Rename { id, name } => {
            let name = name.join(" ");
            if store.rename_session(&id, &name)? {
                println!("✅ Renamed session {id} to: {name}");
            } else {
                return Err(not_found(&id));
            }
        }
        SessionCommands::Pin { id } => match store.toggle_pin_session(&id)? {
            Some(true) => println!("📌 Pinned session {id}"),
            Some(false) => println!("✅ Unpinned session {id}"),
            None => return Err(not_found(&id)),
        },
        SessionCommands::Delete { id } => {
            if store.delete_session(&id)? {
                println!("✅ Deleted session {id}");
            } else {
                return Err(not_found(&id));
            }
        }
        SessionCommands::Clear => {
            let count = store.len();
            store.clear_all_sessions()?;
            println!("✅ Deleted {count} sessions");
        }
    }
    Ok(())
}

pub(crate) fn find(store: &SessionStore, id: &str) -> Result<ChatSession, Box<dyn Error>> {
    store.session(id).ok_or_else(|| not_found(id))
}

fn not_found(id: &str) -> Box<dyn Error> {
    format!("Session '{id}' not found. Run 'ichat sessions list' to see saved sessions.").into()
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub(crate) fn summary_line(session: &ChatSession) -> String {
    let marker = if session.is_pinned() { "📌" } else { "  " };
    let icon = session.icon.as_deref().map(|icon| format!("{icon} ")).unwrap_or_default();
    format!(
        "{marker} {id}  {icon}{name}  [{model}, {count} messages, updated {updated}]",
        id = session.id,
        name = session.name,
        model = session.model,
        count = session.messages.len(),
        updated = format_timestamp(session.last_updated),
    )
}

fn transcript(session: &ChatSession) -> Vec<String> {
    let mut lines = vec![
        format!("💬 {} ({})", session.name, session.model),
        format!("Created {}", format_timestamp(session.created)),
        String::new(),
    ];
    for message in &session.messages {
        let label = match message.role {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        lines.push(format!("{label}:"));
        lines.extend(message.content.lines().map(|line| format!("  {line}")));
        lines.push(String::new());
    }
    lines
}
