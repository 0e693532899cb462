//! Interactive chat loop.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use ragchat_rag::ChatSession;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::config::load_document;

const HELP: &str = "\
Commands:
  /add <path>        ingest a text file
  /remove <id>       forget a document (its file name)
  /docs              list documents added in this session
  /clear             forget the conversation so far
  /help              show this message
  /quit              leave
Anything else is a question.";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Add(PathBuf),
    Remove(String),
    Docs,
    Clear,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Interpret one line of input.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    if !line.starts_with('/') {
        return ReplCommand::Ask(line.to_string());
    }

    let (command, argument) = match line.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };
    match (command, argument) {
        ("/add", "") => ReplCommand::Invalid("usage: /add <path>".to_string()),
        ("/add", path) => ReplCommand::Add(PathBuf::from(path)),
        ("/remove", "") => ReplCommand::Invalid("usage: /remove <document-id>".to_string()),
        ("/remove", id) => ReplCommand::Remove(id.to_string()),
        ("/docs", _) => ReplCommand::Docs,
        ("/clear", _) => ReplCommand::Clear,
        ("/help", _) => ReplCommand::Help,
        ("/quit" | "/exit", _) => ReplCommand::Quit,
        (other, _) => ReplCommand::Invalid(format!("unknown command {other}, try /help")),
    }
}

/// Ask one question, printing the answer as it streams.
pub async fn ask_and_print(session: &mut ChatSession, question: &str) {
    let mut stdout = io::stdout();
    session
        .ask(question, |fragment| {
            print!("{fragment}");
            let _ = stdout.flush();
        })
        .await;
    println!();
}

/// Run the chat loop until `/quit` or end of input.
///
/// `documents` holds the ids ingested before the loop started.
pub async fn run(mut session: ChatSession, mut documents: BTreeSet<String>) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Ask a question about your documents. Type /help for commands.");

    loop {
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match parse_command(&line) {
            ReplCommand::Ask(question) => ask_and_print(&mut session, &question).await,
            ReplCommand::Add(path) => {
                let added = match load_document(&path) {
                    Ok(document) => session.pipeline().ingest(&document).await.map(|chunks| {
                        println!("Added {} ({} chunks)", document.id, chunks.len());
                        document.id
                    }),
                    Err(e) => {
                        println!("{e:#}");
                        continue;
                    }
                };
                match added {
                    Ok(id) => {
                        documents.insert(id);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to add document");
                        println!("Could not add {}: {e}", path.display());
                    }
                }
            }
            ReplCommand::Remove(id) => match session.pipeline().remove_document(&id).await {
                Ok(()) => {
                    documents.remove(&id);
                    println!("Removed {id}");
                }
                Err(e) => println!("Could not remove {id}: {e}"),
            },
            ReplCommand::Docs if documents.is_empty() => println!("No documents added yet."),
            ReplCommand::Docs => documents.iter().for_each(|id| println!("  {id}")),
            ReplCommand::Clear => {
                session.clear_history();
                println!("Conversation cleared.");
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Empty => {}
            ReplCommand::Invalid(message) => println!("{message}"),
        }
    }

    Ok(())
}
