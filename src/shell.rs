//! Interactive session.
//!
//! Every line is parsed with the same clap definitions as the one-shot CLI
//! and run against one [`ProjectData`], so cached collections, invalidation
//! and `retry` carry over from command to command.

use std::path::Path;

use clap::Parser;
use dialoguer::Input;
use tracing::{debug, info};

use crate::cli::{Command, ShellLine};
use crate::commands;
use crate::config::Settings;
use crate::data::ProjectData;
use crate::error::{ServiceError, ServiceResult};
use crate::render;

const PROMPT: &str = "board";

/// Split a line into words; single or double quotes group, backslash escapes.
pub fn split_words(line: &str) -> ServiceResult<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (_, '\\') => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| ServiceError::InvalidInput("trailing backslash".to_string()))?;
                current.push(escaped);
                in_word = true;
            }
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if let Some(q) = quote {
        return Err(ServiceError::InvalidInput(format!("unclosed {q}")));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// What one line asks the session to do.
#[derive(Debug)]
pub enum Step {
    Skip,
    Exit,
    Print(String),
    Run(Command),
}

pub fn interpret(line: &str) -> ServiceResult<Step> {
    let words = split_words(line)?;
    match words.first().map(String::as_str) {
        None => return Ok(Step::Skip),
        Some("exit" | "quit") => return Ok(Step::Exit),
        _ => {}
    }
    match ShellLine::try_parse_from(&words) {
        Ok(parsed) => Ok(Step::Run(parsed.command)),
        // clap also reports --help and --version through the error path
        Err(err) => Ok(Step::Print(err.render().to_string())),
    }
}

async fn read_line() -> ServiceResult<String> {
    tokio::task::spawn_blocking(|| {
        Input::<String>::new()
            .with_prompt(PROMPT)
            .allow_empty(true)
            .interact_text()
    })
    .await
    .map_err(|e| ServiceError::Other(format!("prompt task failed: {e}")))?
    .map_err(|e| ServiceError::Other(format!("prompt failed: {e}")))
}

/// Run one parsed command inside the session.
pub async fn execute(
    data: &ProjectData,
    command: Command,
    settings: &Settings,
    settings_path: Option<&Path>,
    memory: bool,
) -> ServiceResult<String> {
    match command {
        Command::Shell => Err(ServiceError::InvalidInput(
            "already inside the shell".to_string(),
        )),
        Command::Version => Ok(commands::version()),
        Command::Status => Ok(commands::status(settings, settings_path, memory)),
        Command::Config => {
            let path = settings_path.ok_or_else(|| {
                ServiceError::Config("no settings path; pass --settings".to_string())
            })?;
            commands::configure(path)
        }
        other => commands::run(data, other).await,
    }
}

pub async fn run(
    data: &ProjectData,
    settings: &Settings,
    settings_path: Option<&Path>,
    memory: bool,
) -> ServiceResult<()> {
    info!("shell started");
    println!("Type a command (e.g. `dashboard`, `task list`), `help`, or `exit`.");
    loop {
        // end of input (or a closed terminal) ends the session
        let line = match read_line().await {
            Ok(line) => line,
            Err(err) => {
                debug!(error = %err, "input closed");
                break;
            }
        };
        let command = match interpret(&line) {
            Ok(Step::Skip) => continue,
            Ok(Step::Exit) => break,
            Ok(Step::Print(text)) => {
                println!("{text}");
                continue;
            }
            Ok(Step::Run(command)) => command,
            Err(err) => {
                eprintln!("{}", render::error(&err));
                continue;
            }
        };
        debug!(line = %line, "shell command");
        match execute(data, command, settings, settings_path, memory).await {
            Ok(output) => println!("{output}"),
            Err(err) => eprintln!("{}", render::error(&err)),
        }
    }
    info!("shell finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cli::TaskCommand;
    use crate::store::{MemoryStore, StoreOp};

    #[test]
    fn test_split_words_handles_quotes() {
        let words = split_words(r#"task create "write the docs" --project 'p 1' a\ b"#).unwrap();
        assert_eq!(
            words,
            vec!["task", "create", "write the docs", "--project", "p 1", "a b"]
        );
        assert_eq!(split_words("  ").unwrap(), Vec::<String>::new());
        assert_eq!(split_words(r#"x """#).unwrap(), vec!["x", ""]);
        assert!(split_words("task create \"oops").is_err());
    }

    #[test]
    fn test_interpret() {
        assert!(matches!(interpret("").unwrap(), Step::Skip));
        assert!(matches!(interpret("quit").unwrap(), Step::Exit));
        assert!(matches!(interpret("bogus").unwrap(), Step::Print(_)));
        assert!(matches!(
            interpret("task list --project p1").unwrap(),
            Step::Run(Command::Task(TaskCommand::List { .. }))
        ));
    }

    #[tokio::test]
    async fn test_commands_share_the_cache() {
        colored::control::set_override(false);
        let store = Arc::new(MemoryStore::new());
        let data = ProjectData::new(store.clone());
        let settings = Settings::default();

        for line in ["task list", "dashboard", "task list"] {
            let Step::Run(command) = interpret(line).unwrap() else {
                panic!("{line} did not parse");
            };
            execute(&data, command, &settings, None, true).await.unwrap();
        }
        assert_eq!(store.calls(StoreOp::Select, "tasks"), 1);

        let Step::Run(nested) = interpret("shell").unwrap() else {
            panic!("shell did not parse");
        };
        assert!(execute(&data, nested, &settings, None, true).await.is_err());
    }
}
