//! Interactive REPL channel with line editing and markdown rendering.
//!
//! Uses rustyline for line editing, history, and tab-completion, and
//! termimad for rendering replies inline.
//!
//! ## Commands
//!
//! - `/help` - Show available commands
//! - `/actions` - List actions with example phrasings
//! - `/clear` - Forget the conversation
//! - `/debug` - Toggle the status line after each turn
//! - `/quit` or `/exit` - Exit the REPL
//! - `/<action>` - Run an action directly on the conversation so far

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rustyline::completion::Completer;
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Editor, Helper};
use termimad::MadSkin;
use termimad::crossterm::style::Color;
use tokio::sync::mpsc;

use crate::agent::{AgentRuntime, Turn};
use crate::channels::{IncomingMessage, OutgoingResponse, ResponseSink};
use crate::settings::Settings;

const CHANNEL_NAME: &str = "repl";
const DEFAULT_USER: &str = "user";

/// Slash commands available in the REPL.
const SLASH_COMMANDS: &[&str] = &[
    "/help",
    "/actions",
    "/clear",
    "/debug",
    "/quit",
    "/exit",
    "/open_loop_trading",
    "/retrieve_volatility_state",
];

/// Rustyline helper for slash-command tab completion.
struct ReplHelper;

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if !line.starts_with('/') {
            return Ok((0, vec![]));
        }

        let prefix = &line[..pos];
        let matches: Vec<String> = SLASH_COMMANDS
            .iter()
            .filter(|cmd| cmd.starts_with(prefix))
            .map(|cmd| cmd.to_string())
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }

        SLASH_COMMANDS
            .iter()
            .find(|cmd| cmd.starts_with(line) && **cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for ReplHelper {}
impl Helper for ReplHelper {}

fn make_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.set_headers_fg(Color::Yellow);
    skin.bold.set_fg(Color::White);
    skin.italic.set_fg(Color::Magenta);
    skin.inline_code.set_fg(Color::Green);
    skin.code_block.set_fg(Color::Green);
    skin.code_block.left_margin = 2;
    skin
}

/// Prints each reply as markdown under a dim separator.
struct TerminalSink {
    skin: MadSkin,
}

impl ResponseSink for TerminalSink {
    fn respond(&self, response: OutgoingResponse) {
        let width = termimad::crossterm::terminal::size()
            .map(|(w, _)| w as usize)
            .unwrap_or(80);

        eprintln!("\x1b[90m{}\x1b[0m", "\u{2500}".repeat(width.min(80)));
        let text = termimad::FmtText::from(&self.skin, &response.text, Some(width));
        print!("{text}");
        println!();
    }
}

fn print_help(runtime: &AgentRuntime) {
    let h = "\x1b[1m";
    let c = "\x1b[1;36m";
    let d = "\x1b[90m";
    let r = "\x1b[0m";

    println!();
    println!("  {h}{} REPL{r}", runtime.character().name);
    println!();
    println!("  {h}Commands{r}");
    println!("  {c}/help{r}              {d}show this help{r}");
    println!("  {c}/actions{r}           {d}list actions with examples{r}");
    println!("  {c}/clear{r}             {d}forget this conversation{r}");
    println!("  {c}/debug{r}             {d}toggle turn status lines{r}");
    println!("  {c}/quit{r} {c}/exit{r}        {d}exit the repl{r}");
    println!();
    println!("  {h}Actions{r}");
    for action in runtime.actions() {
        let command = format!("/{}", action.name().to_ascii_lowercase());
        println!("  {c}{command:<28}{r} {d}{}{r}", action.description());
    }
    println!();
}

/// Get the history file path (~/.looper/history).
fn history_path() -> PathBuf {
    Settings::base_dir().join("history")
}

fn turn_status(turn: &Turn) -> String {
    match turn {
        Turn::Action { name, result } if result.is_success() => format!("\u{25CF} {name}"),
        Turn::Action { name, .. } => format!("\u{2717} {name} (failed)"),
        Turn::Reply(_) => "\u{25CB} no action".to_string(),
        Turn::Quit => "\u{25CB} quit".to_string(),
    }
}

/// REPL channel with line editing and markdown rendering.
pub struct ReplChannel {
    /// Optional single message to send (for `looper run --message`).
    single_message: Option<String>,
    /// Debug mode flag (shared with input thread).
    debug_mode: Arc<AtomicBool>,
}

impl ReplChannel {
    /// Create a new REPL channel.
    pub fn new() -> Self {
        Self {
            single_message: None,
            debug_mode: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a REPL channel that sends a single message and exits.
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            single_message: Some(message.into()),
            debug_mode: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_debug(&self) -> bool {
        self.debug_mode.load(Ordering::Relaxed)
    }

    /// Read lines until the user quits, handing each to `runtime`.
    pub async fn run(&self, runtime: Arc<AgentRuntime>) -> anyhow::Result<()> {
        let sink = TerminalSink { skin: make_skin() };

        if let Some(message) = &self.single_message {
            let incoming = IncomingMessage::new(CHANNEL_NAME, DEFAULT_USER, message.as_str());
            runtime.process_message(&incoming, &sink).await;
            return Ok(());
        }

        println!(
            "\x1b[1m{}\x1b[0m  /help for commands, /quit to exit",
            runtime.character().name
        );
        println!();

        let mut rx = self.start_input();
        while let Some(line) = rx.recv().await {
            if line == "/help" {
                print_help(&runtime);
                continue;
            }

            let incoming = IncomingMessage::new(CHANNEL_NAME, DEFAULT_USER, line);
            let turn = runtime.process_message(&incoming, &sink).await;
            if self.is_debug() {
                eprintln!("  \x1b[90m{}\x1b[0m", turn_status(&turn));
            }
            if turn == Turn::Quit {
                break;
            }
        }

        Ok(())
    }

    /// Spawn the blocking line editor and stream trimmed lines back.
    fn start_input(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(32);
        let debug_mode = Arc::clone(&self.debug_mode);

        std::thread::spawn(move || {
            let builder = match Config::builder().history_ignore_dups(true) {
                Ok(builder) => builder,
                Err(e) => {
                    eprintln!("Failed to configure line editor: {e}");
                    return;
                }
            };
            let config = builder
                .auto_add_history(true)
                .completion_type(CompletionType::List)
                .build();

            let mut rl = match Editor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    eprintln!("Failed to initialize line editor: {e}");
                    return;
                }
            };
            rl.set_helper(Some(ReplHelper));

            let hist_path = history_path();
            if let Some(parent) = hist_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = rl.load_history(&hist_path);

            loop {
                let prompt = if debug_mode.load(Ordering::Relaxed) {
                    "\x1b[33m[debug]\x1b[0m \x1b[1;36m\u{203A}\x1b[0m "
                } else {
                    "\x1b[1;36m\u{203A}\x1b[0m "
                };

                match rl.readline(prompt) {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        if line.eq_ignore_ascii_case("/debug") {
                            let current = debug_mode.fetch_xor(true, Ordering::Relaxed);
                            let state = if current { "off" } else { "on" };
                            println!("\x1b[90mdebug mode {state}\x1b[0m");
                            continue;
                        }

                        let quitting = matches!(
                            line.to_lowercase().as_str(),
                            "/quit" | "/exit"
                        );
                        if tx.blocking_send(line.to_string()).is_err() || quitting {
                            break;
                        }
                    }
                    Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                        let _ = tx.blocking_send("/quit".to_string());
                        break;
                    }
                    Err(e) => {
                        eprintln!("Input error: {e}");
                        break;
                    }
                }
            }

            let _ = rl.save_history(&hist_path);
        });

        rx
    }
}

impl Default for ReplChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::CommandResult;
    use rustyline::history::DefaultHistory;

    #[test]
    fn completes_slash_commands_by_prefix() {
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);
        let (start, matches) = ReplHelper.complete("/re", 3, &ctx).unwrap();
        assert_eq!(start, 0);
        assert_eq!(matches, vec!["/retrieve_volatility_state".to_string()]);

        let (_, none) = ReplHelper.complete("hello", 5, &ctx).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn hints_remaining_command_text() {
        let history = DefaultHistory::new();
        let ctx = rustyline::Context::new(&history);
        assert_eq!(ReplHelper.hint("/ac", 3, &ctx), Some("tions".to_string()));
        assert_eq!(ReplHelper.hint("/actions", 8, &ctx), None);
    }

    #[test]
    fn turn_status_marks_failures() {
        let failed = Turn::Action {
            name: "OPEN_LOOP_TRADING",
            result: CommandResult::Failure("nope".to_string()),
        };
        assert!(turn_status(&failed).contains("(failed)"));
        assert!(turn_status(&Turn::Reply("hi".to_string())).contains("no action"));
    }

    #[test]
    fn single_message_mode_is_recorded() {
        let channel = ReplChannel::with_message("hello");
        assert_eq!(channel.single_message.as_deref(), Some("hello"));
        assert!(!channel.is_debug());
    }
}
