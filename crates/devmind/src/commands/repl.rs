//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use anyhow::Result;
use console::{Style, Term, style};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tokio::sync::mpsc;

use devmind_agent::{Agent, AgentEvent, CancellationToken, TurnStatus};

const PROMPT: &str = "User: ";

/// REPL state.
pub struct Repl {
    agent: Agent,
    editor: Editor<(), DefaultHistory>,
    term: Term,
    verbose: bool,
}

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlFlow {
    Continue,
    Exit,
}

impl Repl {
    /// Create a new REPL around a ready agent.
    pub fn new(agent: Agent, verbose: bool) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            agent,
            editor,
            term: Term::stdout(),
            verbose,
        })
    }

    /// Run the REPL loop until `exit`, `/quit` or Ctrl+D.
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    if is_exit(line) {
                        break;
                    }

                    if line.starts_with('/') {
                        match self.handle_slash_command(line) {
                            Ok(ControlFlow::Continue) => continue,
                            Ok(ControlFlow::Exit) => break,
                            Err(e) => {
                                print_error(&format!("Command error: {}", e));
                                continue;
                            }
                        }
                    }

                    self.send_message(line).await;
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C at the prompt
                    println!();
                    print_dim("(Interrupted - type exit to quit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    println!();
                    break;
                }
                Err(e) => {
                    print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        print_dim("Goodbye!");
        Ok(())
    }

    /// Run one turn, echoing tool activity. Ctrl+C cancels the turn at the
    /// next iteration boundary.
    async fn send_message(&mut self, message: &str) {
        print_dim("Thinking...");

        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.agent.set_event_sender(Some(tx));
        let verbose = self.verbose;

        let outcome = drive_turn(
            self.agent.turn(message, &cancel),
            &mut rx,
            tokio::signal::ctrl_c(),
            &cancel,
            |event| print_event(event, verbose),
        )
        .await;

        self.agent.set_event_sender(None);
        while let Ok(event) = rx.try_recv() {
            print_event(&event, verbose);
        }

        tracing::debug!(
            status = ?outcome.status,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_calls,
            "Turn finished"
        );

        let label = match outcome.status {
            TurnStatus::Completed => style("Agent:").bold().green(),
            _ => style("Agent:").bold().red(),
        };
        println!("{} {}", label, outcome.answer);
        println!();
    }

    fn handle_slash_command(&mut self, input: &str) -> Result<ControlFlow> {
        let cmd = input[1..].split_whitespace().next().unwrap_or("");

        match cmd {
            "quit" | "q" | "exit" => return Ok(ControlFlow::Exit),
            "help" | "h" | "?" => self.print_help(),
            "clear" | "cls" => self.term.clear_screen()?,
            "new" | "reset" => {
                self.agent.reset();
                print_dim("Started a new conversation");
            }
            "" => print_dim("Type /help for available commands"),
            _ => {
                print_error(&format!("Unknown command: /{}", cmd));
                print_dim("Type /help for available commands");
            }
        }

        Ok(ControlFlow::Continue)
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!("{}", style("DevMind AI ready. Type 'exit' to quit.").bold().cyan());
        if self.verbose {
            println!(
                "{}",
                dim.apply_to(format!(
                    "Model: {} · Session: {}",
                    self.agent.config().model,
                    self.agent.session_id()
                ))
            );
        }
        println!("{}", dim.apply_to("Use /help for commands, Ctrl+D to exit."));
        println!();
    }

    fn print_help(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Available Commands").bold());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("  {}  - Exit", style("exit, quit, /quit").cyan());
        println!("  {}  - Show this help", style("/help, /h, /?").cyan());
        println!("  {}  - Clear the screen", style("/clear").cyan());
        println!("  {}  - Start a new conversation", style("/new").cyan());
        println!();
        println!("{}", dim.apply_to("Tools:"));
        for name in self.agent.tools().names() {
            println!("  {}", dim.apply_to(name));
        }
        println!();
        println!("{}", dim.apply_to("Keyboard shortcuts:"));
        println!("  {} - Cancel the running turn", dim.apply_to("Ctrl+C"));
        println!("  {} - Exit", dim.apply_to("Ctrl+D"));
        println!();
    }
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit")
}

/// Run `turn` to completion, forwarding its events as they arrive.
///
/// The first time `interrupt` resolves the turn is cancelled; it then stops
/// at the next step boundary and its outcome is still returned.
async fn drive_turn<T, I>(
    turn: impl Future<Output = T>,
    events: &mut mpsc::UnboundedReceiver<AgentEvent>,
    interrupt: I,
    cancel: &CancellationToken,
    mut on_event: impl FnMut(&AgentEvent),
) -> T
where
    I: Future,
{
    tokio::pin!(turn);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            Some(event) = events.recv() => on_event(&event),
            _ = &mut interrupt, if !cancel.is_cancelled() => {
                cancel.cancel();
                print_dim("(Cancelling after the current step...)");
            }
        }
    }
}

fn print_event(event: &AgentEvent, verbose: bool) {
    let dim = Style::new().dim();
    match event {
        AgentEvent::ToolStart { name, args } => {
            if verbose {
                println!("{}", dim.apply_to(format!("  [tool] {} {}", name, args)));
            } else {
                println!("{}", dim.apply_to(format!("  [tool] {}", name)));
            }
        }
        AgentEvent::ToolEnd { name, result } => {
            if verbose {
                println!(
                    "{}",
                    dim.apply_to(format!("  [done] {} ({} chars)", name, result.chars().count()))
                );
            }
        }
    }
}

fn print_dim(msg: &str) {
    println!("{}", Style::new().dim().apply_to(msg));
}

fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words_are_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT"));
        assert!(is_exit("Exit"));
        assert!(!is_exit("exit now"));
        assert!(!is_exit("/exit"));
    }

    fn tool_end(name: &str) -> AgentEvent {
        AgentEvent::ToolEnd {
            name: name.to_string(),
            result: String::new(),
        }
    }

    fn event_names(seen: Vec<String>, rx: &mut mpsc::UnboundedReceiver<AgentEvent>) -> Vec<String> {
        let mut names = seen;
        while let Ok(AgentEvent::ToolEnd { name, .. } | AgentEvent::ToolStart { name, .. }) =
            rx.try_recv()
        {
            names.push(name);
        }
        names
    }

    #[tokio::test]
    async fn test_interrupt_cancels_running_turn() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let turn = {
            let cancel = cancel.clone();
            async move {
                tx.send(tool_end("create_plan")).unwrap();
                cancel.cancelled().await;
                "stopped"
            }
        };
        let (interrupt_tx, interrupt_rx) = tokio::sync::oneshot::channel::<()>();
        interrupt_tx.send(()).unwrap();

        let mut seen = Vec::new();
        let outcome = drive_turn(turn, &mut rx, interrupt_rx, &cancel, |event| {
            if let AgentEvent::ToolEnd { name, .. } = event {
                seen.push(name.clone());
            }
        })
        .await;

        assert_eq!(outcome, "stopped");
        assert!(cancel.is_cancelled());
        assert_eq!(event_names(seen, &mut rx), vec!["create_plan"]);
    }

    #[tokio::test]
    async fn test_turn_without_interrupt_runs_to_completion() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let turn = async move {
            tx.send(tool_end("retrieve_knowledge")).unwrap();
            tx.send(tool_end("web_search")).unwrap();
            42
        };

        let mut seen = Vec::new();
        let outcome = drive_turn(turn, &mut rx, std::future::pending::<()>(), &cancel, |event| {
            if let AgentEvent::ToolEnd { name, .. } = event {
                seen.push(name.clone());
            }
        })
        .await;

        assert_eq!(outcome, 42);
        assert!(!cancel.is_cancelled());
        assert_eq!(
            event_names(seen, &mut rx),
            vec!["retrieve_knowledge", "web_search"]
        );
    }
}
