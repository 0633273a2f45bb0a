//! REPL driving the steering controller from the terminal.
//!
//! A bare number moves the slider. Slash-commands:
//!   /strength N   – change the writer's ownership strength
//!   /status       – show slider value and strength
//!   /help         – show this list
//!   /quit | /exit – leave

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use steerbus_runtime::SteeringController;
use tracing::warn;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Slider(f64),
    Strength(i32),
    Status,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default();
        match head {
            "/help" => Command::Help,
            "/status" => Command::Status,
            "/quit" | "/exit" => Command::Quit,
            "/strength" => match (words.next().map(str::parse::<i32>), words.next()) {
                (Some(Ok(n)), None) => Command::Strength(n),
                _ => Command::Invalid("usage: /strength <int>".to_string()),
            },
            other if other.starts_with('/') => Command::Invalid(format!("unknown command '{other}'")),
            _ => match line.parse::<f64>() {
                Ok(v) if v.is_finite() => Command::Slider(v),
                _ => Command::Invalid(format!("not a number: '{line}'")),
            },
        }
    }
}

/// Run until `/quit`, EOF, or `shutdown` is raised.
///
/// `shutdown` is checked around each blocking read, so after Ctrl-C the
/// loop ends at the next Enter or EOF without acting on that line.
pub fn run(controller: &mut SteeringController, shutdown: Arc<AtomicBool>) {
    run_with(controller, &shutdown, io::stdin().lock(), io::stdout());
}

fn run_with<R: BufRead, W: Write>(
    controller: &mut SteeringController,
    shutdown: &AtomicBool,
    mut input: R,
    mut prompt: W,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        write!(prompt, "{} ", "steer>".bold().cyan()).ok();
        prompt.flush().ok();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        // Ctrl-C cannot interrupt the read; drop whatever line ended it.
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        if !apply(controller, Command::parse(&line)) {
            shutdown.store(true, Ordering::SeqCst);
            break;
        }
    }
}

/// Execute one command. Returns `false` when the REPL should stop.
fn apply(controller: &mut SteeringController, command: Command) -> bool {
    match command {
        Command::Empty => {}
        Command::Slider(raw) => match controller.on_slider(raw) {
            Ok(_) => println!("  {}", controller.label().bold()),
            Err(e) => warn!(error = %e, "publish failed"),
        },
        Command::Strength(n) => {
            controller.set_strength(n);
            println!("  {}", controller.title().bold());
        }
        Command::Status => {
            println!("  {}", controller.title());
            println!("  {}", controller.label());
        }
        Command::Help => print_help(),
        Command::Quit => {
            println!("{}", "Goodbye.".green());
            return false;
        }
        Command::Invalid(msg) => {
            println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                msg.yellow(),
                "/help".bold()
            );
        }
    }
    true
}

fn print_help() {
    println!();
    println!("  {}", "Commands".bold().underline());
    println!("  {}  move the slider to N degrees (-180..180)", "<N>".bold().cyan());
    println!("  {}  set ownership strength", "/strength N".bold().cyan());
    println!("  {}  show slider value and strength", "/status".bold().cyan());
    println!("  {}  show this list", "/help".bold().cyan());
    println!("  {}  leave", "/quit".bold().cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use steerbus_middleware::profile::{CONTROLLER_PARTICIPANT, CONTROLLER_WRITER};
    use steerbus_middleware::{BusProfile, Domain};

    fn controller() -> SteeringController {
        let domain = Domain::new(BusProfile::default()).unwrap();
        let participant = domain.create_participant(CONTROLLER_PARTICIPANT).unwrap();
        SteeringController::new(Arc::new(participant.find_writer(CONTROLLER_WRITER).unwrap()))
    }

    /// Input that raises the shutdown flag while a line is being read, the
    /// way Ctrl-C does during a blocking read.
    struct InterruptedInput<'a> {
        shutdown: &'a AtomicBool,
        inner: Cursor<&'static [u8]>,
    }

    impl Read for InterruptedInput<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.shutdown.store(true, Ordering::SeqCst);
            self.inner.read(buf)
        }
    }

    impl BufRead for InterruptedInput<'_> {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            self.shutdown.store(true, Ordering::SeqCst);
            self.inner.fill_buf()
        }
        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt)
        }
    }

    #[test]
    fn numbers_move_the_slider() {
        assert_eq!(Command::parse("45"), Command::Slider(45.0));
        assert_eq!(Command::parse("  -12.7 \n"), Command::Slider(-12.7));
    }

    #[test]
    fn slash_commands() {
        assert_eq!(Command::parse("/strength 7"), Command::Strength(7));
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/status"), Command::Status);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse(""), Command::Empty);
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(Command::parse("/strength"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/strength 1 2"), Command::Invalid(_)));
        assert!(matches!(Command::parse("/nope"), Command::Invalid(_)));
        assert!(matches!(Command::parse("left"), Command::Invalid(_)));
        assert!(matches!(Command::parse("NaN"), Command::Invalid(_)));
    }

    #[test]
    fn apply_updates_controller() {
        let mut controller = controller();

        assert!(apply(&mut controller, Command::Slider(30.9)));
        assert_eq!(controller.value(), 30);
        assert!(apply(&mut controller, Command::Strength(4)));
        assert_eq!(controller.writer().strength(), 4);
        assert!(!apply(&mut controller, Command::Quit));
    }

    #[test]
    fn session_runs_until_quit() {
        let mut controller = controller();
        let shutdown = AtomicBool::new(false);
        let input = Cursor::new(&b"45\n/strength 3\n/quit\n-90\n"[..]);
        run_with(&mut controller, &shutdown, input, io::sink());

        assert_eq!(controller.value(), 45);
        assert_eq!(controller.writer().strength(), 3);
        assert!(shutdown.load(Ordering::SeqCst));
    }

    #[test]
    fn line_read_after_ctrl_c_is_not_applied() {
        let mut controller = controller();
        let shutdown = AtomicBool::new(false);
        let input = InterruptedInput {
            shutdown: &shutdown,
            inner: Cursor::new(&b"45\n"[..]),
        };
        run_with(&mut controller, &shutdown, input, io::sink());

        assert_eq!(controller.value(), 0);
        assert_eq!(controller.writer().sequence(), 0);
    }
}
