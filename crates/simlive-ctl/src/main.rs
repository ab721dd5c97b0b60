//! simlive-ctl — command-line interface for the simlive daemon.

mod cmd;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 9100;
const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;

fn print_usage() {
    println!("Usage: simlive-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                          Show daemon status and sessions");
    println!("  load                            Create a session and print its id");
    println!("  sessions inspect <id>           Show one session");
    println!("  sessions drop <id>              End and remove a session");
    println!("  upload <id> <file> [<w> <h>]    Upload a model (default {}x{})", DEFAULT_WIDTH, DEFAULT_HEIGHT);
    println!("  run <id> <start> <end> <steps>  One-shot simulation, printed as a table");
    println!("  shutdown                        Stop the daemon");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

fn number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", what, value))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd::status::cmd_status(port).await,
        ["load"] => cmd::sessions::cmd_load(port).await,
        ["sessions", "inspect", id] => cmd::sessions::cmd_session_inspect(port, id).await,
        ["sessions", "drop", id] => cmd::sessions::cmd_session_drop(port, id).await,
        ["upload", id, file] => {
            cmd::model::cmd_upload(port, id, file, DEFAULT_WIDTH, DEFAULT_HEIGHT).await
        }
        ["upload", id, file, w, h] => {
            let width = number(w, "width")?;
            let height = number(h, "height")?;
            cmd::model::cmd_upload(port, id, file, width, height).await
        }
        ["run", id, start, end, steps] => {
            let start = number(start, "start")?;
            let end = number(end, "end")?;
            let steps = number(steps, "steps")?;
            cmd::model::cmd_run(port, id, start, end, steps).await
        }
        ["shutdown"] => cmd::status::cmd_shutdown(port).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
