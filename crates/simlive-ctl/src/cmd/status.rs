//! Daemon status and shutdown commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};
use super::sessions::SessionSummary;

#[derive(Deserialize)]
struct StatusResponse {
    uptime_secs: u64,
    session_count: usize,
    max_sessions: usize,
    sessions: Vec<SessionSummary>,
}

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    let limit = match resp.max_sessions {
        0 => "unlimited".to_string(),
        n => n.to_string(),
    };

    println!("═══════════════════════════════════════");
    println!("  simlive Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Uptime           : {}s", resp.uptime_secs);
    println!("  Active sessions  : {} / {}", resp.session_count, limit);

    if resp.sessions.is_empty() {
        println!("\n  No active sessions.");
    } else {
        println!("\n  Sessions:");
        for s in &resp.sessions {
            println!("  ┌─ {}", s.short_id());
            println!("  │  state    : {}", s.run_state);
            println!("  │  model    : {}", if s.model_loaded { "loaded" } else { "none" });
            println!("  │  clock    : {}", s.sim_clock);
            println!("  └─ steps    : {}", s.last_seq);
        }
    }

    Ok(())
}

pub async fn cmd_shutdown(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct ShutdownResponse {
        message: String,
    }

    let resp: ShutdownResponse =
        post_json(&format!("{}/daemon/shutdown", base_url(port))).await?;
    println!("{}", resp.message);
    Ok(())
}
