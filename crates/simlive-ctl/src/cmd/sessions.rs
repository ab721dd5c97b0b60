//! Session management commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, delete_json, get_json, post_json};

#[derive(Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: u64,
    pub run_state: String,
    pub model_loaded: bool,
    pub sim_clock: f64,
    pub step_frequency: f64,
    pub step_size: f64,
    pub last_seq: u64,
    pub subscribers: usize,
}

impl SessionSummary {
    pub fn short_id(&self) -> &str {
        self.session_id.get(..16).unwrap_or(&self.session_id)
    }
}

pub async fn cmd_load(port: u16) -> Result<()> {
    #[derive(Deserialize)]
    struct LoadResponse {
        session_id: String,
    }

    let resp: LoadResponse = post_json(&format!("{}/sessions", base_url(port))).await?;
    println!("{}", resp.session_id);
    Ok(())
}

pub async fn cmd_session_drop(port: u16, session_id: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct DropResponse {
        session_id: String,
        dropped: bool,
    }

    let resp: DropResponse =
        delete_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    if resp.dropped {
        println!("✓ Session dropped: {}", resp.session_id);
    } else {
        println!("Session not found: {}", session_id);
    }

    Ok(())
}

pub async fn cmd_session_inspect(port: u16, session_id: &str) -> Result<()> {
    let resp: SessionSummary =
        get_json(&format!("{}/sessions/{}", base_url(port), session_id)).await?;

    println!("═══════════════════════════════════════");
    println!("  Session Details");
    println!("═══════════════════════════════════════");
    println!("  ID          : {}", resp.session_id);
    println!("  Created     : {} (unix ms)", resp.created_at);
    println!("  State       : {}", resp.run_state);
    println!("  Model       : {}", if resp.model_loaded { "loaded" } else { "none" });
    println!("  Clock       : {}", resp.sim_clock);
    println!("  Cadence     : every {}s, dt {}", resp.step_frequency, resp.step_size);
    println!("  Last seq    : {}", resp.last_seq);
    println!("  Listeners   : {}", resp.subscribers);

    Ok(())
}
