//! Model upload and one-shot run commands.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::http::{base_url, post_json_body, post_multipart};

pub async fn cmd_upload(port: u16, session_id: &str, path: &str, width: f64, height: f64) -> Result<()> {
    use reqwest::multipart;

    #[derive(Deserialize)]
    struct Node {
        id: String,
    }

    #[derive(Deserialize)]
    struct Layout {
        nodes: Vec<Node>,
        edges: Vec<serde_json::Value>,
    }

    #[derive(Deserialize)]
    struct UploadResponse {
        layout: Layout,
        params: Vec<String>,
        compartments: Vec<String>,
        moieties: Vec<Vec<String>>,
    }

    let text =
        std::fs::read_to_string(path).with_context(|| format!("failed to read model: {}", path))?;
    let filename = std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("model")
        .to_string();

    let form = multipart::Form::new()
        .part("sbml", multipart::Part::text(text).file_name(filename.clone()))
        .text("width", width.to_string())
        .text("height", height.to_string());

    let resp: UploadResponse = post_multipart(
        &format!("{}/sessions/{}/upload", base_url(port), session_id),
        form,
    )
    .await?;

    let nodes: Vec<&str> = resp.layout.nodes.iter().map(|n| n.id.as_str()).collect();
    println!("✓ Uploaded {} to {}", filename, session_id);
    println!("  Nodes        : {}", nodes.join(", "));
    println!("  Reactions    : {}", resp.layout.edges.len());
    println!("  Parameters   : {}", resp.params.join(", "));
    println!("  Compartments : {}", resp.compartments.join(", "));
    for (i, group) in resp.moieties.iter().enumerate() {
        println!("  Moiety {}     : {}", i + 1, group.join(" + "));
    }

    Ok(())
}

pub async fn cmd_run(port: u16, session_id: &str, start: f64, end: f64, steps: usize) -> Result<()> {
    #[derive(Deserialize)]
    struct RunResponse {
        data: BTreeMap<String, Vec<f64>>,
    }

    let body = serde_json::json!({ "start": start, "end": end, "steps": steps });
    let resp: RunResponse = post_json_body(
        &format!("{}/sessions/{}/run", base_url(port), session_id),
        &body,
    )
    .await?;

    // time first, then the rest alphabetically
    let mut columns: Vec<&str> = resp
        .data
        .keys()
        .map(String::as_str)
        .filter(|k| *k != "time")
        .collect();
    if resp.data.contains_key("time") {
        columns.insert(0, "time");
    }

    let header: Vec<String> = columns.iter().map(|c| format!("{:>12}", c)).collect();
    println!("{}", header.join(" "));
    for row in 0..steps {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match resp.data[*c].get(row) {
                Some(v) => format!("{:>12.5}", v),
                None => format!("{:>12}", "-"),
            })
            .collect();
        println!("{}", cells.join(" "));
    }

    Ok(())
}
