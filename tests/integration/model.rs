use crate::*;

fn node<'a>(layout: &'a Value, id: &str) -> &'a Value {
    layout["nodes"]
        .as_array()
        .and_then(|nodes| nodes.iter().find(|n| n["id"] == id))
        .unwrap_or_else(|| panic!("node {id} missing from {layout}"))
}

#[tokio::test]
async fn test_upload_returns_layout_and_metadata() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;

    let (status, body) = server.upload(&id, DECAY_MODEL).await?;
    assert_eq!(status, 200, "{body}");

    let layout = &body["layout"];
    assert_eq!(layout["nodes"].as_array().map(Vec::len), Some(2));
    assert_eq!(layout["edges"].as_array().map(Vec::len), Some(1));
    let a = node(layout, "A");
    assert_eq!(a["value"], 10.0);
    let x = a["centroid"][0].as_f64().unwrap();
    let y = a["centroid"][1].as_f64().unwrap();
    assert!((0.0..=400.0).contains(&x) && (0.0..=300.0).contains(&y));

    let curves = layout["edges"][0]["curves"].as_array().unwrap();
    assert!(curves.iter().any(|c| c["type"] == "product"));
    assert!(curves.iter().all(|c| c["bezier"]["cp1"].is_array()));

    assert_eq!(body["params"], serde_json::json!(["k1"]));
    assert_eq!(body["compartments"], serde_json::json!(["cell"]));
    assert_eq!(body["moieties"], serde_json::json!([["A", "B"]]));
    assert_eq!(body["bounds"]["width"], 400.0);
    assert_eq!(body["sbml"], DECAY_MODEL);
    Ok(())
}

#[tokio::test]
async fn test_model_download_returns_uploaded_text() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;

    let (status, body) = server.get(&format!("/sessions/{id}/model")).await?;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "model_not_loaded");

    server.upload(&id, DECAY_MODEL).await?;
    let (status, body) = server.get(&format!("/sessions/{id}/model")).await?;
    assert_eq!(status, 200);
    assert_eq!(body, Value::String(DECAY_MODEL.to_string()));
    Ok(())
}

#[tokio::test]
async fn test_upload_rejects_bad_input() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;

    let (status, body) = server.upload(&id, "species A = oops\n").await?;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "engine_failure");
    assert!(body["message"].as_str().unwrap_or("").contains("line 1"));

    let form = reqwest::multipart::Form::new().text("sbml", DECAY_MODEL);
    let resp = reqwest::Client::new()
        .post(format!("{}/sessions/{}/upload", server.base, id))
        .multipart(form)
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400, "width/height are required");

    let (_, body) = server.get(&format!("/sessions/{id}")).await?;
    assert_eq!(body["model_loaded"], false);
    Ok(())
}

#[tokio::test]
async fn test_run_returns_trace() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.loaded_session().await?;

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/run"),
            serde_json::json!({ "start": 0, "end": 10, "steps": 11 }),
        )
        .await?;
    assert_eq!(status, 200, "{body}");

    let time = body["data"]["time"].as_array().unwrap();
    let a = body["data"]["A"].as_array().unwrap();
    let b = body["data"]["B"].as_array().unwrap();
    assert_eq!(time.len(), 11);
    assert_eq!(time[10], 10.0);
    assert_eq!(a[0], 10.0);
    let first = a[0].as_f64().unwrap();
    let last = a[10].as_f64().unwrap();
    assert!(last < first, "A should decay");
    let total = last + b[10].as_f64().unwrap();
    assert!((total - 10.0).abs() < 1e-6, "A + B is conserved");
    assert_eq!(body["params"], serde_json::json!(["k1"]));
    Ok(())
}

#[tokio::test]
async fn test_run_rejects_bad_range() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.loaded_session().await?;

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/run"),
            serde_json::json!({ "start": 5, "end": 1, "steps": 10 }),
        )
        .await?;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "engine_failure");

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/run"),
            serde_json::json!({ "start": 0, "end": 1, "steps": 10_000_000 }),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_parameter");
    Ok(())
}

#[tokio::test]
async fn test_drag_moves_one_node() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;
    let (_, uploaded) = server.upload(&id, DECAY_MODEL).await?;
    let before = node(&uploaded["layout"], "A")["centroid"].clone();

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/drag"),
            serde_json::json!({ "id": "A", "dx": 12.5, "dy": -4 }),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    let after = &node(&body["layout"], "A")["centroid"];
    let moved_x = after[0].as_f64().unwrap() - before[0].as_f64().unwrap();
    let moved_y = after[1].as_f64().unwrap() - before[1].as_f64().unwrap();
    assert!((moved_x - 12.5).abs() < 1e-9);
    assert!((moved_y + 4.0).abs() < 1e-9);
    assert_eq!(
        node(&body["layout"], "B")["centroid"],
        node(&uploaded["layout"], "B")["centroid"]
    );

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/drag"),
            serde_json::json!({ "id": "Z", "dx": 1, "dy": 1 }),
        )
        .await?;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "layout_failure");
    Ok(())
}

#[tokio::test]
async fn test_redraw_fits_new_bounds() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.loaded_session().await?;

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/redraw"),
            serde_json::json!({ "width": 120, "height": 90 }),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    for n in body["layout"]["nodes"].as_array().unwrap() {
        let x = n["centroid"][0].as_f64().unwrap();
        let y = n["centroid"][1].as_f64().unwrap();
        assert!((0.0..=120.0).contains(&x), "x = {x}");
        assert!((0.0..=90.0).contains(&y), "y = {y}");
    }

    let (status, _) = server
        .post(
            &format!("/sessions/{id}/redraw"),
            serde_json::json!({ "width": 0, "height": 90 }),
        )
        .await?;
    assert_eq!(status, 422);
    Ok(())
}

#[tokio::test]
async fn test_params_round_trip() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.loaded_session().await?;

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/get_param"),
            serde_json::json!({ "param": "k1" }),
        )
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["value"], 0.5);

    let (status, _) = server
        .post(
            &format!("/sessions/{id}/set_param"),
            serde_json::json!({ "param": "k1", "value": 2.0 }),
        )
        .await?;
    assert_eq!(status, 200);
    let (_, body) = server
        .post(
            &format!("/sessions/{id}/get_param"),
            serde_json::json!({ "param": "k1" }),
        )
        .await?;
    assert_eq!(body["value"], 2.0);

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/set_param"),
            serde_json::json!({ "param": "nope", "value": 1.0 }),
        )
        .await?;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "engine_failure");
    Ok(())
}

#[tokio::test]
async fn test_set_sim_param() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/set_sim_param"),
            serde_json::json!({ "param": "stepSize", "value": 0.25 }),
        )
        .await?;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["stepSize"], 0.25);
    assert_eq!(body["stepFrequency"], 1.0);

    let (status, body) = server
        .post(
            &format!("/sessions/{id}/set_sim_param"),
            serde_json::json!({ "param": "stepFrequency", "value": -1 }),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_parameter");

    let (status, _) = server
        .post(
            &format!("/sessions/{id}/set_sim_param"),
            serde_json::json!({ "param": "warp", "value": 1 }),
        )
        .await?;
    assert_eq!(status, 400);
    Ok(())
}
