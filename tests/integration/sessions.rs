use crate::*;

#[tokio::test]
async fn test_load_inspect_drop() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.load().await?;
    assert_eq!(id.len(), 32, "session id should be 32 hex chars");

    let (status, body) = server.get(&format!("/sessions/{id}")).await?;
    assert_eq!(status, 200);
    assert_eq!(body["session_id"], id.as_str());
    assert_eq!(body["run_state"], "idle");
    assert_eq!(body["model_loaded"], false);

    let (status, body) = server.get("/status").await?;
    assert_eq!(status, 200);
    assert_eq!(body["session_count"], 1);
    assert_eq!(body["sessions"][0]["session_id"], id.as_str());

    let (status, body) = server.delete(&format!("/sessions/{id}")).await?;
    assert_eq!(status, 200);
    assert_eq!(body["dropped"], true);

    let (status, body) = server.get(&format!("/sessions/{id}")).await?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "unknown_session");
    assert!(server.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_ids_are_never_reused() -> Result<()> {
    let server = spawn_server().await?;
    let mut seen = std::collections::HashSet::new();
    for _ in 0..20 {
        let id = server.load().await?;
        server.delete(&format!("/sessions/{id}")).await?;
        assert!(seen.insert(id), "duplicate session id");
    }
    Ok(())
}

#[tokio::test]
async fn test_unknown_session_is_404_everywhere() -> Result<()> {
    let server = spawn_server().await?;
    for path in ["/sessions/nope/run", "/sessions/nope/reset", "/sessions/nope/get_param"] {
        let body = serde_json::json!({ "start": 0, "end": 1, "steps": 2, "param": "k1" });
        let (status, body) = server.post(path, body).await?;
        assert_eq!(status, 404, "{path}");
        assert_eq!(body["error"], "unknown_session", "{path}");
    }
    let (status, _) = server.delete("/sessions/nope").await?;
    assert_eq!(status, 404);
    Ok(())
}

#[tokio::test]
async fn test_session_limit() -> Result<()> {
    let settings = SessionSettings {
        max_sessions: 1,
        ..SessionSettings::default()
    };
    let server = spawn_server_with(settings).await?;
    server.load().await?;

    let (status, body) = server.post("/sessions", Value::Null).await?;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "session_limit");
    Ok(())
}

#[tokio::test]
async fn test_reset_drops_the_model() -> Result<()> {
    let server = spawn_server().await?;
    let id = server.loaded_session().await?;

    let (status, _) = server.post(&format!("/sessions/{id}/reset"), Value::Null).await?;
    assert_eq!(status, 200);

    let (status, body) = server
        .post(&format!("/sessions/{id}/get_param"), serde_json::json!({ "param": "k1" }))
        .await?;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "model_not_loaded");
    assert_eq!(server.run_state(&id).await?, "idle");
    Ok(())
}
