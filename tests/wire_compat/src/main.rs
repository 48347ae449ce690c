fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use roost_protocol::{
        Artifact, ChunkAck, CompleteUploadRequest, CompleteUploadResponse, ErrorResponse,
        UploadProgress, UploadStatus,
    };
    use roost_transfer::UploadSession;

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON values so that integer-valued floats compare equal.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  rust:    {reserialized}"
        );
        parsed
    }

    // --- Backend messages ---

    #[test]
    fn fixture_chunk_ack() {
        let ack: ChunkAck = roundtrip_test("chunk_ack.json");
        assert_eq!(ack.index, 2);
    }

    #[test]
    fn fixture_complete_upload_request() {
        let req: CompleteUploadRequest = roundtrip_test("complete_upload_request.json");
        assert_eq!(req.video_id, req.session_id);
        assert_eq!(
            serde_json::to_value(CompleteUploadRequest::new(&req.session_id)).unwrap(),
            load_fixture("complete_upload_request.json")
        );
    }

    #[test]
    fn fixture_complete_upload_response() {
        let resp: CompleteUploadResponse = roundtrip_test("complete_upload_response.json");
        // A URL wins over an opaque id.
        assert_eq!(
            resp.into_artifact(),
            Some(Artifact::Url(
                "https://cdn.example.com/videos/18c9f2a1b3e-4f0a9c2d7e1b.mp4".into()
            ))
        );
    }

    #[test]
    fn fixture_error_response() {
        let _: ErrorResponse = roundtrip_test("error_response.json");
        let body = load_fixture("error_response.json").to_string();
        assert_eq!(
            ErrorResponse::message_from_body(&body),
            "chunk index 9 exceeds totalChunks 3"
        );
    }

    // --- Persisted state ---

    #[test]
    fn fixture_upload_progress() {
        let progress: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(progress.status, UploadStatus::Uploading);
        assert!(progress.error.is_empty());
    }

    #[test]
    fn fixture_upload_session_failed() {
        let session: UploadSession = roundtrip_test("upload_session.json");
        session.validate().unwrap();
        assert_eq!(session.status(), UploadStatus::Failed);
        assert_eq!(session.next_pending_index(), Some(2));
        assert_eq!(session.transferred_bytes(), 10 * 1024 * 1024);
        assert_eq!(session.source(), Some("/home/user/Videos/clip.mp4"));

        let progress = session.progress();
        assert_eq!(progress.acknowledged_chunks, 2);
        assert_eq!(progress.created_at, "2026-01-05T10:00:00+00:00");
        assert_eq!(progress.error, "network failure: connection reset by peer");
    }

    #[test]
    fn fixture_upload_session_completed() {
        let session: UploadSession = roundtrip_test("upload_session_completed.json");
        session.validate().unwrap();
        assert!(session.is_complete());
        assert_eq!(
            session.artifact(),
            Some(&Artifact::Url(
                "https://cdn.example.com/videos/18c9f2a1b3e-4f0a9c2d7e1b.mp4".into()
            ))
        );
    }

    #[test]
    fn session_from_older_record_without_retries() {
        let mut value = load_fixture("upload_session.json");
        let obj = value.as_object_mut().unwrap();
        obj.remove("retries");
        obj.remove("error");
        obj.remove("source");
        let session: UploadSession = serde_json::from_value(value).unwrap();
        assert_eq!(session.retries(), 0);
        assert_eq!(session.error(), None);
    }
}
