use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use mapposter_theme::{
    ContentApi, EditingSession, GitHubContentApi, PutRequest, RemoteCredentials,
    RemoteDeleteOutcome, RemoteError, RemoteThemeSync, SaveOutcome, Theme, ThemePersistence,
    ThemeStore, VersionToken, WriteKind,
};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Fetch(String),
    Put {
        path: String,
        version: Option<String>,
    },
    Delete {
        path: String,
        version: String,
    },
}

#[derive(Default)]
struct FakeState {
    files: HashMap<String, (Vec<u8>, String)>,
    calls: Vec<Call>,
    next_sha: usize,
    fail_network: bool,
}

#[derive(Clone, Default)]
struct FakeContentApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeContentApi {
    fn calls(&self) -> Vec<Call> {
        self.state.lock().expect("state lock").calls.clone()
    }

    fn set_sha(&self, path: &str, sha: &str) {
        let mut state = self.state.lock().expect("state lock");
        if let Some(entry) = state.files.get_mut(path) {
            entry.1 = sha.to_string();
        }
    }

    fn fail_network(&self) {
        self.state.lock().expect("state lock").fail_network = true;
    }
}

#[async_trait]
impl ContentApi for FakeContentApi {
    async fn fetch_version(
        &self,
        _token: &str,
        path: &str,
    ) -> Result<Option<VersionToken>, RemoteError> {
        let mut state = self.state.lock().expect("state lock");
        state.calls.push(Call::Fetch(path.to_string()));
        if state.fail_network {
            return Err(RemoteError::Network("connection refused".to_string()));
        }
        Ok(state
            .files
            .get(path)
            .map(|(_, sha)| VersionToken(sha.clone())))
    }

    async fn put(
        &self,
        _token: &str,
        path: &str,
        request: PutRequest<'_>,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().expect("state lock");
        state.calls.push(Call::Put {
            path: path.to_string(),
            version: request.version.map(|version| version.0.clone()),
        });
        let current = state.files.get(path).map(|(_, sha)| sha.clone());
        if current.as_deref() != request.version.map(|version| version.0.as_str()) {
            return Err(RemoteError::Conflict("sha does not match".to_string()));
        }
        state.next_sha += 1;
        let sha = format!("sha-{}", state.next_sha);
        state
            .files
            .insert(path.to_string(), (request.content.to_vec(), sha));
        Ok(())
    }

    async fn delete(
        &self,
        _token: &str,
        path: &str,
        _commit_message: &str,
        version: &VersionToken,
    ) -> Result<RemoteDeleteOutcome, RemoteError> {
        let mut state = self.state.lock().expect("state lock");
        state.calls.push(Call::Delete {
            path: path.to_string(),
            version: version.0.clone(),
        });
        Ok(match state.files.remove(path) {
            Some(_) => RemoteDeleteOutcome::Deleted,
            None => RemoteDeleteOutcome::NotFound,
        })
    }
}

fn credentials() -> RemoteCredentials {
    RemoteCredentials::new(Some("test-token".to_string()))
}

#[tokio::test]
async fn push_creates_then_updates_with_fetched_version() {
    let api = FakeContentApi::default();
    let sync = RemoteThemeSync::new(api.clone(), credentials());
    let theme = Theme::default();

    let first = sync.push(&theme, "noir").await.expect("create succeeds");
    assert_eq!(first.kind, WriteKind::Created);
    let second = sync.push(&theme, "noir").await.expect("update succeeds");
    assert_eq!(second.kind, WriteKind::Updated);

    assert_eq!(
        api.calls(),
        vec![
            Call::Fetch("themes/noir.json".to_string()),
            Call::Put {
                path: "themes/noir.json".to_string(),
                version: None
            },
            Call::Fetch("themes/noir.json".to_string()),
            Call::Put {
                path: "themes/noir.json".to_string(),
                version: Some("sha-1".to_string())
            },
        ]
    );
}

#[tokio::test]
async fn missing_credentials_fail_without_network_calls() {
    let api = FakeContentApi::default();
    let sync = RemoteThemeSync::new(api.clone(), RemoteCredentials::new(None));

    let push = sync.push(&Theme::default(), "noir").await;
    assert_eq!(push, Err(RemoteError::CredentialMissing));
    let delete = sync.delete("noir").await;
    assert_eq!(delete, Err(RemoteError::CredentialMissing));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn stale_version_is_reported_as_conflict_without_retry() {
    let api = FakeContentApi::default();
    let sync = RemoteThemeSync::new(api.clone(), credentials());
    sync.push(&Theme::default(), "noir")
        .await
        .expect("create succeeds");

    // Another writer changes the version between our fetch and our put.
    struct RacingApi {
        inner: FakeContentApi,
    }

    #[async_trait]
    impl ContentApi for RacingApi {
        async fn fetch_version(
            &self,
            token: &str,
            path: &str,
        ) -> Result<Option<VersionToken>, RemoteError> {
            let version = self.inner.fetch_version(token, path).await;
            self.inner.set_sha(path, "sha-concurrent");
            version
        }

        async fn put(
            &self,
            token: &str,
            path: &str,
            request: PutRequest<'_>,
        ) -> Result<(), RemoteError> {
            self.inner.put(token, path, request).await
        }

        async fn delete(
            &self,
            token: &str,
            path: &str,
            commit_message: &str,
            version: &VersionToken,
        ) -> Result<RemoteDeleteOutcome, RemoteError> {
            self.inner.delete(token, path, commit_message, version).await
        }
    }

    let racing = RemoteThemeSync::new(RacingApi { inner: api.clone() }, credentials());
    let result = racing.push(&Theme::default(), "noir").await;
    assert!(matches!(result, Err(RemoteError::Conflict(_))));
    let puts = api
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Put { .. }))
        .count();
    assert_eq!(puts, 2, "conflict must not be retried");
}

#[tokio::test]
async fn delete_reports_not_found_then_deletes_with_version() {
    let api = FakeContentApi::default();
    let sync = RemoteThemeSync::new(api.clone(), credentials());

    assert_eq!(
        sync.delete("noir").await,
        Ok(RemoteDeleteOutcome::NotFound)
    );
    sync.push(&Theme::default(), "noir")
        .await
        .expect("create succeeds");
    assert_eq!(sync.delete("noir").await, Ok(RemoteDeleteOutcome::Deleted));
    assert!(api.calls().contains(&Call::Delete {
        path: "themes/noir.json".to_string(),
        version: "sha-1".to_string()
    }));
}

#[tokio::test]
async fn persistence_falls_back_to_local_when_remote_fails(
) -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let api = FakeContentApi::default();
    api.fail_network();
    let persistence = ThemePersistence::new(
        ThemeStore::new(temp_dir.path()),
        Some(RemoteThemeSync::new(api, credentials())),
    );
    let mut session = EditingSession::from_scratch();
    session.apply_palette("Text: 0.2, 0.05, 30")?;

    let outcome = persistence
        .save_session(&mut session, "warm_earth", None)
        .await;
    match &outcome {
        SaveOutcome::LocalOnly { remote_error, .. } => {
            assert!(matches!(remote_error, RemoteError::Network(_)));
        }
        other => panic!("expected local-only outcome, got {other:?}"),
    }
    assert!(!session.is_dirty());
    let stored = persistence.store().load("warm_earth");
    assert_eq!(stored.name, "Warm Earth");
    assert_eq!(stored, session.build_full_theme("warm_earth", None));
    Ok(())
}

#[tokio::test]
async fn persistence_syncs_remote_and_local_copies() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let api = FakeContentApi::default();
    let persistence = ThemePersistence::new(
        ThemeStore::new(temp_dir.path()),
        Some(RemoteThemeSync::new(api.clone(), credentials())),
    );

    let outcome = persistence.save(&Theme::default(), "noir").await;
    assert!(matches!(
        outcome,
        SaveOutcome::Synced { local: Ok(_), .. }
    ));
    assert_eq!(persistence.store().list_available(), vec!["noir"]);

    let report = persistence.delete("noir").await;
    assert!(report.is_deleted());
    assert_eq!(report.remote, Ok(RemoteDeleteOutcome::Deleted));
    assert!(persistence.store().list_available().is_empty());
    Ok(())
}

#[tokio::test]
async fn persistence_without_remote_is_local_only() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = tempdir()?;
    let persistence: ThemePersistence<FakeContentApi> =
        ThemePersistence::new(ThemeStore::new(temp_dir.path()), None);

    let outcome = persistence.save(&Theme::default(), "noir").await;
    assert!(matches!(
        outcome,
        SaveOutcome::LocalOnly {
            remote_error: RemoteError::CredentialMissing,
            ..
        }
    ));
    let report = persistence.delete("noir").await;
    assert!(report.is_deleted());
    assert_eq!(report.remote, Err(RemoteError::CredentialMissing));
    Ok(())
}

struct ScriptedResponse {
    status_line: &'static str,
    body: String,
}

fn spawn_scripted_server(responses: Vec<ScriptedResponse>) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind local test server");
    let address = listener.local_addr().expect("server local addr");
    let captured = Arc::new(Mutex::new(Vec::new()));
    let captured_thread = Arc::clone(&captured);

    thread::spawn(move || {
        for response in responses {
            let Ok((mut socket, _)) = listener.accept() else {
                return;
            };
            socket
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("set read timeout");
            let request = read_http_request(&mut socket);
            captured_thread.lock().expect("capture lock").push(request);

            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                response.status_line,
                response.body.len(),
                response.body
            );
            socket.write_all(reply.as_bytes()).expect("write response");
            let _ = socket.flush();
        }
    });

    (format!("http://{address}"), captured)
}

fn read_http_request(socket: &mut std::net::TcpStream) -> String {
    let mut raw = Vec::new();
    let mut buffer = [0_u8; 4096];
    loop {
        let Ok(read_len) = socket.read(&mut buffer) else {
            break;
        };
        if read_len == 0 {
            break;
        }
        raw.extend_from_slice(&buffer[..read_len]);
        let text = String::from_utf8_lossy(&raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        if raw.len() >= header_end + 4 + content_length {
            break;
        }
    }
    String::from_utf8_lossy(&raw).to_string()
}

#[tokio::test]
async fn github_api_sends_sha_when_updating_existing_file() {
    let (base_url, captured) = spawn_scripted_server(vec![
        ScriptedResponse {
            status_line: "200 OK",
            body: r#"{"sha":"abc123","path":"themes/noir.json"}"#.to_string(),
        },
        ScriptedResponse {
            status_line: "200 OK",
            body: r#"{"content":{"sha":"def456"}}"#.to_string(),
        },
    ]);
    let api = GitHubContentApi::new(base_url, "owner/repo", None, Duration::from_secs(5))
        .expect("build api");
    let sync = RemoteThemeSync::new(api, credentials());

    let receipt = sync
        .push(&Theme::default(), "noir")
        .await
        .expect("push succeeds");
    assert_eq!(receipt.kind, WriteKind::Updated);

    let requests = captured.lock().expect("capture lock").clone();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /repos/owner/repo/contents/themes/noir.json"));
    assert!(requests[0].to_ascii_lowercase().contains("authorization: bearer test-token"));
    assert!(requests[1].starts_with("PUT /repos/owner/repo/contents/themes/noir.json"));
    assert!(requests[1].contains("\"sha\":\"abc123\""));
    assert!(requests[1].contains("Add/update theme: noir"));
}

#[tokio::test]
async fn github_api_maps_missing_file_and_conflict() {
    let (base_url, _captured) = spawn_scripted_server(vec![
        ScriptedResponse {
            status_line: "404 Not Found",
            body: r#"{"message":"Not Found"}"#.to_string(),
        },
        ScriptedResponse {
            status_line: "409 Conflict",
            body: r#"{"message":"themes/noir.json does not match abc123"}"#.to_string(),
        },
    ]);
    let api = GitHubContentApi::new(base_url, "owner/repo", None, Duration::from_secs(5))
        .expect("build api");
    let sync = RemoteThemeSync::new(api, credentials());

    let result = sync.push(&Theme::default(), "noir").await;
    assert_eq!(
        result,
        Err(RemoteError::Conflict(
            "themes/noir.json does not match abc123".to_string()
        ))
    );
}

#[tokio::test]
async fn github_delete_treats_file_removed_after_fetch_as_not_found() {
    let (base_url, captured) = spawn_scripted_server(vec![
        ScriptedResponse {
            status_line: "200 OK",
            body: r#"{"sha":"abc123","path":"themes/noir.json"}"#.to_string(),
        },
        ScriptedResponse {
            status_line: "404 Not Found",
            body: r#"{"message":"Not Found"}"#.to_string(),
        },
    ]);
    let api = GitHubContentApi::new(base_url, "owner/repo", None, Duration::from_secs(5))
        .expect("build api");
    let sync = RemoteThemeSync::new(api, credentials());

    assert_eq!(sync.delete("noir").await, Ok(RemoteDeleteOutcome::NotFound));

    let requests = captured.lock().expect("capture lock").clone();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].starts_with("DELETE /repos/owner/repo/contents/themes/noir.json"));
    assert!(requests[1].contains("\"sha\":\"abc123\""));
    assert!(requests[1].contains("Delete theme: noir"));
}
