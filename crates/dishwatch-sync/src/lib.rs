use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{info, warn};

/// Where the database snapshot lives remotely: a contents-style JSON API
/// (GitHub layout) addressed by repo + path, authenticated with a bearer
/// token.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub api_base: String,
    pub repo: String,
    pub path: String,
    pub token: String,
}

/// Best-effort snapshot client. Downloads the database file before first
/// use and uploads it after each submission. There is no transactional
/// guarantee between the local write and the upload; callers log and
/// swallow upload errors.
pub struct SyncClient {
    http: reqwest::Client,
    cfg: SyncConfig,
    state: Mutex<SyncState>,
}

#[derive(Default)]
struct SyncState {
    /// Blob sha of the remote file, required by the API to replace it.
    blob_sha: Option<String>,
    /// SHA-256 of the last content we saw; unchanged content skips the upload.
    last_digest: Option<String>,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    content: UploadedContent,
}

#[derive(Deserialize)]
struct UploadedContent {
    sha: String,
}

impl SyncClient {
    pub fn new(http: reqwest::Client, cfg: SyncConfig) -> Self {
        Self {
            http,
            cfg,
            state: Mutex::new(SyncState::default()),
        }
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.cfg.api_base.trim_end_matches('/'),
            self.cfg.repo,
            self.cfg.path
        )
    }

    /// Fetch the remote snapshot into `dest`. Returns false when the
    /// remote has no snapshot yet (first run), true when a file was
    /// written.
    pub async fn download_snapshot(&self, dest: &Path) -> Result<bool> {
        let resp = self
            .http
            .get(self.contents_url())
            .bearer_auth(&self.cfg.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            info!("No remote snapshot yet, starting fresh");
            return Ok(false);
        }
        if !resp.status().is_success() {
            bail!("snapshot download failed: {}", resp.status());
        }

        let body: ContentsResponse = resp.json().await?;
        let bytes = decode_content(&body.content)?;

        fs::write(dest, &bytes).await?;
        // A -wal/-shm pair left over from a previous run would be
        // replayed over the restored bytes on open.
        remove_sidecars(dest).await?;

        let mut state = self.lock_state()?;
        state.blob_sha = Some(body.sha);
        state.last_digest = Some(digest(&bytes));

        info!("Downloaded snapshot ({} bytes) to {}", bytes.len(), dest.display());
        Ok(true)
    }

    /// Push the local file to the remote store. Returns false when the
    /// content is unchanged since the last download/upload and the push
    /// was skipped.
    pub async fn upload_snapshot(&self, src: &Path) -> Result<bool> {
        let bytes = fs::read(src).await?;
        let new_digest = digest(&bytes);

        let sha = {
            let state = self.lock_state()?;
            if state.last_digest.as_deref() == Some(new_digest.as_str()) {
                return Ok(false);
            }
            state.blob_sha.clone()
        };

        let req = UploadRequest {
            message: "dishwatch: update report snapshot",
            content: B64.encode(&bytes),
            sha,
        };

        let resp = self
            .http
            .put(self.contents_url())
            .bearer_auth(&self.cfg.token)
            .header("Accept", "application/vnd.github+json")
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("snapshot upload failed ({}): {}", status, body);
        }

        let body: UploadResponse = resp.json().await?;

        let mut state = self.lock_state()?;
        state.blob_sha = Some(body.content.sha);
        state.last_digest = Some(new_digest);

        info!("Uploaded snapshot ({} bytes)", bytes.len());
        Ok(true)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, SyncState>> {
        self.state
            .lock()
            .map_err(|e| anyhow::anyhow!("sync state lock poisoned: {}", e))
    }
}

/// Contents APIs wrap base64 bodies at 60 columns; strip whitespace
/// before decoding.
fn decode_content(raw: &str) -> Result<Vec<u8>> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(B64.decode(compact)?)
}

/// Delete the SQLite sidecar files next to a restored snapshot.
async fn remove_sidecars(db_path: &Path) -> Result<()> {
    for suffix in ["-wal", "-shm"] {
        let mut name = db_path.as_os_str().to_owned();
        name.push(suffix);
        let sidecar = std::path::PathBuf::from(name);
        match fs::remove_file(&sidecar).await {
            Ok(()) => warn!("Removed stale sidecar {}", sidecar.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Upload after a local write and report whether the remote is in sync.
/// Failures are logged and never fail the submission that triggered them.
pub async fn push_after_write(client: &SyncClient, db_path: &Path) -> bool {
    match client.upload_snapshot(db_path).await {
        Ok(true) => true,
        Ok(false) => {
            info!("Snapshot unchanged, upload skipped");
            true
        }
        Err(e) => {
            warn!("Snapshot upload failed (report still saved locally): {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    /// One-shot contents-API stand-in: serves the canned responses in
    /// order, one connection each, and hands back the raw requests it
    /// saw. Connections are closed after each response, so the client
    /// opens a fresh one per call.
    async fn canned_server(responses: Vec<String>) -> (SocketAddr, JoinHandle<Vec<String>>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut captured = Vec::new();
            for response in responses {
                let (mut sock, _) = listener.accept().await.unwrap();
                captured.push(read_request(&mut sock).await);
                sock.write_all(response.as_bytes()).await.unwrap();
                sock.shutdown().await.unwrap();
            }
            captured
        });

        (addr, handle)
    }

    async fn read_request(sock: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut tmp = [0u8; 1024];
        loop {
            let n = sock.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);

            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_string();
                let content_length = headers
                    .lines()
                    .find(|l| l.to_ascii_lowercase().starts_with("content-length:"))
                    .and_then(|l| l.split(':').nth(1))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);

                while buf.len() < pos + 4 + content_length {
                    let n = sock.read(&mut tmp).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&tmp[..n]);
                }
                break;
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    fn contents_response(bytes: &[u8], sha: &str) -> String {
        http_response(
            "200 OK",
            &format!(r#"{{"content": "{}", "sha": "{}"}}"#, B64.encode(bytes), sha),
        )
    }

    fn client_for(addr: SocketAddr) -> SyncClient {
        SyncClient::new(
            reqwest::Client::new(),
            SyncConfig {
                api_base: format!("http://{}", addr),
                repo: "dining/reports".into(),
                path: "missing_menu.db".into(),
                token: "test-token".into(),
            },
        )
    }

    #[tokio::test]
    async fn missing_remote_snapshot_is_a_fresh_start() {
        let (addr, server) = canned_server(vec![http_response(
            "404 Not Found",
            r#"{"message": "Not Found"}"#,
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing_menu.db");

        let client = client_for(addr);
        assert!(!client.download_snapshot(&dest).await.unwrap());
        assert!(!dest.exists());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn download_restores_bytes_and_removes_stale_sidecars() {
        let (addr, server) =
            canned_server(vec![contents_response(b"remote db bytes", "sha-1")]).await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing_menu.db");
        let wal = dir.path().join("missing_menu.db-wal");
        let shm = dir.path().join("missing_menu.db-shm");
        std::fs::write(&dest, b"old local bytes").unwrap();
        std::fs::write(&wal, b"stale wal frames").unwrap();
        std::fs::write(&shm, b"stale shm index").unwrap();

        let client = client_for(addr);
        assert!(client.download_snapshot(&dest).await.unwrap());

        assert_eq!(std::fs::read(&dest).unwrap(), b"remote db bytes");
        assert!(!wal.exists());
        assert!(!shm.exists());

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /repos/dining/reports/contents/missing_menu.db "));
        assert!(requests[0].contains("authorization: Bearer test-token")
            || requests[0].contains("Authorization: Bearer test-token"));
    }

    #[tokio::test]
    async fn upload_threads_blob_sha_from_download() {
        let (addr, server) = canned_server(vec![
            contents_response(b"version one", "sha-1"),
            http_response("200 OK", r#"{"content": {"sha": "sha-2"}}"#),
        ])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_menu.db");

        let client = client_for(addr);
        client.download_snapshot(&path).await.unwrap();

        // Local write since the download: the upload must go through
        // and carry the downloaded blob sha.
        std::fs::write(&path, b"version two").unwrap();
        assert!(client.upload_snapshot(&path).await.unwrap());

        let requests = server.await.unwrap();
        let put = &requests[1];
        assert!(put.starts_with("PUT /repos/dining/reports/contents/missing_menu.db "));
        assert!(put.contains(r#""sha":"sha-1""#));
        assert!(put.contains(&B64.encode(b"version two")));
    }

    #[tokio::test]
    async fn first_upload_sends_no_blob_sha() {
        let (addr, server) = canned_server(vec![http_response(
            "201 Created",
            r#"{"content": {"sha": "sha-new"}}"#,
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_menu.db");
        std::fs::write(&path, b"first ever bytes").unwrap();

        let client = client_for(addr);
        assert!(client.upload_snapshot(&path).await.unwrap());

        let requests = server.await.unwrap();
        assert!(!requests[0].contains(r#""sha""#));
    }

    #[tokio::test]
    async fn unchanged_bytes_skip_the_upload() {
        let (addr, server) = canned_server(vec![contents_response(b"same bytes", "sha-1")]).await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_menu.db");

        let client = client_for(addr);
        client.download_snapshot(&path).await.unwrap();

        // Nothing written since the download: no request goes out at
        // all (the server would panic on a second connection).
        assert!(!client.upload_snapshot(&path).await.unwrap());

        let requests = server.await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_reports_unsynced() {
        let (addr, server) = canned_server(vec![http_response(
            "500 Internal Server Error",
            r#"{"message": "boom"}"#,
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_menu.db");
        std::fs::write(&path, b"report bytes").unwrap();

        let client = client_for(addr);
        assert!(!push_after_write(&client, &path).await);

        server.await.unwrap();
    }

    #[test]
    fn decodes_wrapped_base64() {
        let encoded = B64.encode(b"sqlite snapshot bytes");
        // Re-wrap at a short column like the API does
        let wrapped: String = encoded
            .as_bytes()
            .chunks(8)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n");

        assert_eq!(decode_content(&wrapped).unwrap(), b"sqlite snapshot bytes");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(decode_content("@@not base64@@").is_err());
    }

    #[test]
    fn digest_is_stable_hex_sha256() {
        let d = digest(b"abc");
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
