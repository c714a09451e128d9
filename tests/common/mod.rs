use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub data_dir: PathBuf,
    #[allow(dead_code)]
    child: Child,
}

/// Create a throwaway data root with the layout the server validates at
/// startup: dyes.json plus a locales/ directory with two seeded locales.
fn seed_data_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("dye-admin-e2e-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(dir.join("locales")).context("create data layout")?;

    let dyes = json!([
        {"itemID": 5729, "name": "Jet Black", "hex": "#1a1a1a", "category": "rare"},
        {"itemID": 5730, "name": "Snow White", "hex": "#ffffff", "category": "white"}
    ]);
    fs::write(dir.join("dyes.json"), serde_json::to_vec_pretty(&dyes)?)?;

    let en = json!({"dye.5729.name": "Jet Black", "dye.5730.name": "Snow White"});
    fs::write(dir.join("locales/en.json"), serde_json::to_vec_pretty(&en)?)?;

    let de = json!({"dye.5729.name": "Russschwarz", "dye.5730.name": "Schneeweiss"});
    fs::write(dir.join("locales/de.json"), serde_json::to_vec_pretty(&de)?)?;

    Ok(dir)
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let data_dir = seed_data_dir()?;

        // Spawn the already-built binary to keep start fast during tests
        let mut cmd = Command::new("target/debug/dye-admin-api");
        cmd.env("DYE_ADMIN_PORT", port.to_string())
            .env("DYE_ADMIN_DATA_DIR", &data_dir)
            .env_remove("DYE_ADMIN_API_KEY")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            data_dir,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Issue a session token through the public issuance route.
#[allow(dead_code)]
pub async fn issue_session(client: &reqwest::Client, base_url: &str) -> Result<String> {
    let res = client
        .post(format!("{}/api/auth/session", base_url))
        .send()
        .await?;
    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "session issuance failed: {}",
        res.status()
    );

    let body: serde_json::Value = res.json().await?;
    body["data"]["token"]
        .as_str()
        .map(str::to_string)
        .context("token missing from issuance response")
}

/// A schema-valid dye catalog payload for mutation tests.
#[allow(dead_code)]
pub fn valid_catalog() -> serde_json::Value {
    json!([
        {"itemID": 5729, "name": "Jet Black", "hex": "#1a1a1a", "category": "rare"},
        {"itemID": 5731, "name": "Rose Pink", "hex": "#e8a0bf", "category": "red"}
    ])
}
