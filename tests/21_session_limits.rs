mod common;

use anyhow::Result;
use reqwest::StatusCode;

// Sole test in this binary: the session-issuance tier (10 per 15 minutes)
// needs the whole budget to itself.
#[tokio::test]
async fn session_tier_denies_eleventh_issuance() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let mut statuses = Vec::new();
    for _ in 0..11 {
        let res = client
            .post(format!("{}/api/auth/session", server.base_url))
            .send()
            .await?;
        statuses.push(res.status());
    }

    assert!(
        statuses[..10].iter().all(|s| *s == StatusCode::CREATED),
        "first 10 issuances should be admitted: {:?}",
        statuses
    );
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
    Ok(())
}
