use std::time::Duration;

use axum::Router;
use chemrisk::config::ScoringConfig;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral loopback port and return settings pointing at it.
pub async fn spawn_backend(router: Router) -> ScoringConfig {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("stub backend runs");
    });

    let base_url = reqwest::Url::parse(&format!("http://{addr}/api")).expect("stub url");
    let mut config = ScoringConfig::new(base_url);
    config.timeout = Some(Duration::from_secs(5));
    config
}
