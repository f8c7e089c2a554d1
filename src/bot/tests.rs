//! End-to-end tests: config in, replayed books through the whole pipeline.

use super::*;
use rust_decimal::Decimal;
use std::io::Write;
use tempfile::NamedTempFile;

fn yaml(storage: &str) -> String {
    format!(
        r#"
app:
  name: replaybot
  env: test

exchanges:
  alpha:
    enabled: true
    taker_fee_bps: 10
    min_notional: 10
    max_position_notional: 1000
  beta:
    enabled: true
    taker_fee_bps: 10
    min_notional: 10
    max_position_notional: 1000

pairs:
  - BTCUSDT

orderbook:
  max_age: 0s

dry_run:
  enabled: true
  start_balance: 2000
  max_slippage_bps: 0
  failure_chance_pct: 0
  seed: 7

{storage}
"#
    )
}

fn replay_frames() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"[
            {"venue":"alpha","instrument":"BTCUSDT","bids":[{"price":"99.9","size":"5"}],"asks":[{"price":"100","size":"5"}],"sequence":1,"delay_ms":0},
            {"venue":"beta","instrument":"BTCUSDT","bids":[{"price":"100.5","size":"5"}],"asks":[{"price":"100.6","size":"5"}],"sequence":1,"delay_ms":0}
        ]"#,
    )
    .unwrap();
    file
}

fn bot_config(yaml: &str, replay: Option<ReplayConfig>) -> BotConfig {
    BotConfig {
        app_config: Config::from_yaml(yaml).unwrap(),
        version: "test".to_string(),
        replay,
    }
}

#[tokio::test]
async fn test_replay_runs_the_full_pipeline() {
    let frames = replay_frames();
    let replay = ReplayConfig {
        path: frames.path().to_path_buf(),
        speed: 1.0,
    };

    let bot = Bot::new(bot_config(&yaml(""), Some(replay))).await.unwrap();
    let stats = bot.run_until(std::future::pending()).await.unwrap();

    assert_eq!(stats.signals, 1);
    assert_eq!(stats.executions, 1);
    assert_eq!(stats.successful_trades, 1);
    // Five units bought at 100.05 and sold at 100.44975.
    assert_eq!(stats.total_pnl, Decimal::new(199875, 5));
}

#[tokio::test]
async fn test_replay_persists_trades_to_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("trades.db");
    let storage = format!(
        "storage:\n  enabled: true\n  path: {}\n",
        db_path.display()
    );

    let frames = replay_frames();
    let replay = ReplayConfig {
        path: frames.path().to_path_buf(),
        speed: 1.0,
    };

    let bot = Bot::new(bot_config(&yaml(&storage), Some(replay))).await.unwrap();
    bot.run_until(std::future::pending()).await.unwrap();

    let store = SqliteTradeStore::new(SqliteTradeStoreConfig::new(db_path.display().to_string()))
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 1);
    let trades = store.get_all().await.unwrap();
    assert_eq!(trades[0].buy_venue, "alpha");
    assert_eq!(trades[0].sell_venue, "beta");
    store.close().await.unwrap();
}

#[tokio::test]
async fn test_replay_forces_dry_run() {
    let live = yaml("").replace("  enabled: true\n  start_balance", "  enabled: false\n  start_balance");
    let frames = replay_frames();
    let replay = ReplayConfig {
        path: frames.path().to_path_buf(),
        speed: 1.0,
    };

    let bot = Bot::new(bot_config(&live, Some(replay))).await.unwrap();
    assert!(bot.engine.is_dry_run());
}

#[tokio::test]
async fn test_missing_replay_file_is_an_error() {
    let replay = ReplayConfig {
        path: "/nonexistent/frames.json".into(),
        speed: 1.0,
    };

    let bot = Bot::new(bot_config(&yaml(""), Some(replay))).await.unwrap();
    let result = bot.run_until(std::future::pending()).await;
    assert!(matches!(result, Err(BotError::Replay(_))));
}

#[tokio::test]
async fn test_requires_two_venues() {
    let single = yaml("").replace("  beta:\n    enabled: true", "  beta:\n    enabled: false");
    let result = Bot::new(bot_config(&single, None)).await;
    assert!(matches!(result, Err(BotError::Config(_))));
}

#[tokio::test]
async fn test_simulated_venues_stop_on_request() {
    let bot = Bot::new(bot_config(&yaml(""), None)).await.unwrap();
    let stats = bot
        .run_until(tokio::time::sleep(std::time::Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(stats.executions, stats.successful_trades + stats.failed_trades);
}
