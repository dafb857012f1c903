use async_trait::async_trait;
use cec_remote::{
    cec::{ChannelIo, ChannelSpawner, PersistentChannel},
    config::{CecConfig, DispatchConfig},
    error::RemoteError,
    input::{DigitalInput, ScriptedInputs},
    AppConfig, BroadcastSink, Button, ButtonMonitor, CommandChannel, CommandKind, CommandOutcome,
    Dispatcher, EdgeDetector, Source, WebConfig,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Feed `levels` spaced `spacing` apart and return the indices that fired.
fn fired_indices(levels: &[u8], spacing: Duration, debounce: Duration) -> Vec<usize> {
    let detector = EdgeDetector::new(debounce);
    let start = Instant::now();
    let mut input = DigitalInput::new(Button::On, levels[0] != 0);
    levels
        .iter()
        .enumerate()
        .skip(1)
        .filter_map(|(i, &level)| {
            let now = start + spacing * i as u32;
            detector.poll_at(&mut input, level != 0, now).map(|_| i)
        })
        .collect()
}

/// Spawner whose device answers every line with a completion marker and
/// logs what it was sent.
#[derive(Clone, Default)]
struct FakeDevice {
    received: Arc<Mutex<Vec<String>>>,
    spawns: Arc<AtomicUsize>,
}

#[async_trait]
impl ChannelSpawner for FakeDevice {
    async fn spawn(&self) -> cec_remote::Result<ChannelIo> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let (client, device) = tokio::io::duplex(4096);
        let received = Arc::clone(&self.received);
        tokio::spawn(async move {
            let (reader, mut writer) = tokio::io::split(device);
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                received.lock().unwrap().push(line.clone());
                let reply = format!("TRAFFIC: [ 1] >> {}\n", line);
                if writer.write_all(reply.as_bytes()).await.is_err() {
                    break;
                }
            }
        });
        Ok(ChannelIo::from_stream(client))
    }
}

fn temp_config_path() -> PathBuf {
    std::env::temp_dir().join(format!("cec_remote_{}.json", uuid::Uuid::new_v4()))
}

fn fast_cec_config() -> CecConfig {
    CecConfig {
        warmup_ms: 0,
        ..CecConfig::default()
    }
}

/// Channel that always succeeds without a device.
struct Accept;

#[async_trait]
impl CommandChannel for Accept {
    async fn execute(&self, command: &str) -> CommandOutcome {
        CommandOutcome::Success {
            output: format!("{}\nCEC bus information", command),
        }
    }
}

#[test]
fn test_fast_chatter_yields_one_press() {
    let fired = fired_indices(
        &[0, 0, 1, 1, 0, 1],
        Duration::from_millis(50),
        Duration::from_millis(300),
    );
    assert_eq!(fired, vec![2]);
}

#[test]
fn test_slow_repress_yields_two_presses() {
    let fired = fired_indices(
        &[0, 0, 1, 1, 0, 1],
        Duration::from_millis(200),
        Duration::from_millis(300),
    );
    assert_eq!(fired, vec![2, 5]);
}

#[test]
fn test_button_held_at_boot_is_not_a_press() {
    let fired = fired_indices(&[1, 1, 1, 1], Duration::from_millis(100), Duration::ZERO);
    assert!(fired.is_empty());
}

#[tokio::test]
async fn test_press_reaches_device_and_cooldown_blocks_second() {
    let device = FakeDevice::default();
    let channel = PersistentChannel::new(device.clone(), fast_cec_config());
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(channel), &DispatchConfig::default()));

    let inputs = ScriptedInputs::new();
    let mut monitor = ButtonMonitor::new(inputs.clone(), Duration::from_millis(20), Duration::ZERO);

    // Seed both inputs, then press ON, release, press OFF.
    monitor.sample();
    inputs.push_levels(Button::On, &[1, 0]);
    inputs.push_levels(Button::Off, &[0, 1]);

    let first = monitor.sample();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].button, Button::On);
    let handle = dispatcher.handle_press(first[0]).expect("first press admitted");
    let outcome = handle.await.unwrap();
    assert!(outcome.is_success(), "unexpected outcome: {}", outcome);

    let second = monitor.sample();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].button, Button::Off);
    assert!(dispatcher.handle_press(second[0]).is_none());

    assert_eq!(*device.received.lock().unwrap(), vec!["on 0".to_string()]);
    assert_eq!(device.spawns.load(Ordering::SeqCst), 1);
    dispatcher.shutdown().await;
}

#[tokio::test]
async fn test_queries_share_the_persistent_connection() {
    let device = FakeDevice::default();
    let channel = PersistentChannel::new(device.clone(), fast_cec_config());
    let dispatcher = Dispatcher::new(Arc::new(channel), &DispatchConfig::default());

    for _ in 0..3 {
        let outcome = dispatcher.dispatch(CommandKind::Status, Source::Api).await;
        assert!(outcome.text().contains("pow 0"));
    }
    assert_eq!(device.spawns.load(Ordering::SeqCst), 1);
    assert_eq!(device.received.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_events_published_with_source() {
    let events = BroadcastSink::new(8);
    let mut rx = events.subscribe();
    let dispatcher =
        Dispatcher::new(Arc::new(Accept), &DispatchConfig::default()).with_sink(Arc::new(events));

    dispatcher
        .dispatch(CommandKind::PowerOff, Source::Button(Button::Off))
        .await;
    dispatcher.dispatch(CommandKind::PowerOn, Source::Api).await;

    let first = rx.recv().await.unwrap();
    assert_eq!(first.source, Source::Button(Button::Off));
    assert!(first.outcome.is_success());

    let second = rx.recv().await.unwrap();
    assert_eq!(second.outcome, CommandOutcome::RateLimited);

    let json = serde_json::to_value(&first).unwrap();
    assert_eq!(json["source"]["source"], "button");
    assert_eq!(json["source"]["button"], "off");
    assert_eq!(json["kind"]["kind"], "power_off");
    assert_eq!(json["outcome"]["status"], "success");
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let path = temp_config_path();
    std::fs::write(&path, r#"{"inputs": {"on_pin": 5}, "dispatch": {"cooldown_ms": 500}}"#).unwrap();

    let config = AppConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.inputs.on_pin, 5);
    assert_eq!(config.inputs.off_pin, 27);
    assert_eq!(config.dispatch.cooldown(), Duration::from_millis(500));
    assert_eq!(config.cec.program, "cec-client");
    assert_eq!(config.web.port, cec_remote::DEFAULT_WEB_PORT);
}

#[test]
fn test_config_rejects_shared_pin() {
    let path = temp_config_path();
    std::fs::write(&path, r#"{"inputs": {"on_pin": 27}}"#).unwrap();

    let result = AppConfig::load(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(RemoteError::Config(_))));
}

#[test]
fn test_web_section_from_file() {
    let path = temp_config_path();
    std::fs::write(
        &path,
        r#"{"web": {"host": "127.0.0.1", "port": 8080, "enable_cors": false, "static_path": null}}"#,
    )
    .unwrap();

    let config = AppConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let web: WebConfig = config.web;
    assert_eq!(web.socket_addr().unwrap().to_string(), "127.0.0.1:8080");
    assert!(!web.enable_cors);
    assert!(web.static_path.is_none());
    assert_eq!(web.max_websocket_connections, 16);
}

#[test]
fn test_bad_web_host_rejected() {
    let path = temp_config_path();
    std::fs::write(&path, r#"{"web": {"host": "localhost"}}"#).unwrap();

    let result = AppConfig::load(&path);
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(RemoteError::Config(_))));
}

#[test]
fn test_error_display() {
    let error = RemoteError::setup_error("cec-client not found");
    assert_eq!(error.to_string(), "Setup failure: cec-client not found");

    let error = RemoteError::config_error("bad port");
    assert_eq!(error.to_string(), "Configuration error: bad port");

    let error: RemoteError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
    assert!(matches!(error, RemoteError::Io(_)));
}
