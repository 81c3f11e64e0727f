use anyhow::Result;
use async_trait::async_trait;
use glasslink_client::runtime::{run_client, run_scan, Job};
use glasslink_core::control::GlassesConfig;
use glasslink_core::transport::{Advertisement, Transport, TransportError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const LEFT: &str = "Even G1_12_L_A1B2C3";
const RIGHT: &str = "Even G1_12_R_A1B2C3";

/// Pretends to be a pair of lenses that acknowledge every content frame.
#[derive(Default)]
struct ScriptedGlasses {
    advertised: Vec<&'static str>,
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    disconnects: Mutex<Vec<String>>,
    subscribers: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
}

impl ScriptedGlasses {
    fn new(advertised: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            advertised: advertised.to_vec(),
            ..Default::default()
        })
    }

    fn writes(&self, command: u8) -> Vec<(String, Vec<u8>)> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, data)| data.first() == Some(&command))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedGlasses {
    type Handle = String;

    async fn scan(&self) -> Result<Vec<Advertisement<String>>, TransportError> {
        Ok(self
            .advertised
            .iter()
            .map(|name| Advertisement {
                name: name.to_string(),
                handle: name.to_string(),
            })
            .collect())
    }

    async fn connect(&self, _handle: &String) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self, handle: &String) -> Result<(), TransportError> {
        self.disconnects.lock().unwrap().push(handle.clone());
        Ok(())
    }

    async fn write(&self, handle: &String, data: &[u8]) -> Result<(), TransportError> {
        self.writes
            .lock()
            .unwrap()
            .push((handle.clone(), data.to_vec()));

        let answer = match data.first() {
            // content and image frames get "order received"
            Some(&cid @ (0x4E | 0x20 | 0x16)) => Some(vec![cid, 0xC9]),
            // heartbeats are echoed
            Some(0x25) => Some(data.to_vec()),
            _ => None,
        };
        if let Some(answer) = answer {
            if let Some(tx) = self.subscribers.lock().unwrap().get(handle) {
                let _ = tx.try_send(answer);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, handle: &String) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().insert(handle.clone(), tx);
        Ok(rx)
    }
}

fn collecting_log() -> (Arc<Mutex<Vec<String>>>, glasslink_client::runtime::LogFn) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    (
        lines,
        Box::new(move |msg| {
            println!("[CLIENT] {msg}");
            sink.lock().unwrap().push(msg);
        }),
    )
}

#[tokio::test(start_paused = true)]
async fn test_send_text_then_disconnect() -> Result<()> {
    let glasses = ScriptedGlasses::new(&[LEFT, "Unrelated Speaker", RIGHT]);
    let (log_lines, log) = collecting_log();
    let (_stop_tx, stop_rx) = watch::channel(false);

    run_client(
        glasses.clone(),
        GlassesConfig::default(),
        Job::Text("Hello from the integration test".to_string()),
        stop_rx,
        log,
    )
    .await?;

    let text = glasses.writes(0x4E);
    assert_eq!(text.len(), 2);
    assert_eq!(text[0].0, LEFT);
    assert_eq!(text[1].0, RIGHT);
    assert_eq!(&text[0].1[9..], b"Hello from the integration test");
    // one-shot sends never heartbeat
    assert!(glasses.writes(0x25).is_empty());

    assert_eq!(*glasses.disconnects.lock().unwrap(), vec![LEFT, RIGHT]);
    let lines = log_lines.lock().unwrap();
    assert!(lines.iter().any(|m| m == "Text delivered"));
    assert_eq!(lines.last().map(String::as_str), Some("Disconnected"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_keep_alive_until_stopped() -> Result<()> {
    let glasses = ScriptedGlasses::new(&[LEFT, RIGHT]);
    let (log_lines, log) = collecting_log();
    let (stop_tx, stop_rx) = watch::channel(false);

    let client = tokio::spawn(run_client(
        glasses.clone(),
        GlassesConfig::default(),
        Job::KeepAlive,
        stop_rx,
        log,
    ));

    // heartbeats at 0s, 8s and 16s
    tokio::time::sleep(Duration::from_secs(20)).await;
    stop_tx.send(true)?;
    client.await??;

    let beats = glasses.writes(0x25);
    assert_eq!(beats.len(), 6);
    assert_eq!(beats[4].1, vec![0x25, 0x02, 0x00, 0x06, 0x00, 0x02]);

    let lines = log_lines.lock().unwrap();
    assert!(lines.iter().any(|m| m.starts_with("Recv from left lens: HeartbeatEcho")));
    assert!(lines.iter().any(|m| m == "Stop requested"));
    assert_eq!(*glasses.disconnects.lock().unwrap(), vec![LEFT, RIGHT]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_scan_attempts() {
    let glasses = ScriptedGlasses::new(&[LEFT]);
    let (log_lines, log) = collecting_log();
    let (_stop_tx, stop_rx) = watch::channel(false);
    let cfg = GlassesConfig {
        scan_timeout: Duration::from_secs(2),
        scan_attempts: 3,
        ..Default::default()
    };

    let result = run_client(glasses.clone(), cfg, Job::KeepAlive, stop_rx, log).await;
    let err = result.expect_err("connect must fail without a right lens");
    assert!(err.to_string().contains("after 3 attempts"));

    let lines = log_lines.lock().unwrap();
    assert_eq!(
        lines.iter().filter(|m| m.starts_with("Attempt")).count(),
        3
    );
    assert!(glasses.writes.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_reports_lenses() -> Result<()> {
    let glasses = ScriptedGlasses::new(&[RIGHT, LEFT]);
    let (log_lines, log) = collecting_log();

    run_scan(glasses, GlassesConfig::default(), log).await?;

    let lines = log_lines.lock().unwrap();
    assert!(lines.contains(&format!("left: {LEFT}")));
    assert!(lines.contains(&format!("right: {RIGHT}")));
    Ok(())
}
