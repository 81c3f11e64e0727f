//! In-memory transport for session tests.

use super::{Advertisement, Transport, TransportError};
use crate::proto::{Command, RESPONSE_ORDER_RECEIVED};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

pub(crate) const LEFT: &str = "Even G1_7_L_57F0A1";
pub(crate) const RIGHT: &str = "Even G1_7_R_57F0A1";

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub advertised: Vec<String>,
    pub scan_calls: usize,
    pub connect_calls: Vec<String>,
    pub disconnect_calls: Vec<String>,
    pub writes: Vec<(String, Vec<u8>)>,
    pub auto_ack: bool,
    pub silent: HashSet<String>,
    pub fail_connect: HashSet<String>,
    pub hang_connect: HashSet<String>,
    subscribers: HashMap<String, mpsc::Sender<Vec<u8>>>,
}

/// Records every call; optionally answers content frames like a lens would.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new(advertised: &[&str]) -> Self {
        let transport = Self::default();
        transport.state().advertised = advertised.iter().map(|s| s.to_string()).collect();
        transport
    }

    pub fn pair() -> Self {
        Self::new(&[LEFT, RIGHT])
    }

    pub fn with_auto_ack(self) -> Self {
        self.state().auto_ack = true;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn writes_to(&self, name: &str) -> Vec<Vec<u8>> {
        self.state()
            .writes
            .iter()
            .filter(|(target, _)| target == name)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Frames of the given command, in write order, with their target.
    pub fn writes_of(&self, command: Command) -> Vec<(String, Vec<u8>)> {
        self.state()
            .writes
            .iter()
            .filter(|(_, data)| data.first() == Some(&command.id()))
            .cloned()
            .collect()
    }

    pub fn notify(&self, name: &str, data: &[u8]) {
        if let Some(tx) = self.state().subscribers.get(name) {
            tx.try_send(data.to_vec()).unwrap();
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = String;

    async fn scan(&self) -> Result<Vec<Advertisement<String>>, TransportError> {
        let mut state = self.state();
        state.scan_calls += 1;
        Ok(state
            .advertised
            .iter()
            .map(|name| Advertisement {
                name: name.clone(),
                handle: name.clone(),
            })
            .collect())
    }

    async fn connect(&self, handle: &String) -> Result<(), TransportError> {
        let (fail, hang) = {
            let mut state = self.state();
            state.connect_calls.push(handle.clone());
            (
                state.fail_connect.contains(handle),
                state.hang_connect.contains(handle),
            )
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(TransportError::Backend("connection refused".into()));
        }
        Ok(())
    }

    async fn disconnect(&self, handle: &String) -> Result<(), TransportError> {
        let mut state = self.state();
        state.disconnect_calls.push(handle.clone());
        state.subscribers.remove(handle);
        Ok(())
    }

    async fn write(&self, handle: &String, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        state.writes.push((handle.clone(), data.to_vec()));

        if !state.auto_ack || state.silent.contains(handle) {
            return Ok(());
        }
        let answers = matches!(
            data.first().copied().and_then(Command::from_byte),
            Some(Command::Text | Command::BmpEnd | Command::BmpCrc)
        );
        if answers {
            if let Some(tx) = state.subscribers.get(handle) {
                let _ = tx.try_send(vec![data[0], RESPONSE_ORDER_RECEIVED]);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, handle: &String) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let (tx, rx) = mpsc::channel(32);
        self.state().subscribers.insert(handle.clone(), tx);
        Ok(rx)
    }
}
