//! Shared test doubles for consumer tests

#![allow(dead_code)]

pub mod queue_utils;

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use sqs_consumer::{
    gateway::GatewayResult, GatewayError, QueueAddress, QueueGateway, RawMessage,
    ReceiveSettings,
};

/// Gateway call recorded by [`MockGateway`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Resolve(String),
    List(String),
    Receive(QueueAddress),
    Acknowledge {
        address: QueueAddress,
        ack_token: String,
    },
    Release {
        address: QueueAddress,
        ack_token: String,
    },
}

/// Scripted outcome of one receive call
pub enum Batch {
    Messages(Vec<RawMessage>),
    Failure,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, QueueAddress>,
    prefixes: HashMap<String, Vec<QueueAddress>>,
    batches: HashMap<QueueAddress, VecDeque<Batch>>,
    calls: Vec<Call>,
    fail_resolve: bool,
    fail_discovery: bool,
    fail_acknowledge: bool,
    fail_release: bool,
}

/// In-memory gateway that replays scripted batches and records every call
///
/// Once a queue's script is exhausted, receives behave like a long poll that
/// found nothing.
#[derive(Default, Clone)]
pub struct MockGateway {
    state: Arc<Mutex<State>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a queue and returns its address
    pub fn add_queue(&self, name: &str) -> QueueAddress {
        let address = queue_address(name);
        self.state
            .lock()
            .unwrap()
            .queues
            .insert(name.to_string(), address.clone());
        address
    }

    /// Sets the addresses returned for a prefix
    pub fn add_prefix(&self, prefix: &str, addresses: Vec<QueueAddress>) {
        self.state
            .lock()
            .unwrap()
            .prefixes
            .insert(prefix.to_string(), addresses);
    }

    /// Queues a batch of messages for the next receive on `address`
    pub fn push_batch(&self, address: &QueueAddress, messages: Vec<RawMessage>) {
        self.push(address, Batch::Messages(messages));
    }

    /// Makes the next receive on `address` fail
    pub fn push_receive_failure(&self, address: &QueueAddress) {
        self.push(address, Batch::Failure);
    }

    fn push(&self, address: &QueueAddress, batch: Batch) {
        self.state
            .lock()
            .unwrap()
            .batches
            .entry(address.clone())
            .or_default()
            .push_back(batch);
    }

    pub fn fail_resolve(&self) {
        self.state.lock().unwrap().fail_resolve = true;
    }

    pub fn fail_discovery(&self) {
        self.state.lock().unwrap().fail_discovery = true;
    }

    pub fn fail_acknowledge(&self) {
        self.state.lock().unwrap().fail_acknowledge = true;
    }

    pub fn fail_release(&self) {
        self.state.lock().unwrap().fail_release = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn acknowledged(&self) -> Vec<(QueueAddress, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Acknowledge { address, ack_token } => Some((address, ack_token)),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<(QueueAddress, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Release { address, ack_token } => Some((address, ack_token)),
                _ => None,
            })
            .collect()
    }

    pub fn receive_count(&self, address: &QueueAddress) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Receive(a) if a == address))
            .count()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl QueueGateway for MockGateway {
    async fn resolve_address(&self, name: &str) -> GatewayResult<QueueAddress> {
        self.record(Call::Resolve(name.to_string()));

        let state = self.state.lock().unwrap();
        match state.queues.get(name) {
            Some(address) if !state.fail_resolve => Ok(address.clone()),
            _ => Err(GatewayError::AddressResolution {
                name: name.to_string(),
                source: "queue does not exist".into(),
            }),
        }
    }

    async fn list_addresses(&self, prefix: &str) -> GatewayResult<Vec<QueueAddress>> {
        self.record(Call::List(prefix.to_string()));

        let state = self.state.lock().unwrap();
        if state.fail_discovery {
            return Err(GatewayError::Discovery {
                prefix: prefix.to_string(),
                source: "access denied".into(),
            });
        }
        Ok(state.prefixes.get(prefix).cloned().unwrap_or_default())
    }

    async fn receive_batch(
        &self,
        address: &QueueAddress,
        _settings: ReceiveSettings,
    ) -> GatewayResult<Vec<RawMessage>> {
        self.record(Call::Receive(address.clone()));

        let next = self
            .state
            .lock()
            .unwrap()
            .batches
            .get_mut(address)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Batch::Messages(messages)) => Ok(messages),
            Some(Batch::Failure) => Err(GatewayError::Receive {
                address: address.to_string(),
                source: "connection reset".into(),
            }),
            None => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn acknowledge(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()> {
        self.record(Call::Acknowledge {
            address: address.clone(),
            ack_token: ack_token.to_string(),
        });

        if self.state.lock().unwrap().fail_acknowledge {
            return Err(GatewayError::Acknowledge {
                address: address.to_string(),
                source: "receipt handle is invalid".into(),
            });
        }
        Ok(())
    }

    async fn release(&self, address: &QueueAddress, ack_token: &str) -> GatewayResult<()> {
        self.record(Call::Release {
            address: address.clone(),
            ack_token: ack_token.to_string(),
        });

        if self.state.lock().unwrap().fail_release {
            return Err(GatewayError::Release {
                address: address.to_string(),
                source: "receipt handle is invalid".into(),
            });
        }
        Ok(())
    }
}

/// Address in the same shape SQS returns
pub fn queue_address(name: &str) -> QueueAddress {
    QueueAddress::new(format!("http://localhost:4566/000000000000/{name}"))
}

/// Raw message with a direct body and no attributes
pub fn raw_message(id: &str, body: &str) -> RawMessage {
    RawMessage {
        body: body.to_string(),
        ack_token: format!("receipt-{id}"),
        message_id: id.to_string(),
        ..RawMessage::default()
    }
}

/// Polls `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition was not met in time");
}
