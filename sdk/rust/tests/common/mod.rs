// Scripted in-memory transport shared by the session and workspace tests.

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use themis_core::action::{Action, ActionRequest};
use themis_sdk::{ClientError, FragmentStream, Result, Transport};
use tokio::sync::mpsc;

/// What one `stream` call produces.
pub enum StreamScript {
    /// Yield these items, then end.
    Items(Vec<Result<String, String>>),
    /// Yield these fragments, then stay open until the consumer goes away.
    Hang(Vec<String>),
    /// Fail before any fragment.
    Refuse(String),
}

#[derive(Default)]
pub struct ScriptedTransport {
    streams: Mutex<VecDeque<StreamScript>>,
    replies: Mutex<HashMap<Action, Result<Value, String>>>,
    requests: Mutex<Vec<ActionRequest>>,
    open_senders: Mutex<Vec<mpsc::Sender<Result<String>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self, script: StreamScript) {
        self.streams.lock().unwrap().push_back(script);
    }

    /// Queue a successful stream of `fragments`.
    pub fn push_reply(&self, fragments: &[&str]) {
        self.push_stream(StreamScript::Items(
            fragments.iter().map(|f| Ok(f.to_string())).collect(),
        ));
    }

    pub fn set_invoke(&self, action: Action, reply: Result<Value, String>) {
        self.replies.lock().unwrap().insert(action, reply);
    }

    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// True once every hanging stream has been dropped by its consumer.
    pub fn hanging_streams_closed(&self) -> bool {
        self.open_senders
            .lock()
            .unwrap()
            .iter()
            .all(|tx| tx.is_closed())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(&self, request: &ActionRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().get(&request.action()).cloned();
        match reply {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ClientError::RequestFailed(message)),
            None => Err(ClientError::RequestFailed(format!(
                "no scripted reply for {}",
                request.action()
            ))),
        }
    }

    async fn stream(&self, request: &ActionRequest) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StreamScript::Items(Vec::new()));
        match script {
            StreamScript::Items(items) => Ok(FragmentStream::from_results(
                items
                    .into_iter()
                    .map(|i| i.map_err(ClientError::RequestFailed))
                    .collect(),
            )),
            StreamScript::Hang(fragments) => {
                let (tx, stream) = FragmentStream::channel(fragments.len() + 1);
                for f in fragments {
                    tx.try_send(Ok(f)).unwrap();
                }
                self.open_senders.lock().unwrap().push(tx);
                Ok(stream)
            },
            StreamScript::Refuse(message) => Err(ClientError::RequestFailed(message)),
        }
    }
}
