use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    transport::{Method, Params, Transport},
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub action: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Transport that replays scripted bodies per action and records every call.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Vec<u8>>>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn push(&self, action: &str, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(Ok(body.to_string().into_bytes()));
    }

    pub fn push_err(&self, action: &str, err: Error) {
        self.responses
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(Err(err));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn round_trip(&self, method: Method, action: &str, params: &Params) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(Call {
            method,
            action: action.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });
        self.responses
            .lock()
            .unwrap()
            .get_mut(action)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(Error::Transport(format!("no scripted response for {action}"))))
    }
}
