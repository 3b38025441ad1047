//! In-memory transport replaying canned Graph API responses.

use async_trait::async_trait;
use insights_core::error::{InsightsError, InsightsResult};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use url::Url;

use crate::transport::GraphTransport;

type Reply = Result<Value, (u16, Value)>;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub url: Url,
    pub form: Vec<(String, String)>,
}

/// Routes match when the request path contains the route fragment and, if
/// given, the query contains the query fragment. Each route replays its
/// replies in order; the last reply repeats.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, Option<String>, VecDeque<Reply>)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, path: &str, query: Option<&str>, body: Value) -> Self {
        self.push(path, query, Ok(body))
    }

    pub fn fail(self, path: &str, query: Option<&str>, status: u16, body: Value) -> Self {
        self.push(path, query, Err((status, body)))
    }

    fn push(self, path: &str, query: Option<&str>, reply: Reply) -> Self {
        {
            let mut routes = self.routes.lock().unwrap();
            let fragment = query.map(str::to_string);
            match routes
                .iter_mut()
                .find(|(p, q, _)| p == path && *q == fragment)
            {
                Some((_, _, replies)) => replies.push_back(reply),
                None => routes.push((path.to_string(), fragment, VecDeque::from([reply]))),
            }
        }
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    fn reply(&self, method: &'static str, url: &Url, form: &[(String, String)]) -> InsightsResult<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.clone(),
            form: form.to_vec(),
        });
        let query = url.query().unwrap_or_default();
        let mut routes = self.routes.lock().unwrap();
        let Some((_, _, replies)) = routes.iter_mut().find(|(path, fragment, _)| {
            url.path().contains(path.as_str())
                && fragment.as_deref().map_or(true, |f| query.contains(f))
        }) else {
            return Err(InsightsError::Transport(format!("no scripted route for {url}")));
        };
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        match reply {
            Some(Ok(body)) => Ok(body),
            Some(Err((status, payload))) => Err(InsightsError::Upstream { status, payload }),
            None => Err(InsightsError::Transport(format!("route exhausted for {url}"))),
        }
    }
}

#[async_trait]
impl GraphTransport for ScriptedTransport {
    async fn get(&self, url: &Url, _token: &str) -> InsightsResult<Value> {
        self.reply("GET", url, &[])
    }

    async fn post(&self, url: &Url, _token: &str, form: &[(String, String)]) -> InsightsResult<Value> {
        self.reply("POST", url, form)
    }
}
