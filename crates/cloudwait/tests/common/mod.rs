#![allow(dead_code)]

use cloudwait::{ApiError, Observation, ProbeResult, Prober, WaitError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::Instant;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// One scripted probe reply
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Status(&'static str),
    NotFound,
    Fail(&'static str),
}

/// Prober that replays a fixed sequence and repeats the last reply forever
pub struct ScriptedProbe {
    replies: VecDeque<Reply>,
    last: Reply,
    latency: Duration,
    count: u32,
    pub starts: Rc<RefCell<Vec<Instant>>>,
}

impl ScriptedProbe {
    pub fn new(replies: &[Reply]) -> Self {
        Self {
            replies: replies.iter().copied().collect(),
            last: replies.last().copied().unwrap_or(Reply::NotFound),
            latency: Duration::ZERO,
            count: 0,
            starts: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn statuses(labels: &[&'static str]) -> Self {
        let replies: Vec<_> = labels.iter().map(|l| Reply::Status(*l)).collect();
        Self::new(&replies)
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.starts.borrow().len()
    }
}

impl Prober<u32, ApiError> for ScriptedProbe {
    fn probe(&mut self) -> impl Future<Output = ProbeResult<u32, ApiError>> {
        let reply = self.replies.pop_front().unwrap_or(self.last);
        self.count += 1;
        let count = self.count;
        let latency = self.latency;
        let starts = Rc::clone(&self.starts);

        async move {
            starts.borrow_mut().push(Instant::now());
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            match reply {
                Reply::Status(status) => Ok(Observation::new(count, status)),
                Reply::NotFound => Err(WaitError::not_found("no such key")),
                Reply::Fail(code) => Err(WaitError::remote(ApiError::new(code, "scripted failure"))),
            }
        }
    }
}
