#![allow(dead_code)]

use ferry::wire::{ChannelTransport, Transport, TransportError};
use ferry::{Bridge, BridgeConfig};
use ferry_guest::memory::MemoryRuntime;
use ferry_guest::Dispatcher;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts frames the host sends.
pub struct Counting {
    inner: ChannelTransport,
    sent: Arc<AtomicUsize>,
}

impl Transport for Counting {
    fn send(&mut self, frame: &str) -> Result<(), TransportError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(frame)
    }

    fn receive(&mut self) -> Result<Option<String>, TransportError> {
        self.inner.receive()
    }
}

#[derive(Clone)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A bridge to `runtime` on a worker thread, plus a count of frames sent.
pub fn counted(runtime: MemoryRuntime) -> (Bridge, Counter) {
    counted_with(runtime, BridgeConfig::default())
}

pub fn counted_with(runtime: MemoryRuntime, config: BridgeConfig) -> (Bridge, Counter) {
    let (host, mut guest) = ChannelTransport::pair();
    std::thread::spawn(move || {
        Dispatcher::new(runtime).serve(&mut guest).expect("serve");
    });
    let sent = Arc::new(AtomicUsize::new(0));
    let transport = Counting {
        inner: host,
        sent: sent.clone(),
    };
    (Bridge::with_config(transport, config), Counter(sent))
}

/// Answers every command with the next canned frame.
pub struct Scripted {
    replies: VecDeque<String>,
}

impl Scripted {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl Transport for Scripted {
    fn send(&mut self, _frame: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.replies.pop_front())
    }
}
