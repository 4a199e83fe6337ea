//! The default `queue` facet: a FIFO with optional bounded capacity (§4.5).

use crate::error::SubflowError;
use crate::facet::{Facet, FacetInitCtx, QueueFacet};
use crate::message::Message;
use async_trait::async_trait;
use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct QueueFacetImpl {
    source: String,
    capacity: Option<usize>,
    queue: Mutex<VecDeque<Message>>,
    initialized: AtomicBool,
    disposed: AtomicBool,
}

impl QueueFacetImpl {
    pub fn new(source: impl Into<String>, capacity: Option<usize>) -> Self {
        Self {
            source: source.into(),
            capacity,
            queue: Mutex::new(VecDeque::new()),
            initialized: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn unbounded(source: impl Into<String>) -> Self {
        Self::new(source, None)
    }
}

impl QueueFacet for QueueFacetImpl {
    fn enqueue(&self, message: Message) -> Result<(), SubflowError> {
        let mut queue = self.queue.lock().unwrap();
        if let Some(capacity) = self.capacity {
            if queue.len() >= capacity {
                return Err(SubflowError::build(format!(
                    "queue at capacity ({capacity}), rejecting message '{}'",
                    message.id
                )));
            }
        }
        queue.push_back(message);
        Ok(())
    }

    fn dequeue(&self) -> Option<Message> {
        self.queue.lock().unwrap().pop_front()
    }

    fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[async_trait]
impl Facet for QueueFacetImpl {
    fn kind(&self) -> &'static str {
        "queue"
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn init(&self, _init_ctx: &FacetInitCtx<'_>) -> Result<(), SubflowError> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), SubflowError> {
        self.disposed.store(true, Ordering::Release);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_queue(&self) -> Option<&dyn QueueFacet> {
        Some(self)
    }
}
