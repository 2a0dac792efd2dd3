use super::message::Message;
use parking_lot::Mutex;
use std::time::Duration;

/// Default number of messages a session queue holds
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
/// Pause between attempts of a blocking push
pub const PUSH_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Fixed-capacity ring buffer
#[derive(Debug)]
struct Ring {
    slots: Vec<Option<Message>>,
    /// Next insertion slot
    head: usize,
    /// Next removal slot
    tail: usize,
    count: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, message: Message) -> Result<(), Message> {
        if self.count == self.capacity() {
            return Err(message);
        }

        self.slots[self.head] = Some(message);
        self.head = (self.head + 1) % self.capacity();
        self.count += 1;
        Ok(())
    }

    fn pop(&mut self) -> Option<Message> {
        if self.count == 0 {
            return None;
        }

        let message = self.slots[self.tail].take();
        self.tail = (self.tail + 1) % self.capacity();
        self.count -= 1;
        message
    }

    fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.tail = 0;
        self.count = 0;
    }
}

/// Bounded FIFO shared by the receive loop, the transmit loop and the consumer.
///
/// Every operation holds the one mutex for its whole critical section and
/// never sleeps while holding it. The queue itself never waits for space:
/// [`MessageQueue::push_blocking`] is a retry loop around [`MessageQueue::push`].
#[derive(Debug)]
pub struct MessageQueue {
    ring: Mutex<Ring>,
}

impl MessageQueue {
    /// Create a queue; a zero capacity is bumped to one
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::new(capacity.max(1))),
        }
    }

    /// Try to enqueue. A full queue hands the message back.
    pub fn push(&self, message: Message) -> Result<(), Message> {
        self.ring.lock().push(message)
    }

    /// Enqueue, retrying every [`PUSH_RETRY_INTERVAL`] until there is room.
    pub fn push_blocking(&self, message: Message) {
        let mut pending = message;
        loop {
            match self.push(pending) {
                Ok(()) => return,
                Err(rejected) => {
                    pending = rejected;
                    std::thread::sleep(PUSH_RETRY_INTERVAL);
                }
            }
        }
    }

    /// Remove the oldest message
    pub fn pop(&self) -> Option<Message> {
        self.ring.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        let ring = self.ring.lock();
        ring.count == ring.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.ring.lock().capacity()
    }

    /// Drop every queued message
    pub fn clear(&self) {
        self.ring.lock().clear();
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    fn msg(payload: &str) -> Message {
        Message::received(payload.as_bytes(), false)
    }

    #[test]
    fn test_push_pop_fifo() {
        let queue = MessageQueue::new(3);
        queue.push(msg("a")).unwrap();
        queue.push(msg("b")).unwrap();

        assert_eq!(queue.pop().unwrap().payload(), b"a");
        queue.push(msg("c")).unwrap();
        queue.push(msg("d")).unwrap();

        assert_eq!(queue.pop().unwrap().payload(), b"b");
        assert_eq!(queue.pop().unwrap().payload(), b"c");
        assert_eq!(queue.pop().unwrap().payload(), b"d");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_push_rejected_when_full() {
        let queue = MessageQueue::new(2);
        queue.push(msg("a")).unwrap();
        queue.push(msg("b")).unwrap();
        assert!(queue.is_full());

        let rejected = queue.push(msg("c")).unwrap_err();
        assert_eq!(rejected.payload(), b"c");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_pop_empty() {
        let queue = MessageQueue::default();
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_clear_resets_ring() {
        let queue = MessageQueue::new(2);
        queue.push(msg("a")).unwrap();
        queue.push(msg("b")).unwrap();
        queue.clear();

        assert!(queue.is_empty());
        queue.push(msg("c")).unwrap();
        assert_eq!(queue.pop().unwrap().payload(), b"c");
    }

    #[test]
    fn test_push_blocking_waits_for_room() {
        let queue = Arc::new(MessageQueue::new(1));
        queue.push(msg("first")).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let started = Instant::now();
                queue.push_blocking(msg("second"));
                started.elapsed()
            })
        };

        thread::sleep(Duration::from_millis(40));
        assert_eq!(queue.pop().unwrap().payload(), b"first");

        let waited = producer.join().unwrap();
        assert!(waited >= Duration::from_millis(30));
        assert_eq!(queue.pop().unwrap().payload(), b"second");
        assert!(queue.pop().is_none());
    }
}
