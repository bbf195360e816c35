use std::sync::Mutex;

type DeferredItem = Box<dyn FnOnce() + Send>;

struct Buckets {
    frames: Vec<Vec<DeferredItem>>,
    current: usize,
}

/// N-frame deferred release of GPU objects.
///
/// A resource pushed at frame F is released no earlier than frame F+N and no
/// later than frame F+N+1, where N is the ring size. Callers must never touch
/// a pushed object again.
pub struct DeletionQueue {
    buckets: Mutex<Buckets>,
}

impl DeletionQueue {
    pub fn new(ring_size: usize) -> Self {
        assert!(ring_size >= 2, "deletion ring must cover all in-flight frames");
        Self {
            buckets: Mutex::new(Buckets {
                frames: (0..ring_size).map(|_| Vec::new()).collect(),
                current: 0,
            }),
        }
    }

    /// Appends to the current frame's bucket.
    pub fn push(&self, item: impl FnOnce() + Send + 'static) {
        let mut buckets = self.buckets.lock().expect("deletion queue poisoned");
        let current = buckets.current;
        buckets.frames[current].push(Box::new(item));
    }

    /// Rotates to the next frame and drops the bucket that wraps back around,
    /// whose GPU work is known complete (the caller has waited on the frame
    /// fence).
    pub fn next(&self) {
        let drained = {
            let mut buckets = self.buckets.lock().expect("deletion queue poisoned");
            buckets.current = (buckets.current + 1) % buckets.frames.len();
            let current = buckets.current;
            std::mem::take(&mut buckets.frames[current])
        };
        // Destructors run outside the lock: they may push follow-up items.
        for item in drained {
            item();
        }
    }

    /// Drops every bucket immediately. Only valid after a full device wait.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut buckets = self.buckets.lock().expect("deletion queue poisoned");
            buckets.frames.iter_mut().map(std::mem::take).collect()
        };
        for bucket in drained {
            for item in bucket {
                item();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = {
            let count = Arc::clone(&count);
            move || count.load(Ordering::SeqCst)
        };
        (count, read)
    }

    #[test]
    fn release_happens_after_ring_size_frames() {
        let queue = DeletionQueue::new(2);
        let (count, released) = counter();
        queue.push({
            let count = Arc::clone(&count);
            move || {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        queue.next();
        assert_eq!(released(), 0, "released before its frame completed");
        queue.next();
        assert_eq!(released(), 1);
        queue.next();
        assert_eq!(released(), 1, "released twice");
    }

    #[test]
    fn items_release_in_push_order_within_a_frame() {
        let queue = DeletionQueue::new(2);
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = Arc::clone(&order);
            queue.push(move || order.lock().unwrap().push(tag));
        }
        queue.next();
        queue.next();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn clear_drops_everything() {
        let queue = DeletionQueue::new(3);
        let (count, released) = counter();
        for _ in 0..4 {
            let count = Arc::clone(&count);
            queue.push(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
            queue.next();
        }
        queue.clear();
        assert_eq!(released(), 4);
    }
}
