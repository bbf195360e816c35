use std::{
    sync::{
        atomic::{AtomicU32, AtomicU8, Ordering},
        Arc, Mutex,
    },
    thread,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
}

struct Shared<T> {
    status: AtomicU8,
    progress: AtomicU32,
    result: Mutex<Option<T>>,
}

const STATUS_PENDING: u8 = 0;
const STATUS_RUNNING: u8 = 1;
const STATUS_DONE: u8 = 2;

/// Progress reporter handed to a task body.
pub struct TaskProgress<T> {
    shared: Arc<Shared<T>>,
}

impl<T> TaskProgress<T> {
    pub fn set(&self, fraction: f32) {
        self.shared
            .progress
            .store(fraction.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }
}

/// Handle to a background job, polled from the render thread.
///
/// All accessors are non-blocking. Dropping the handle abandons the job: the
/// worker runs to completion and its result is discarded.
pub struct Task<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn spawn(body: impl FnOnce(&TaskProgress<T>) -> T + Send + 'static) -> Self {
        let shared = Arc::new(Shared {
            status: AtomicU8::new(STATUS_PENDING),
            progress: AtomicU32::new(0.0f32.to_bits()),
            result: Mutex::new(None),
        });
        let worker = Arc::clone(&shared);
        thread::spawn(move || {
            worker.status.store(STATUS_RUNNING, Ordering::Release);
            let progress = TaskProgress {
                shared: Arc::clone(&worker),
            };
            let value = body(&progress);
            *worker.result.lock().expect("task result poisoned") = Some(value);
            worker.progress.store(1.0f32.to_bits(), Ordering::Relaxed);
            worker.status.store(STATUS_DONE, Ordering::Release);
        });
        Self { shared }
    }
}

impl<T> Task<T> {
    pub fn status(&self) -> TaskStatus {
        match self.shared.status.load(Ordering::Acquire) {
            STATUS_PENDING => TaskStatus::Pending,
            STATUS_RUNNING => TaskStatus::Running,
            _ => TaskStatus::Done,
        }
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.shared.progress.load(Ordering::Relaxed))
    }

    pub fn ready(&self) -> bool { self.status() == TaskStatus::Done }

    /// Takes the result if the task has finished, otherwise `None`.
    pub fn get(&mut self) -> Option<T> {
        if !self.ready() {
            return None;
        }
        self.shared.result.lock().expect("task result poisoned").take()
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[test]
    fn task_completes_and_yields_result() {
        let mut task = Task::spawn(|progress| {
            progress.set(0.5);
            21 * 2
        });
        for _ in 0..500 {
            if task.ready() {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        assert!(task.ready());
        assert_eq!(task.progress(), 1.0);
        assert_eq!(task.get(), Some(42));
        assert_eq!(task.get(), None);
    }

    #[test]
    fn get_is_none_before_completion() {
        let mut task = Task::spawn(|_| {
            thread::sleep(Duration::from_millis(50));
            1
        });
        // May already have finished on a loaded machine, but must never block.
        let _ = task.get();
    }

    #[test]
    fn dropping_abandons_the_result() {
        let task = Task::spawn(|_| thread::sleep(Duration::from_millis(10)));
        drop(task);
    }
}
