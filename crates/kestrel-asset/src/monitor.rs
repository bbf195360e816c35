use {
    kestrel_core::Uri,
    std::{
        collections::HashMap,
        sync::{Arc, Mutex, Weak},
    },
};

type Callback = Box<dyn Fn(&Uri) + Send + Sync>;

/// Subscription to modification events for one uri. Dropping the signal
/// unsubscribes.
pub struct Signal {
    inner: Arc<SignalInner>,
}

struct SignalInner {
    callbacks: Mutex<Vec<Callback>>,
}

impl Signal {
    pub fn connect(&self, callback: impl Fn(&Uri) + Send + Sync + 'static) {
        self.inner.callbacks.lock().expect("signal poisoned").push(Box::new(callback));
    }
}

/// Fan-out of uri modification events.
///
/// The host layer that actually watches the file system calls [notify];
/// providers subscribe through [on_modified] and mark entries out of date.
#[derive(Default)]
pub struct UriMonitor {
    subscriptions: Mutex<HashMap<Uri, Vec<Weak<SignalInner>>>>,
}

impl UriMonitor {
    /// Signal that fires whenever `uri` is reported modified.
    pub fn on_modified(&self, uri: &Uri) -> Signal {
        let inner = Arc::new(SignalInner {
            callbacks: Mutex::new(Vec::new()),
        });
        self.subscriptions
            .lock()
            .expect("monitor poisoned")
            .entry(uri.clone())
            .or_default()
            .push(Arc::downgrade(&inner));
        Signal { inner }
    }

    /// Reports a modification; fires every live subscription for `uri`.
    pub fn notify(&self, uri: &Uri) {
        let signals: Vec<Arc<SignalInner>> = {
            let mut subscriptions = self.subscriptions.lock().expect("monitor poisoned");
            let Some(entries) = subscriptions.get_mut(uri) else {
                return;
            };
            entries.retain(|weak| weak.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for signal in signals {
            for callback in signal.callbacks.lock().expect("signal poisoned").iter() {
                callback(uri);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[test]
    fn notify_fires_connected_callbacks() {
        let monitor = UriMonitor::default();
        let uri = Uri::from("textures/wood.json");
        let fired = Arc::new(AtomicUsize::new(0));

        let signal = monitor.on_modified(&uri);
        signal.connect({
            let fired = Arc::clone(&fired);
            move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });

        monitor.notify(&uri);
        monitor.notify(&Uri::from("textures/other.json"));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_signal_unsubscribes() {
        let monitor = UriMonitor::default();
        let uri = Uri::from("a");
        let fired = Arc::new(AtomicUsize::new(0));

        let signal = monitor.on_modified(&uri);
        signal.connect({
            let fired = Arc::clone(&fired);
            move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            }
        });
        drop(signal);

        monitor.notify(&uri);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
