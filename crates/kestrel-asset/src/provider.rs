use {
    crate::monitor::{Signal, UriMonitor},
    kestrel_core::Uri,
    std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex},
    },
};

/// Result of a concrete loader: the asset (when it could be produced) plus
/// every uri whose modification should invalidate it.
pub struct Payload<T> {
    pub asset: Option<T>,
    pub dependencies: Vec<Uri>,
}

impl<T> Payload<T> {
    /// Failed load that still watches its own uri, so a fixed file reloads.
    pub fn missing(uri: &Uri) -> Self {
        Self {
            asset: None,
            dependencies: vec![uri.clone()],
        }
    }
}

/// Subtype hook of [Provider]: produces one asset from a uri.
///
/// Runs without any provider lock held, so concurrent loads of the same uri
/// may duplicate work; results must be equivalent (last writer wins).
pub trait AssetLoader {
    type Asset;

    fn load_payload(&mut self, uri: &Uri) -> Payload<Self::Asset>;
}

/// Uri-keyed lazy cache with out-of-date tracking.
///
/// Entries subscribe to modification events on each dependency; a fired
/// signal marks the entry for [reload_out_of_date]. The entry map itself is
/// externally synchronized by `&mut self` (it lives on the render thread);
/// only the out-of-date set is shared with monitor callbacks, which may fire
/// from any thread.
pub struct Provider<L: AssetLoader> {
    loader: L,
    monitor: Arc<UriMonitor>,
    entries: HashMap<Uri, L::Asset>,
    signals: HashMap<Uri, Vec<Signal>>,
    out_of_date: Arc<Mutex<HashSet<Uri>>>,
}

impl<L: AssetLoader> Provider<L> {
    pub fn new(loader: L, monitor: Arc<UriMonitor>) -> Self {
        Self {
            loader,
            monitor,
            entries: HashMap::new(),
            signals: HashMap::new(),
            out_of_date: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Cache lookup only; never loads.
    pub fn find(&self, uri: &Uri) -> Option<&L::Asset> { self.entries.get(uri) }

    pub fn find_mut(&mut self, uri: &Uri) -> Option<&mut L::Asset> { self.entries.get_mut(uri) }

    /// Cached value, or a fresh load. `None` when the loader cannot produce
    /// the asset (already logged by the loader).
    pub fn load(&mut self, uri: &Uri) -> Option<&L::Asset> {
        self.load_mut(uri).map(|asset| &*asset)
    }

    pub fn load_mut(&mut self, uri: &Uri) -> Option<&mut L::Asset> {
        if !self.entries.contains_key(uri) {
            let payload = self.loader.load_payload(uri);
            self.subscribe(uri, &payload.dependencies);
            if let Some(asset) = payload.asset {
                self.entries.insert(uri.clone(), asset);
            }
        }
        self.entries.get_mut(uri)
    }

    pub fn add(&mut self, uri: Uri, value: L::Asset) { self.entries.insert(uri, value); }

    pub fn remove(&mut self, uri: &Uri) {
        self.entries.remove(uri);
        self.signals.remove(uri);
        self.out_of_date.lock().expect("out-of-date set poisoned").remove(uri);
    }

    pub fn contains(&self, uri: &Uri) -> bool { self.entries.contains_key(uri) }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&Uri, &L::Asset)> { self.entries.iter() }

    pub fn loader(&self) -> &L { &self.loader }

    pub fn loader_mut(&mut self) -> &mut L { &mut self.loader }

    /// Drains the out-of-date set and reloads each entry. Returns how many
    /// uris were reloaded.
    pub fn reload_out_of_date(&mut self) -> usize {
        let stale: Vec<Uri> = {
            let mut out_of_date = self.out_of_date.lock().expect("out-of-date set poisoned");
            out_of_date.drain().collect()
        };
        for uri in &stale {
            log::info!("Reloading out-of-date asset: {uri}");
            self.entries.remove(uri);
            self.signals.remove(uri);
            self.load(uri);
        }
        stale.len()
    }

    fn subscribe(&mut self, uri: &Uri, dependencies: &[Uri]) {
        let mut signals = Vec::with_capacity(dependencies.len());
        for dependency in dependencies {
            let signal = self.monitor.on_modified(dependency);
            let out_of_date = Arc::clone(&self.out_of_date);
            let uri = uri.clone();
            signal.connect(move |_| {
                out_of_date.lock().expect("out-of-date set poisoned").insert(uri.clone());
            });
            signals.push(signal);
        }
        self.signals.insert(uri.clone(), signals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingLoader {
        loads: usize,
        fail: bool,
    }

    impl AssetLoader for CountingLoader {
        type Asset = String;

        fn load_payload(&mut self, uri: &Uri) -> Payload<String> {
            self.loads += 1;
            if self.fail {
                return Payload::missing(uri);
            }
            Payload {
                asset: Some(format!("asset:{uri}")),
                dependencies: vec![uri.clone()],
            }
        }
    }

    fn provider(fail: bool) -> (Provider<CountingLoader>, Arc<UriMonitor>) {
        let monitor = Arc::new(UriMonitor::default());
        (
            Provider::new(
                CountingLoader { loads: 0, fail },
                Arc::clone(&monitor),
            ),
            monitor,
        )
    }

    #[test]
    fn load_is_idempotent() {
        let (mut provider, _monitor) = provider(false);
        let uri = Uri::from("a.json");
        let first = provider.load(&uri).unwrap().clone();
        let second = provider.load(&uri).unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(provider.loader().loads, 1);
    }

    #[test]
    fn remove_then_load_reconstructs_once() {
        let (mut provider, _monitor) = provider(false);
        let uri = Uri::from("a.json");
        provider.load(&uri);
        provider.remove(&uri);
        assert!(provider.find(&uri).is_none());
        provider.load(&uri);
        assert_eq!(provider.loader().loads, 2);
    }

    #[test]
    fn find_never_loads() {
        let (mut provider, _monitor) = provider(false);
        let uri = Uri::from("a.json");
        assert!(provider.find(&uri).is_none());
        assert_eq!(provider.loader().loads, 0);
        provider.add(uri.clone(), "manual".into());
        assert_eq!(provider.find(&uri).map(String::as_str), Some("manual"));
    }

    #[test]
    fn modified_dependency_triggers_reload() {
        let (mut provider, monitor) = provider(false);
        let uri = Uri::from("a.json");
        provider.load(&uri);
        assert_eq!(provider.reload_out_of_date(), 0);

        monitor.notify(&uri);
        assert_eq!(provider.reload_out_of_date(), 1);
        assert_eq!(provider.loader().loads, 2);
        assert!(provider.contains(&uri));
    }

    #[test]
    fn failed_loads_watch_their_uri() {
        let (mut provider, monitor) = provider(true);
        let uri = Uri::from("broken.json");
        assert!(provider.load(&uri).is_none());

        // The file gets fixed.
        provider.loader_mut().fail = false;
        monitor.notify(&uri);
        assert_eq!(provider.reload_out_of_date(), 1);
        assert!(provider.contains(&uri));
    }
}
