use parking_lot::RwLock;
use std::sync::Arc;

use crate::catalog::{MonitorCatalog, SharedCatalog};
use crate::config::Settings;

/// Valeur partagée publiée par remplacement complet.
///
/// Les lecteurs récupèrent un `Arc<T>` immuable et le gardent le temps de
/// leur requête ; le chemin de reload publie une nouvelle valeur entière.
pub struct Snapshot<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(value))) }
    }

    /// Photo courante (le verrou n'est tenu que le temps du clone)
    pub fn load(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    pub fn store(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

/// État commun à toutes les connexions
#[derive(Clone)]
pub struct RelayState {
    pub catalog: SharedCatalog,
    pub settings: Snapshot<Settings>,
}

impl RelayState {
    pub fn new(catalog: MonitorCatalog, settings: Settings) -> Self {
        Self {
            catalog: Snapshot::new(catalog),
            settings: Snapshot::new(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_replaces_whole_value() {
        let shared = Snapshot::new(vec![1, 2, 3]);
        let before = shared.load();

        let writer = shared.clone();
        writer.store(vec![4]);

        // l'ancienne photo reste intacte pour qui la détient
        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*shared.load(), vec![4]);
    }
}
