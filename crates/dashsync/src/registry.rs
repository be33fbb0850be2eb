//! Connector registry.
//!
//! Connector variants are registered explicitly at startup with a factory.
//! [`ConnectorRegistry::discover`] turns the registrations into a
//! [`ConnectorCatalog`] that a sync batch resolves connector ids against.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::connector::Connector;
use crate::descriptor::ConnectorDescriptor;

/// Id reserved for the abstract base connector. Never registrable.
pub const BASE_CONNECTOR_ID: &str = "base";

/// Factory creating a fresh connector instance.
pub type ConnectorFactory = Arc<dyn Fn() -> Box<dyn Connector> + Send + Sync>;

/// Wrap a constructor as a [`ConnectorFactory`].
pub fn factory<C, F>(make: F) -> ConnectorFactory
where
    C: Connector + 'static,
    F: Fn() -> C + Send + Sync + 'static,
{
    Arc::new(move || Box::new(make()) as Box<dyn Connector>)
}

struct Registration {
    descriptor: ConnectorDescriptor,
    factory: ConnectorFactory,
}

/// Startup-time table of available connector variants.
#[derive(Default)]
pub struct ConnectorRegistry {
    registrations: Vec<Registration>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector variant under its descriptor.
    pub fn register(&mut self, descriptor: ConnectorDescriptor, factory: ConnectorFactory) {
        self.registrations.push(Registration {
            descriptor,
            factory,
        });
    }

    /// Register a connector type whose descriptor is read from a throwaway
    /// instance.
    pub fn register_with<C, F>(&mut self, make: F)
    where
        C: Connector + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let descriptor = make().describe();
        self.register(descriptor, factory(make));
    }

    /// Build a catalog of the usable registrations.
    ///
    /// Registrations with the reserved base id or an invalid descriptor are
    /// skipped with a warning. When two registrations share an id the later
    /// one wins. Rebuilt on every call.
    pub fn discover(&self) -> ConnectorCatalog {
        let mut entries: BTreeMap<String, CatalogEntry> = BTreeMap::new();

        for registration in &self.registrations {
            let descriptor = &registration.descriptor;

            if descriptor.id == BASE_CONNECTOR_ID {
                tracing::debug!("skipping base connector registration");
                continue;
            }

            if let Err(reason) = descriptor.check() {
                tracing::warn!(connector = %descriptor.id, %reason, "skipping invalid connector");
                continue;
            }

            let entry = CatalogEntry {
                descriptor: descriptor.clone(),
                factory: Arc::clone(&registration.factory),
            };
            if entries.insert(descriptor.id.clone(), entry).is_some() {
                tracing::warn!(
                    connector = %descriptor.id,
                    "connector registered twice, using the later registration"
                );
            }
        }

        ConnectorCatalog { entries }
    }
}

#[derive(Clone)]
struct CatalogEntry {
    descriptor: ConnectorDescriptor,
    factory: ConnectorFactory,
}

/// Snapshot of the registry, resolved once per batch and shared by workers.
#[derive(Clone, Default)]
pub struct ConnectorCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl ConnectorCatalog {
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn descriptor(&self, id: &str) -> Option<&ConnectorDescriptor> {
        self.entries.get(id).map(|e| &e.descriptor)
    }

    /// Descriptors in id order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ConnectorDescriptor> {
        self.entries.values().map(|e| &e.descriptor)
    }

    /// Create a fresh connector for `id`.
    pub fn instantiate(&self, id: &str) -> Option<Box<dyn Connector>> {
        self.entries.get(id).map(|e| (e.factory)())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
