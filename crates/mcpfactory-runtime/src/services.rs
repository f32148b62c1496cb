//! Typed service container and hosted background services
//!
//! Services are registered by type on a [`ServiceCollection`] while the
//! server is being configured, then frozen into a [`ServiceProvider`] that
//! tools and tests resolve them from. A later registration of the same type
//! replaces the earlier one, which is how tests override a dependency.
//!
//! To register a trait object, register the `Arc<dyn Trait>` itself:
//!
//! ```
//! use mcpfactory_runtime::ServiceCollection;
//! use std::sync::Arc;
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct Fixed;
//! impl Greeter for Fixed {
//!     fn greet(&self) -> String { "hi".into() }
//! }
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton::<Arc<dyn Greeter>>(Arc::new(Fixed));
//!
//! let provider = services.build();
//! let greeter = provider.get::<Arc<dyn Greeter>>().unwrap();
//! assert_eq!(greeter.greet(), "hi");
//! ```

use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A background component started with the server and stopped with it
#[async_trait]
pub trait HostedService: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    /// Start the service
    ///
    /// `cancel` is the token of the start attempt, not the server lifetime.
    async fn start(&self, cancel: &CancellationToken) -> Result<()>;

    /// Stop the service
    async fn stop(&self) -> Result<()>;
}

struct Registration {
    type_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

/// Mutable set of service registrations
#[derive(Default)]
pub struct ServiceCollection {
    singletons: HashMap<TypeId, Registration>,
    hosted: Vec<Arc<dyn HostedService>>,
}

impl ServiceCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` as the singleton for type `T`
    ///
    /// Replaces any earlier registration of `T`.
    pub fn add_singleton<T>(&mut self, value: T) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.singletons.insert(
            TypeId::of::<T>(),
            Registration {
                type_name: type_name::<T>(),
                instance: Arc::new(value),
            },
        );
        self
    }

    /// Register a hosted service
    ///
    /// Hosted services start in registration order and stop in reverse.
    pub fn add_hosted_service(&mut self, service: Arc<dyn HostedService>) -> &mut Self {
        self.hosted.push(service);
        self
    }

    /// Whether a singleton of type `T` is registered
    pub fn contains<T: 'static>(&self) -> bool {
        self.singletons.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered singletons
    pub fn len(&self) -> usize {
        self.singletons.len()
    }

    /// Whether no singleton is registered
    pub fn is_empty(&self) -> bool {
        self.singletons.is_empty()
    }

    /// Freeze the registrations
    pub fn build(self) -> ServiceProvider {
        ServiceProvider {
            singletons: self.singletons,
            hosted: self.hosted,
        }
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("singletons", &self.singletons.len())
            .field("hosted", &self.hosted.len())
            .finish()
    }
}

/// Immutable, shareable view of registered services
#[derive(Default)]
pub struct ServiceProvider {
    singletons: HashMap<TypeId, Registration>,
    hosted: Vec<Arc<dyn HostedService>>,
}

impl ServiceProvider {
    /// Resolve the singleton registered for `T`
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.singletons
            .get(&TypeId::of::<T>())
            .and_then(|registration| registration.instance.downcast_ref::<T>())
    }

    /// Resolve the singleton registered for `T`, failing if absent
    pub fn require<T: 'static>(&self) -> Result<&T> {
        self.get::<T>()
            .ok_or(RuntimeError::ServiceNotFound(type_name::<T>()))
    }

    /// Hosted services in registration order
    pub fn hosted_services(&self) -> &[Arc<dyn HostedService>] {
        &self.hosted
    }

    /// Type names of all registered singletons
    pub fn registered(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.singletons.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("singletons", &self.registered())
            .field("hosted", &self.hosted.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait MessageProvider: Send + Sync {
        fn message(&self) -> String;
    }

    struct Standard;
    impl MessageProvider for Standard {
        fn message(&self) -> String {
            "default".to_string()
        }
    }

    struct Fixed;
    impl MessageProvider for Fixed {
        fn message(&self) -> String {
            "fixed".to_string()
        }
    }

    #[test]
    fn test_get_registered_singleton() {
        let mut services = ServiceCollection::new();
        services.add_singleton(42u32).add_singleton(String::from("hello"));
        assert!(services.contains::<u32>());
        assert_eq!(services.len(), 2);

        let provider = services.build();
        assert_eq!(provider.get::<u32>(), Some(&42));
        assert_eq!(provider.get::<String>().map(String::as_str), Some("hello"));
        assert!(provider.get::<i64>().is_none());
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let fixed: Arc<dyn MessageProvider> = Arc::new(Fixed);

        let mut services = ServiceCollection::new();
        services.add_singleton::<Arc<dyn MessageProvider>>(Arc::new(Standard));
        services.add_singleton::<Arc<dyn MessageProvider>>(Arc::clone(&fixed));
        assert_eq!(services.len(), 1);

        let provider = services.build();
        let resolved = provider.require::<Arc<dyn MessageProvider>>().unwrap();
        assert_eq!(resolved.message(), "fixed");
        assert!(Arc::ptr_eq(resolved, &fixed));
    }

    #[test]
    fn test_require_missing_names_type() {
        let provider = ServiceCollection::new().build();
        match provider.require::<u8>() {
            Err(RuntimeError::ServiceNotFound(name)) => assert_eq!(name, "u8"),
            other => panic!("Expected ServiceNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_hosted_services_keep_order() {
        struct Named(&'static str);

        #[async_trait]
        impl HostedService for Named {
            fn name(&self) -> &str {
                self.0
            }
            async fn start(&self, _cancel: &CancellationToken) -> Result<()> {
                Ok(())
            }
            async fn stop(&self) -> Result<()> {
                Ok(())
            }
        }

        let mut services = ServiceCollection::new();
        services
            .add_hosted_service(Arc::new(Named("first")))
            .add_hosted_service(Arc::new(Named("second")));

        let provider = services.build();
        let names: Vec<_> = provider.hosted_services().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
