use std::any::type_name;

use super::{Module, ModuleConstructor};
use crate::error::FrameworkError;

type Factory<C> = Box<dyn Fn(&C) -> anyhow::Result<Box<dyn Module>> + Send + Sync>;

struct Registration<C> {
    type_name: String,
    factory: Factory<C>,
}

/// Outcome of one [`ModuleRegistry::start`].
#[derive(Debug, Default)]
pub struct StartReport {
    /// Names of the modules now live, in registration order.
    pub started: Vec<String>,
    /// One entry per constructor that failed.
    pub failed: Vec<FrameworkError>,
}

impl StartReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ModuleRegistryBuilder<C> {
    registrations: Vec<Registration<C>>,
}

impl<C: 'static> ModuleRegistryBuilder<C> {
    /// Register `M`. Registering the same type twice keeps the first entry.
    pub fn module<M: ModuleConstructor<C>>(self) -> Self {
        self.factory(type_name::<M>(), |ctx: &C| {
            M::construct(ctx).map(|module| Box::new(module) as Box<dyn Module>)
        })
    }

    /// Register a constructor closure under an explicit type name.
    pub fn factory<F>(mut self, type_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<Box<dyn Module>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self.registrations.iter().any(|r| r.type_name == type_name) {
            tracing::warn!(module_type = %type_name, "module registered twice, keeping the first");
            return self;
        }

        self.registrations.push(Registration {
            type_name,
            factory: Box::new(factory),
        });
        self
    }

    pub fn build(self) -> ModuleRegistry<C> {
        ModuleRegistry {
            registrations: self.registrations,
            live: Vec::new(),
        }
    }
}

/// Registered module constructors plus the set of live instances.
pub struct ModuleRegistry<C> {
    registrations: Vec<Registration<C>>,
    live: Vec<Box<dyn Module>>,
}

impl<C: 'static> ModuleRegistry<C> {
    pub fn builder() -> ModuleRegistryBuilder<C> {
        ModuleRegistryBuilder {
            registrations: Vec::new(),
        }
    }

    /// Construct one instance of every registered module.
    ///
    /// A failing constructor is logged and reported; the remaining modules
    /// still start. Calling this again without [`ModuleRegistry::stop`]
    /// constructs a second set.
    pub fn start(&mut self, ctx: &C) -> StartReport {
        let mut report = StartReport::default();

        for registration in &self.registrations {
            match (registration.factory)(ctx) {
                Ok(module) => {
                    tracing::info!(
                        module = %module.name(),
                        module_type = %registration.type_name,
                        "module started"
                    );
                    report.started.push(module.name().to_string());
                    self.live.push(module);
                }
                Err(e) => {
                    tracing::error!(
                        module_type = %registration.type_name,
                        error = %e,
                        "module construction failed, skipping"
                    );
                    report.failed.push(FrameworkError::ModuleConstruction {
                        module: registration.type_name.clone(),
                        source: e.into(),
                    });
                }
            }
        }

        report
    }

    /// Dispose every live module once and clear the set. Returns how many
    /// were disposed.
    pub fn stop(&mut self) -> usize {
        let count = self.live.len();
        for mut module in self.live.drain(..) {
            module.dispose();
            tracing::info!(module = %module.name(), "module disposed");
        }
        count
    }

    pub fn live_modules(&self) -> Vec<&str> {
        self.live.iter().map(|m| m.name()).collect()
    }

    /// Number of live modules.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn registered(&self) -> usize {
        self.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        constructed: AtomicUsize,
        disposed: AtomicUsize,
    }

    struct Ctx {
        counters: Arc<Counters>,
    }

    struct Weather {
        counters: Arc<Counters>,
    }

    impl Module for Weather {
        fn name(&self) -> &str {
            "Weather"
        }

        fn dispose(&mut self) {
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ModuleConstructor<Ctx> for Weather {
        fn construct(ctx: &Ctx) -> anyhow::Result<Self> {
            ctx.counters.constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Self {
                counters: ctx.counters.clone(),
            })
        }
    }

    struct Traffic {
        counters: Arc<Counters>,
    }

    impl Module for Traffic {
        fn name(&self) -> &str {
            "Traffic"
        }

        fn dispose(&mut self) {
            self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ModuleConstructor<Ctx> for Traffic {
        fn construct(ctx: &Ctx) -> anyhow::Result<Self> {
            ctx.counters.constructed.fetch_add(1, Ordering::SeqCst);
            Ok(Self {
                counters: ctx.counters.clone(),
            })
        }
    }

    struct Broken;

    impl Module for Broken {
        fn name(&self) -> &str {
            "Broken"
        }

        fn dispose(&mut self) {}
    }

    impl ModuleConstructor<Ctx> for Broken {
        fn construct(_: &Ctx) -> anyhow::Result<Self> {
            anyhow::bail!("missing map data")
        }
    }

    fn ctx() -> Ctx {
        Ctx {
            counters: Arc::new(Counters::default()),
        }
    }

    #[test]
    fn test_start_constructs_one_of_each() {
        let ctx = ctx();
        let mut registry = ModuleRegistry::<Ctx>::builder()
            .module::<Weather>()
            .module::<Traffic>()
            .build();

        assert!(registry.is_empty());
        let report = registry.start(&ctx);

        assert!(report.is_complete());
        assert_eq!(report.started, vec!["Weather", "Traffic"]);
        assert_eq!(registry.live_modules(), vec!["Weather", "Traffic"]);
        assert_eq!(ctx.counters.constructed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_disposes_each_once_and_clears() {
        let ctx = ctx();
        let mut registry = ModuleRegistry::<Ctx>::builder()
            .module::<Weather>()
            .module::<Traffic>()
            .build();

        registry.start(&ctx);
        assert_eq!(registry.stop(), 2);
        assert!(registry.is_empty());
        assert_eq!(ctx.counters.disposed.load(Ordering::SeqCst), 2);

        assert_eq!(registry.stop(), 0);
        assert_eq!(ctx.counters.disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_restart_yields_fresh_instances() {
        let ctx = ctx();
        let mut registry = ModuleRegistry::<Ctx>::builder().module::<Weather>().build();

        registry.start(&ctx);
        registry.stop();
        registry.start(&ctx);

        assert_eq!(registry.len(), 1);
        assert_eq!(ctx.counters.constructed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_constructor_does_not_block_others() {
        let ctx = ctx();
        let mut registry = ModuleRegistry::<Ctx>::builder()
            .module::<Weather>()
            .module::<Broken>()
            .module::<Traffic>()
            .build();

        let report = registry.start(&ctx);

        assert_eq!(report.started, vec!["Weather", "Traffic"]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(
            &report.failed[0],
            FrameworkError::ModuleConstruction { module, .. } if module.ends_with("Broken")
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let registry = ModuleRegistry::<Ctx>::builder()
            .module::<Weather>()
            .module::<Weather>()
            .factory("custom", |ctx: &Ctx| {
                Ok(Box::new(Weather {
                    counters: ctx.counters.clone(),
                }) as Box<dyn Module>)
            })
            .build();

        assert_eq!(registry.registered(), 2);
    }
}
