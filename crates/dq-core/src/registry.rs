//! Registry of symbols, command kinds and handler factories
//!
//! A queue resolves three things by name at record or execution time:
//! - symbols: named groups for `instance` and named style values for `@name`
//! - command kinds: the composed [`Behavior`] linked to each recorded command
//! - handler factories: probed in registration order by `Queue::execute`
//!
//! [`Registry::global`] is the process-wide instance with the built-ins
//! installed. Isolated registries are useful for tests and embedding.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::args::Args;
use crate::capability::Behavior;
use crate::dispatch::Handler;
use crate::kinds;
use crate::queue::Queue;
use crate::value::Value;

/// A named symbol
#[derive(Debug, Clone)]
pub enum Symbol {
    /// Drawing group, usable with `instance`
    Group(Queue),
    /// Style value, usable as `@name`
    Style(Value),
}

type Accepts = dyn Fn(&dyn Any) -> bool + Send + Sync;
type Create = dyn for<'t> Fn(&'t mut dyn Any) -> Option<Box<dyn Handler + 't>> + Send + Sync;

/// Handler factory: a predicate on the target plus a constructor
#[derive(Clone)]
pub struct HandlerFactory {
    accepts: Arc<Accepts>,
    create: Arc<Create>,
}

impl HandlerFactory {
    /// Factory from a predicate and a constructor. A constructor returning
    /// `None` declines the target and the next accepting factory is tried.
    /// Constructors must be free of side effects: resolution builds and
    /// drops a handler to probe every accepting factory but the last.
    pub fn new<A, C>(accepts: A, create: C) -> Self
    where
        A: Fn(&dyn Any) -> bool + Send + Sync + 'static,
        C: for<'t> Fn(&'t mut dyn Any) -> Option<Box<dyn Handler + 't>> + Send + Sync + 'static,
    {
        Self {
            accepts: Arc::new(accepts),
            create: Arc::new(create),
        }
    }

    /// Factory for targets that already are handlers of type `H`
    pub fn for_type<H: Handler + 'static>() -> Self {
        Self::new(|target| target.is::<H>(), downcast_handler::<H>)
    }

    /// Whether this factory handles `target`
    pub fn accepts(&self, target: &dyn Any) -> bool {
        (self.accepts)(target)
    }

    /// Build a handler for `target`
    pub fn create<'t>(&self, target: &'t mut dyn Any) -> Option<Box<dyn Handler + 't>> {
        (self.create)(target)
    }
}

fn downcast_handler<'t, H: Handler + 'static>(target: &'t mut dyn Any) -> Option<Box<dyn Handler + 't>> {
    let handler: Box<dyn Handler + 't> = Box::new(target.downcast_mut::<H>()?);
    Some(handler)
}

/// Symbols, command kinds and handler factories
#[derive(Default)]
pub struct Registry {
    symbols: RwLock<HashMap<String, Symbol>>,
    kinds: RwLock<HashMap<String, Arc<Behavior>>>,
    factories: RwLock<Vec<HandlerFactory>>,
}

static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in kinds and symbols
    pub fn with_builtins() -> Arc<Self> {
        let registry = Self::new();
        kinds::install(&registry);
        install_symbols(&registry);
        Arc::new(registry)
    }

    /// Process-wide registry
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(Self::with_builtins).clone()
    }

    /// Define or replace a symbol
    pub fn define_symbol(&self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.write().insert(name.into(), symbol);
    }

    /// Define a group symbol
    pub fn define_group(&self, name: impl Into<String>, group: Queue) {
        self.define_symbol(name, Symbol::Group(group));
    }

    /// Define a style symbol
    pub fn define_style(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.define_symbol(name, Symbol::Style(value.into()));
    }

    /// Look up a symbol
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.read().get(name).cloned()
    }

    /// Look up a group symbol
    pub fn group(&self, name: &str) -> Option<Queue> {
        match self.symbol(name)? {
            Symbol::Group(queue) => Some(queue),
            Symbol::Style(_) => None,
        }
    }

    /// Look up a style symbol
    pub fn style(&self, name: &str) -> Option<Value> {
        match self.symbol(name)? {
            Symbol::Style(value) => Some(value),
            Symbol::Group(_) => None,
        }
    }

    /// Register a command kind under its behavior's name
    pub fn register_kind(&self, behavior: Behavior) {
        let name = behavior.kind().to_string();
        self.kinds.write().insert(name, Arc::new(behavior));
    }

    /// Behavior of a command kind
    pub fn kind(&self, name: &str) -> Option<Arc<Behavior>> {
        self.kinds.read().get(name).cloned()
    }

    /// Append a handler factory. Earlier factories take precedence.
    pub fn register_handler(&self, factory: HandlerFactory) {
        self.factories.write().push(factory);
    }

    /// Register a handler type usable directly as an execution target
    pub fn register_handler_type<H: Handler + 'static>(&self) {
        self.register_handler(HandlerFactory::for_type::<H>());
    }

    /// Build a handler with the first accepting factory that does not
    /// decline `target`
    pub fn resolve_handler<'t>(&self, target: &'t mut dyn Any) -> Option<Box<dyn Handler + 't>> {
        let accepting: Vec<HandlerFactory> = self
            .factories
            .read()
            .iter()
            .filter(|f| f.accepts(&*target))
            .cloned()
            .collect();
        let Some((last, earlier)) = accepting.split_last() else {
            debug!("no handler factory accepts the target");
            return None;
        };
        let chosen = earlier
            .iter()
            .find(|f| f.create(&mut *target).is_some())
            .unwrap_or(last);
        let handler = chosen.create(target);
        if handler.is_none() {
            debug!(
                factories = accepting.len(),
                "every accepting handler factory declined the target"
            );
        }
        handler
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("symbols", &self.symbols.read().len())
            .field("kinds", &self.kinds.read().len())
            .field("factories", &self.factories.read().len())
            .finish()
    }
}

/// Built-in symbols. Group symbols are recorded on a plain registry so the
/// registry never owns queues that point back at it.
fn install_symbols(registry: &Registry) {
    let plain = Arc::new(Registry::new());
    let group = || Queue::with_registry(plain.clone());

    let unknown = group();
    unknown
        .cir(Args::new().with("r", 12.0).with("fs", "orange"))
        .txt(
            Args::new()
                .with("str", "?")
                .with("thal", "center")
                .with("tval", "middle")
                .with("font", "bold 20pt serif"),
        );
    registry.define_group("unknown", unknown);

    let tick = group();
    tick.path(Args::new().with("d", "M0,-2L0,2").with("lc", "round"));
    registry.define_group("tick", tick);

    let sqr = group();
    sqr.rec(
        Args::new()
            .with("x", -1.5)
            .with("y", -1.5)
            .with("b", 3.0)
            .with("h", 3.0)
            .with("ls", "transparent"),
    );
    registry.define_group("sqr", sqr);

    registry.define_style("nodcolor", "#333");
    registry.define_style("nodfill", "#dedede");
    registry.define_style("nodfill2", "#aeaeae");
    registry.define_style("linkcolor", "#666");
    registry.define_style("linkfill", "rgba(225,225,225,0.75)");
    registry.define_style("dimcolor", "darkslategray");
    registry.define_style("solid", Value::List(Vec::new()));
    registry.define_style("dash", [15.0, 10.0]);
    registry.define_style("dot", [4.0, 4.0]);
    registry.define_style("dashdot", [25.0, 6.5, 2.0, 6.5]);
    registry.define_style("labelSignificantDigits", 3.0);
}
