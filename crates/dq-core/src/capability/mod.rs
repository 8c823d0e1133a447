//! Capability composition
//!
//! A command kind's behavior is assembled from small capabilities instead of
//! an inheritance chain. Each [`Capability`] may implement any of the
//! interfaces below, declare default values, and contribute one auxiliary
//! sub-drawing [`Producer`] tagged with a level.
//!
//! [`Behavior::compose`] resolves a list of capabilities once, at command
//! kind registration:
//! - slots (accessor keys, hit test, parametric path, outline, drag) are
//!   filled in order, later capabilities overriding earlier ones
//! - defaults are merged the same way; a later default for a key shadows
//!   an earlier accessor of that key
//! - producers are sorted by ascending level; a single producer is exposed
//!   through [`Behavior::single`], several through [`Behavior::producers`]

mod hatch;
mod label;
mod shapes;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use glam::DVec2;

use crate::args::Args;
use crate::queue::{Queue, View};
use crate::registry::Registry;
use crate::value::{Value, ValueMap};

pub use hatch::{hatch, hatch_lines};
pub use label::{format_label, label};
pub use shapes::{arc, box_shape, circular, line, point, rect};

/// Computed getters and setters for a fixed set of keys
pub trait Accessor: Send + Sync {
    /// Keys this accessor owns
    fn keys(&self) -> &'static [&'static str];

    /// Evaluate `key`; `None` falls through to behavior defaults
    fn get(&self, args: &Args, key: &str) -> Option<Value>;

    /// Write `key`; returning false stores it as a plain field instead
    fn set(&self, _args: &Args, _key: &str, _value: &Value) -> bool {
        false
    }
}

/// Pointer hit test
pub trait Hittable: Send + Sync {
    /// Whether `pos` hits the shape within tolerance `eps`
    fn hit(&self, args: &Args, pos: DVec2, eps: f64) -> bool;
}

/// Parametric anchor points
pub trait ParametricPath: Send + Sync {
    /// Point and unit outward normal at `loc`. In a cartesian view the y
    /// axis points up.
    fn point_at(&self, args: &Args, loc: &Locator, cartesian: bool) -> Anchor;
}

/// Polygon approximation
pub trait Outline: Send + Sync {
    /// Closed polygon approximating the shape
    fn as_poly(&self, args: &Args) -> Vec<DVec2>;
}

/// Pointer drag support
pub trait Draggable: Send + Sync {
    /// Apply one drag step
    fn drag(&self, args: &Args, delta: &DragDelta);

    /// Drag started
    fn drag_begin(&self, _args: &Args) {}

    /// Drag ended
    fn drag_end(&self, _args: &Args) {}
}

/// One drag step in user coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragDelta {
    /// Pointer x
    pub x: f64,
    /// Pointer y
    pub y: f64,
    /// Movement since the previous step
    pub dx: f64,
    /// Movement since the previous step
    pub dy: f64,
}

/// Location on a parametric path
#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Named anchor (`c`, `e`, `ne`, `n`, `nw`, `w`, `sw`, `s`, `se`, `beg`, `mid`, `end`)
    Named(String),
    /// Fraction along the path, or of a revolution for circular shapes
    Fraction(f64),
}

impl Locator {
    /// Interpret an argument value. Numeric strings count as fractions.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Num(n) => Some(Locator::Fraction(*n)),
            Value::Str(s) => Some(
                s.parse()
                    .map(Locator::Fraction)
                    .unwrap_or_else(|_| Locator::Named(s.clone())),
            ),
            _ => None,
        }
    }
}

impl From<&str> for Locator {
    fn from(name: &str) -> Self {
        Locator::Named(name.to_string())
    }
}

impl From<f64> for Locator {
    fn from(t: f64) -> Self {
        Locator::Fraction(t)
    }
}

/// Point with unit outward normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Position
    pub pos: DVec2,
    /// Unit outward normal
    pub normal: DVec2,
}

impl Anchor {
    /// Anchor from components
    pub fn new(x: f64, y: f64, nx: f64, ny: f64) -> Self {
        Self {
            pos: DVec2::new(x, y),
            normal: DVec2::new(nx, ny),
        }
    }

    /// `{x, y, nx, ny}` map
    pub fn to_value(&self) -> Value {
        Value::map([
            ("x", self.pos.x),
            ("y", self.pos.y),
            ("nx", self.normal.x),
            ("ny", self.normal.y),
        ])
    }
}

/// Context handed to producers
#[derive(Clone)]
pub struct DrawContext {
    /// View of the queue being executed
    pub view: View,
    /// Registry of the queue being executed
    pub registry: Arc<Registry>,
}

impl DrawContext {
    /// Empty queue on the same registry
    pub fn queue(&self) -> Queue {
        Queue::with_registry(self.registry.clone())
    }
}

/// Producer callback
pub type ProduceFn = Arc<dyn Fn(&Args, &DrawContext) -> Option<Queue> + Send + Sync>;

/// Auxiliary sub-drawing producer
#[derive(Clone)]
pub struct Producer {
    /// Ordering level, lower runs first
    pub level: i32,
    /// Returns the sub-queue to draw after the command, if any
    pub produce: ProduceFn,
}

impl Producer {
    /// Producer at `level`
    pub fn new<F>(level: i32, produce: F) -> Self
    where
        F: Fn(&Args, &DrawContext) -> Option<Queue> + Send + Sync + 'static,
    {
        Self {
            level,
            produce: Arc::new(produce),
        }
    }

    /// Run the producer
    pub fn produce(&self, args: &Args, cx: &DrawContext) -> Option<Queue> {
        (self.produce)(args, cx)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer").field("level", &self.level).finish()
    }
}

/// A bundle of optional interface implementations
#[derive(Clone, Default)]
pub struct Capability {
    /// Name for diagnostics
    pub name: &'static str,
    /// Default values
    pub defaults: ValueMap,
    /// Computed getters
    pub accessor: Option<Arc<dyn Accessor>>,
    /// Hit test
    pub hittable: Option<Arc<dyn Hittable>>,
    /// Parametric anchors
    pub path: Option<Arc<dyn ParametricPath>>,
    /// Polygon approximation
    pub outline: Option<Arc<dyn Outline>>,
    /// Drag support
    pub draggable: Option<Arc<dyn Draggable>>,
    /// Sub-drawing producer
    pub producer: Option<Producer>,
}

impl Capability {
    /// Empty capability
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    /// Add a default value
    pub fn default_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self
    }

    /// Set the accessor
    pub fn accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Set the hit test
    pub fn hittable(mut self, hittable: impl Hittable + 'static) -> Self {
        self.hittable = Some(Arc::new(hittable));
        self
    }

    /// Set the parametric path
    pub fn path(mut self, path: impl ParametricPath + 'static) -> Self {
        self.path = Some(Arc::new(path));
        self
    }

    /// Set the outline
    pub fn outline(mut self, outline: impl Outline + 'static) -> Self {
        self.outline = Some(Arc::new(outline));
        self
    }

    /// Set drag support
    pub fn draggable(mut self, draggable: impl Draggable + 'static) -> Self {
        self.draggable = Some(Arc::new(draggable));
        self
    }

    /// Set the producer
    pub fn producer<F>(mut self, level: i32, produce: F) -> Self
    where
        F: Fn(&Args, &DrawContext) -> Option<Queue> + Send + Sync + 'static,
    {
        self.producer = Some(Producer::new(level, produce));
        self
    }
}

/// Composed behavior of one command kind
#[derive(Default)]
pub struct Behavior {
    kind: String,
    accessors: HashMap<&'static str, Arc<dyn Accessor>>,
    defaults: ValueMap,
    pub(crate) hittable: Option<Arc<dyn Hittable>>,
    pub(crate) path: Option<Arc<dyn ParametricPath>>,
    pub(crate) outline: Option<Arc<dyn Outline>>,
    pub(crate) draggable: Option<Arc<dyn Draggable>>,
    producers: Vec<Producer>,
    single: Option<Producer>,
}

impl Behavior {
    /// Compose `caps` in order
    pub fn compose(kind: &str, caps: impl IntoIterator<Item = Capability>) -> Self {
        let mut behavior = Behavior {
            kind: kind.to_string(),
            ..Default::default()
        };
        let mut producers = Vec::new();
        for cap in caps {
            for (key, value) in cap.defaults {
                behavior.accessors.remove(key.as_str());
                behavior.defaults.insert(key, value);
            }
            if let Some(accessor) = cap.accessor {
                for key in accessor.keys() {
                    behavior.accessors.insert(key, accessor.clone());
                }
            }
            if cap.hittable.is_some() {
                behavior.hittable = cap.hittable;
            }
            if cap.path.is_some() {
                behavior.path = cap.path;
            }
            if cap.outline.is_some() {
                behavior.outline = cap.outline;
            }
            if cap.draggable.is_some() {
                behavior.draggable = cap.draggable;
            }
            if let Some(producer) = cap.producer {
                producers.push(producer);
            }
        }
        producers.sort_by_key(|p| p.level);
        if producers.len() == 1 {
            behavior.single = producers.pop();
        } else {
            behavior.producers = producers;
        }
        behavior
    }

    /// Command kind name
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Accessor value, then default
    pub fn get(&self, args: &Args, key: &str) -> Option<Value> {
        self.accessors
            .get(key)
            .and_then(|a| a.get(args, key))
            .or_else(|| self.defaults.get(key).cloned())
    }

    /// Route a write to the accessor owning `key`
    pub fn set(&self, args: &Args, key: &str, value: &Value) -> bool {
        self.accessors
            .get(key)
            .is_some_and(|a| a.set(args, key, value))
    }

    /// Default value of `key`
    pub fn default_of(&self, key: &str) -> Option<&Value> {
        self.defaults.get(key)
    }

    /// Ordered producers (empty unless more than one was composed)
    pub fn producers(&self) -> &[Producer] {
        &self.producers
    }

    /// The only producer, when exactly one was composed
    pub fn single(&self) -> Option<&Producer> {
        self.single.as_ref()
    }

    /// Whether a hit test is available
    pub fn is_hittable(&self) -> bool {
        self.hittable.is_some()
    }

    /// Whether drag support is available
    pub fn is_draggable(&self) -> bool {
        self.draggable.is_some()
    }

    /// Drag support
    pub fn draggable(&self) -> Option<&Arc<dyn Draggable>> {
        self.draggable.as_ref()
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behavior")
            .field("kind", &self.kind)
            .field("producers", &self.producers)
            .field("single", &self.single)
            .finish()
    }
}
