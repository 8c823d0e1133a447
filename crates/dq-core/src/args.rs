//! Argument objects
//!
//! Every recorded command carries an [`Args`] handle. Fields are tagged:
//! a plain [`Field::Literal`], a live [`Field::Reference`] to another
//! command's argument (`@id.property`), or a [`Field::Computed`] getter.
//! Reads go through a small evaluator, so references and computed fields
//! always reflect the current state of whatever they depend on.
//!
//! Keys missing on the object itself fall through to the command kind's
//! [`Behavior`]: capability accessors first, then behavior defaults.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use glam::DVec2;
use parking_lot::RwLock;
use tracing::debug;

use crate::capability::{Anchor, Behavior, DragDelta, Locator};
use crate::value::Value;

/// Computed field getter
pub type Computed = Arc<dyn Fn(&Args) -> Value + Send + Sync>;

/// Id → argument object index maintained by a queue
pub(crate) type IdIndex = HashMap<String, Args>;

/// A single argument field
#[derive(Clone)]
pub enum Field {
    /// Plain value
    Literal(Value),
    /// Live `@id.property` lookup
    Reference(Reference),
    /// Getter evaluated on every read
    Computed(Computed),
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Literal(v) => write!(f, "{v:?}"),
            Field::Reference(r) => write!(f, "@{}.{}", r.target, r.property),
            Field::Computed(_) => write!(f, "<computed>"),
        }
    }
}

/// Nesting limit for reference lookups. Deeper chains are treated as
/// cycles.
const MAX_REFERENCE_DEPTH: usize = 64;

thread_local! {
    static REFERENCE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Counts one level of reference nesting while alive
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        REFERENCE_DEPTH.with(|depth| {
            let n = depth.get();
            if n >= MAX_REFERENCE_DEPTH {
                return None;
            }
            depth.set(n + 1);
            Some(DepthGuard)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        REFERENCE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Deferred binding to a property of another command in the same queue.
///
/// Never resolved at record time, so a reference may name a command that is
/// added later.
#[derive(Clone)]
pub struct Reference {
    /// Target command `id`
    pub target: String,
    /// Property read on the target
    pub property: String,
    index: Weak<RwLock<IdIndex>>,
}

impl Reference {
    /// Split `@id.property` into its parts. Strings without a dot are not
    /// id references.
    pub fn parse(text: &str) -> Option<(&str, &str)> {
        let (target, property) = text.strip_prefix('@')?.split_once('.')?;
        if target.is_empty() || property.is_empty() {
            return None;
        }
        Some((target, property))
    }

    pub(crate) fn bound(target: &str, property: &str, index: &Arc<RwLock<IdIndex>>) -> Self {
        Self {
            target: target.to_string(),
            property: property.to_string(),
            index: Arc::downgrade(index),
        }
    }

    /// Resolve against the owning queue. Unresolvable and cyclic references
    /// read as `0`.
    pub fn resolve(&self) -> Value {
        let Some(_depth) = DepthGuard::enter() else {
            debug!(id = %self.target, property = %self.property, "reference cycle reads as 0");
            return Value::Num(0.0);
        };
        let target = self
            .index
            .upgrade()
            .and_then(|index| index.read().get(&self.target).cloned());
        target
            .and_then(|args| args.get(&self.property))
            .unwrap_or(Value::Num(0.0))
    }
}

/// Backing storage of an [`Args`] handle
#[derive(Default)]
pub struct ArgObject {
    fields: HashMap<String, Field>,
    behavior: Option<Arc<Behavior>>,
    state: u8,
}

/// Shared argument object handle
#[derive(Clone, Default)]
pub struct Args(Arc<RwLock<ArgObject>>);

impl Args {
    /// Empty argument object
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a literal field
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0
            .write()
            .fields
            .insert(key.into(), Field::Literal(value.into()));
        self
    }

    /// Builder: set a computed field
    pub fn computed<F>(self, key: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&Args) -> Value + Send + Sync + 'static,
    {
        self.0
            .write()
            .fields
            .insert(key.into(), Field::Computed(Arc::new(getter)));
        self
    }

    /// Builder: set a raw field
    pub fn with_field(self, key: impl Into<String>, field: Field) -> Self {
        self.0.write().fields.insert(key.into(), field);
        self
    }

    /// Evaluate `key`: own field, then behavior accessor, then behavior default.
    pub fn get(&self, key: &str) -> Option<Value> {
        let (field, behavior) = {
            let obj = self.0.read();
            (obj.fields.get(key).cloned(), obj.behavior.clone())
        };
        match field {
            Some(Field::Literal(v)) => Some(v),
            Some(Field::Reference(r)) => Some(r.resolve()),
            Some(Field::Computed(getter)) => Some(getter(self)),
            None => behavior.and_then(|b| b.get(self, key)),
        }
    }

    /// Own field only, without evaluating accessors or defaults
    pub fn field(&self, key: &str) -> Option<Field> {
        self.0.read().fields.get(key).cloned()
    }

    /// Whether `key` resolves to anything
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Whether the object itself carries `key`
    pub fn has_own(&self, key: &str) -> bool {
        self.0.read().fields.contains_key(key)
    }

    /// Own field names
    pub fn keys(&self) -> Vec<String> {
        self.0.read().fields.keys().cloned().collect()
    }

    /// Numeric read
    pub fn num(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_num())
    }

    /// Numeric read with fallback
    pub fn num_or(&self, key: &str, default: f64) -> f64 {
        self.num(key).unwrap_or(default)
    }

    /// String read
    pub fn str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truthiness of `key` (missing is false)
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.truthy())
    }

    /// `{x, y}` read of a point-valued field
    pub fn point(&self, key: &str) -> Option<DVec2> {
        self.get(key).and_then(|v| v.as_point())
    }

    /// Write `key`.
    ///
    /// An own field is overwritten. A key owned by a behavior accessor is
    /// routed to its setter. Anything else becomes a new own field.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let behavior = {
            let mut obj = self.0.write();
            if let Some(field) = obj.fields.get_mut(key) {
                *field = Field::Literal(value);
                return;
            }
            obj.behavior.clone()
        };
        if behavior.is_some_and(|b| b.set(self, key, &value)) {
            return;
        }
        self.0
            .write()
            .fields
            .insert(key.to_string(), Field::Literal(value));
    }

    /// Read-modify-write of `key`. Missing keys start as `0`.
    pub fn modify(&self, key: &str, f: impl FnOnce(&mut Value)) {
        let mut value = self.get(key).unwrap_or(Value::Num(0.0));
        f(&mut value);
        self.set(key, value);
    }

    /// Remove an own field
    pub fn remove(&self, key: &str) -> Option<Field> {
        self.0.write().fields.remove(key)
    }

    /// The `id` field, if any
    pub fn id(&self) -> Option<String> {
        match self.field("id")? {
            Field::Literal(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Transient selection state bits
    pub fn state(&self) -> u8 {
        self.0.read().state
    }

    /// Replace the selection state bits
    pub fn set_state(&self, state: u8) {
        self.0.write().state = state;
    }

    /// Composed behavior of the command kind
    pub fn behavior(&self) -> Option<Arc<Behavior>> {
        self.0.read().behavior.clone()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Hit test through the attached behavior
    pub fn hit(&self, pos: DVec2, eps: f64) -> bool {
        self.behavior()
            .and_then(|b| b.hittable.clone())
            .is_some_and(|h| h.hit(self, pos, eps))
    }

    /// Whether the attached behavior can be hit-tested
    pub fn is_hittable(&self) -> bool {
        self.behavior().is_some_and(|b| b.hittable.is_some())
    }

    /// Parametric point through the attached behavior
    pub fn point_at(&self, loc: &Locator, cartesian: bool) -> Option<Anchor> {
        let path = self.behavior()?.path.clone()?;
        Some(path.point_at(self, loc, cartesian))
    }

    /// Polygon approximation through the attached behavior
    pub fn as_poly(&self) -> Option<Vec<DVec2>> {
        let outline = self.behavior()?.outline.clone()?;
        Some(outline.as_poly(self))
    }

    /// Apply a drag through the attached behavior. Returns false when the
    /// command kind is not draggable.
    pub fn drag(&self, delta: &DragDelta) -> bool {
        match self.behavior().and_then(|b| b.draggable.clone()) {
            Some(d) => {
                d.drag(self, delta);
                true
            }
            None => false,
        }
    }

    /// Attach `behavior` and turn `@id.property` literals into references
    /// bound to `index`.
    pub(crate) fn bind(&self, behavior: Option<Arc<Behavior>>, index: &Arc<RwLock<IdIndex>>) {
        let mut obj = self.0.write();
        if behavior.is_some() {
            obj.behavior = behavior;
        }
        for field in obj.fields.values_mut() {
            let reference = match field {
                Field::Literal(Value::Str(s)) => {
                    Reference::parse(s).map(|(t, p)| Reference::bound(t, p, index))
                }
                _ => None,
            };
            if let Some(reference) = reference {
                *field = Field::Reference(reference);
            }
        }
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let obj = self.0.read();
        f.debug_map().entries(obj.fields.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Args {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter().fold(Args::new(), |args, (k, v)| args.with(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(entries: &[(&str, Args)]) -> Arc<RwLock<IdIndex>> {
        Arc::new(RwLock::new(
            entries
                .iter()
                .map(|(id, args)| (id.to_string(), args.clone()))
                .collect(),
        ))
    }

    #[test]
    fn test_reference_parse() {
        assert_eq!(Reference::parse("@A.x"), Some(("A", "x")));
        assert_eq!(Reference::parse("@nodcolor"), None);
        assert_eq!(Reference::parse("A.x"), None);
        assert_eq!(Reference::parse("@.x"), None);
    }

    #[test]
    fn test_reference_reads_live_value() {
        let target = Args::new().with("id", "A").with("x", 10.0);
        let index = index_with(&[("A", target.clone())]);
        let dependent = Args::new().with("x", "@A.x");
        dependent.bind(None, &index);

        assert_eq!(dependent.num("x"), Some(10.0));
        target.set("x", 42.0);
        assert_eq!(dependent.num("x"), Some(42.0), "reference must follow the target");
    }

    #[test]
    fn test_unresolved_reference_is_zero() {
        let index = index_with(&[]);
        let dependent = Args::new().with("r", "@missing.r");
        dependent.bind(None, &index);
        assert_eq!(dependent.get("r"), Some(Value::Num(0.0)));
    }

    #[test]
    fn test_reference_cycles_read_zero() {
        let a = Args::new().with("id", "A").with("x", "@A.x");
        let b = Args::new().with("id", "B").with("y", "@C.y");
        let c = Args::new().with("id", "C").with("y", "@B.y");
        let index = index_with(&[("A", a.clone()), ("B", b.clone()), ("C", c.clone())]);
        for args in [&a, &b, &c] {
            args.bind(None, &index);
        }

        assert_eq!(a.get("x"), Some(Value::Num(0.0)), "self reference");
        assert_eq!(b.get("y"), Some(Value::Num(0.0)), "two-step cycle");
        REFERENCE_DEPTH.with(|depth| assert_eq!(depth.get(), 0, "depth unwound"));

        let d = Args::new().with("x", "@A.x").with("r", "@E.r");
        index.write().insert("E".into(), Args::new().with("r", 4.0));
        d.bind(None, &index);
        assert_eq!(d.num("r"), Some(4.0), "acyclic reference after a cycle still resolves");
    }

    #[test]
    fn test_name_reference_stays_literal() {
        let index = index_with(&[]);
        let args = Args::new().with("ls", "@nodcolor");
        args.bind(None, &index);
        assert_eq!(args.str("ls").as_deref(), Some("@nodcolor"));
    }

    #[test]
    fn test_computed_field() {
        let args = Args::new()
            .with("r", 3.0)
            .computed("d", |a| Value::Num(2.0 * a.num_or("r", 0.0)));
        assert_eq!(args.num("d"), Some(6.0));
        args.set("r", 5.0);
        assert_eq!(args.num("d"), Some(10.0));
    }

    #[test]
    fn test_set_overwrites_reference() {
        let index = index_with(&[("A", Args::new().with("x", 1.0))]);
        let args = Args::new().with("x", "@A.x");
        args.bind(None, &index);
        args.set("x", 7.0);
        assert_eq!(args.num("x"), Some(7.0));
    }

    #[test]
    fn test_modify_and_flag() {
        let args = Args::new().with("x", 1.0).with("closed", false);
        args.modify("x", |v| *v = Value::Num(v.as_num().unwrap_or(0.0) + 4.0));
        assert_eq!(args.num("x"), Some(5.0));
        assert!(!args.flag("closed"));
        assert!(!args.flag("missing"));
    }
}
