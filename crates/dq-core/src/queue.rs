//! Command queue and builder
//!
//! A [`Queue`] is an ordered, append-only list of [`Command`]s. Builder
//! methods return `&Self` so calls chain:
//!
//! ```ignore
//! let q = Queue::new();
//! q.view(Args::new().with("cartesian", true))
//!     .cir(Args::new().with("x", 50.0).with("y", 50.0).with("r", 20.0))
//!     .lin(Args::new().with("x1", "@A.x").with("y1", 0.0).with("x2", 100.0).with("y2", 0.0));
//! ```
//!
//! Recording never validates arguments. Malformed input is kept and
//! degrades to partial or no output when executed.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::args::{Args, IdIndex};
use crate::points::{RawPoints, SharedPoints};
use crate::registry::Registry;
use crate::value::Value;

/// One recorded drawing instruction
#[derive(Clone)]
pub struct Command {
    /// Command name (`cir`, `beg`, `use`, ...)
    pub name: String,
    /// Argument object
    pub args: Option<Args>,
    /// Attached sub-queue (`use`, `ins`)
    pub sub: Option<Queue>,
}

impl Command {
    /// Command with arguments
    pub fn new(name: impl Into<String>, args: Args) -> Self {
        Self {
            name: name.into(),
            args: Some(args),
            sub: None,
        }
    }

    /// Command without arguments
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            sub: None,
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Command");
        s.field("name", &self.name);
        if let Some(args) = &self.args {
            s.field("args", args);
        }
        if let Some(sub) = &self.sub {
            s.field("sub", sub);
        }
        s.finish()
    }
}

/// View parameters recorded by the `view` command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    /// Origin x in device units
    pub x: f64,
    /// Origin y in device units
    pub y: f64,
    /// Scale factor
    pub scl: f64,
    /// y axis points up
    pub cartesian: bool,
}

impl Default for View {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scl: 1.0,
            cartesian: false,
        }
    }
}

impl View {
    /// Read view parameters from an argument object
    pub fn from_args(args: &Args) -> Self {
        Self {
            x: args.num_or("x", 0.0),
            y: args.num_or("y", 0.0),
            scl: args.num_or("scl", 1.0),
            cartesian: args.flag("cartesian"),
        }
    }
}

/// Reference to a group drawn by [`Queue::instance`]
#[derive(Debug, Clone)]
pub enum GroupRef {
    /// Inline queue
    Queue(Queue),
    /// Symbol name
    Name(String),
}

impl From<Queue> for GroupRef {
    fn from(queue: Queue) -> Self {
        GroupRef::Queue(queue)
    }
}

impl From<&Queue> for GroupRef {
    fn from(queue: &Queue) -> Self {
        GroupRef::Queue(queue.clone())
    }
}

impl From<&str> for GroupRef {
    fn from(name: &str) -> Self {
        GroupRef::Name(name.to_string())
    }
}

impl From<String> for GroupRef {
    fn from(name: String) -> Self {
        GroupRef::Name(name)
    }
}

struct QueueState {
    commands: Vec<Command>,
    view: View,
}

/// Ordered list of drawing commands
#[derive(Clone)]
pub struct Queue {
    state: Arc<RwLock<QueueState>>,
    index: Arc<RwLock<IdIndex>>,
    registry: Arc<Registry>,
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue {
    /// Empty queue on the process-wide registry
    pub fn new() -> Self {
        Self::with_registry(Registry::global())
    }

    /// Empty queue on `registry`
    pub fn with_registry(registry: Arc<Registry>) -> Self {
        Self {
            state: Arc::new(RwLock::new(QueueState {
                commands: Vec::new(),
                view: View::default(),
            })),
            index: Arc::new(RwLock::new(IdIndex::new())),
            registry,
        }
    }

    /// Registry this queue resolves kinds, symbols and handlers against
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Append a command of kind `name`.
    ///
    /// The argument object is linked to the kind's behavior and its
    /// `@id.property` strings become live references.
    pub fn add(&self, name: &str, args: Args) -> &Self {
        args.bind(self.registry.kind(name), &self.index);
        if let Some(id) = args.id() {
            self.index.write().entry(id).or_insert_with(|| args.clone());
        }
        self.state.write().commands.push(Command::new(name, args));
        self
    }

    /// Append a prepared command without binding
    pub fn push(&self, command: Command) -> &Self {
        self.state.write().commands.push(command);
        self
    }

    /// Remove all commands from `len` onward; `None` removes everything
    pub fn truncate(&self, len: impl Into<Option<usize>>) -> &Self {
        let len = len.into().unwrap_or(0);
        let mut state = self.state.write();
        state.commands.truncate(len);
        let mut index = self.index.write();
        index.clear();
        for args in state.commands.iter().filter_map(|c| c.args.as_ref()) {
            if let Some(id) = args.id() {
                index.entry(id).or_insert_with(|| args.clone());
            }
        }
        self
    }

    /// Remove every command
    pub fn del(&self) -> &Self {
        self.truncate(None)
    }

    /// Open a scope (`beg`) with local transform and style overrides
    pub fn begin_scope(&self, opts: Args) -> &Self {
        self.add("beg", opts)
    }

    /// Close the innermost open scope (`end`).
    ///
    /// Without an unmatched `beg` this does nothing.
    pub fn end_scope(&self) -> &Self {
        let unmatched = {
            let state = self.state.read();
            let mut depth = 0usize;
            let mut found = false;
            for cmd in state.commands.iter().rev() {
                match cmd.name.as_str() {
                    "end" => depth += 1,
                    "beg" if depth == 0 => {
                        found = true;
                        break;
                    }
                    "beg" => depth -= 1,
                    _ => {}
                }
            }
            found
        };
        if unmatched {
            self.push(Command::bare("end"));
        } else {
            debug!("end without open scope ignored");
        }
        self
    }

    /// Draw a group inside its own scope (`use`).
    ///
    /// Unknown symbol names draw the `unknown` symbol. A queue instancing
    /// itself is ignored.
    pub fn instance(&self, group: impl Into<GroupRef>, opts: Args) -> &Self {
        let group = match group.into() {
            GroupRef::Queue(queue) => Some(queue),
            GroupRef::Name(name) => self
                .registry
                .group(&name)
                .or_else(|| self.registry.group("unknown")),
        };
        let Some(group) = group else {
            debug!("no group to instance");
            return self;
        };
        if group.ptr_eq(self) {
            debug!("self-referential instance ignored");
            return self;
        }
        // references in the options resolve against this queue, not the wrapper
        opts.bind(None, &self.index);
        let sub = Queue::with_registry(self.registry.clone());
        sub.begin_scope(opts.clone()).inject(&group).end_scope();
        self.push(Command {
            name: "use".into(),
            args: Some(opts),
            sub: Some(sub),
        })
    }

    /// Record `queue` as a nested sub-queue (`ins`), expanded at execution time
    pub fn inject(&self, queue: &Queue) -> &Self {
        if queue.ptr_eq(self) {
            debug!("self-referential inject ignored");
            return self;
        }
        self.push(Command {
            name: "ins".into(),
            args: None,
            sub: Some(queue.clone()),
        })
    }

    /// Run `f` against this queue immediately
    pub fn inject_fn(&self, f: impl FnOnce(&Queue)) -> &Self {
        f(self);
        self
    }

    /// Circular arc `x, y, r, w, dw`
    pub fn arc(&self, args: Args) -> &Self {
        self.add("arc", args)
    }

    /// Centered, rotated box `x, y, b, h, w`
    pub fn bbox(&self, args: Args) -> &Self {
        self.add("box", args)
    }

    /// Circle `x, y, r`
    pub fn cir(&self, args: Args) -> &Self {
        self.add("cir", args)
    }

    /// Clear the whole surface
    pub fn clear(&self) -> &Self {
        self.add("clr", Args::new())
    }

    /// Ellipse `x, y, rx, ry, w`
    pub fn ell(&self, args: Args) -> &Self {
        self.add("ell", args)
    }

    /// Adaptive background grid `color, size`
    pub fn grid(&self, args: Args) -> &Self {
        self.add("grid", args)
    }

    /// Image `uri, x, y, b, h, sx, sy, sb, sh, xoff, yoff, w, scl`
    pub fn img(&self, args: Args) -> &Self {
        self.add("img", args)
    }

    /// Line `x1, y1, x2, y2`
    pub fn lin(&self, args: Args) -> &Self {
        self.add("lin", args)
    }

    /// Path from `seg` segments or an SVG `d` string
    pub fn path(&self, args: Args) -> &Self {
        self.add("path", args)
    }

    /// Polyline `pts, closed, x, y, w`.
    ///
    /// Point lists are wrapped into a [`SharedPoints`] once, using `format`
    /// when present and detection otherwise.
    pub fn ply(&self, args: Args) -> &Self {
        wrap_points(&args);
        self.add("ply", args)
    }

    /// Rectangle `x, y, b, h`
    pub fn rec(&self, args: Args) -> &Self {
        self.add("rec", args)
    }

    /// Text `str, x, y, w`
    pub fn txt(&self, args: Args) -> &Self {
        self.add("txt", args)
    }

    /// Set the view `x, y, scl, cartesian`
    pub fn view(&self, args: Args) -> &Self {
        self.state.write().view = View::from_args(&args);
        self.add("view", args)
    }

    /// Stroke the current path or the SVG path `d`
    pub fn stroke(&self, args: Args) -> &Self {
        self.add("stroke", args)
    }

    /// Fill the current path or the SVG path `d`
    pub fn fill(&self, args: Args) -> &Self {
        self.add("fill", args)
    }

    /// Fill and stroke the current path or the SVG path `d`
    pub fn drw(&self, args: Args) -> &Self {
        self.add("drw", args)
    }

    /// Interactive handle `x, y`
    pub fn hdl(&self, args: Args) -> &Self {
        self.add("hdl", args)
    }

    /// Node symbol `x, y`
    pub fn nod(&self, args: Args) -> &Self {
        self.add("nod", args)
    }

    /// Polygonal link `pts, closed, x, y, w`
    pub fn link(&self, args: Args) -> &Self {
        wrap_points(&args);
        self.add("link", args)
    }

    /// Snapshot of the recorded commands
    pub fn commands(&self) -> Vec<Command> {
        self.state.read().commands.clone()
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.state.read().commands.len()
    }

    /// Whether nothing is recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Argument object of the first command with `id`
    pub fn find_by_id(&self, id: &str) -> Option<Args> {
        self.index.read().get(id).cloned()
    }

    /// Last recorded view
    pub fn view_params(&self) -> View {
        self.state.read().view
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Queue) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

fn wrap_points(args: &Args) {
    let Some(Value::List(values)) = args.get("pts") else {
        return;
    };
    let raw = match args.str("format") {
        Some(format) => RawPoints::from_format(&format, &values),
        None => RawPoints::detect(&values),
    };
    args.set(
        "pts",
        SharedPoints::new(raw.unwrap_or(RawPoints::Flat(Vec::new()))),
    );
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_list()
            .entries(state.commands.iter().map(|c| &c.name))
            .finish()
    }
}
