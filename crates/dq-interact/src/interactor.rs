//! Per-surface pointer event state and observable signals
//!
//! An [`Interactor`] turns raw pointer input into one shared
//! [`PointerEvent`] record, retypes it (`Pan`, `Drag`, `Click`) and notifies
//! the listeners registered for the resulting [`Topic`]. The record is
//! shared with the [`Selector`] through [`SharedEvent`]; each new input
//! overwrites it before listeners run.
//!
//! Listeners must not call back into the interactor that notifies them.
//!
//! [`Selector`]: crate::selector::Selector

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dq_core::{DragDelta, View};
use glam::DVec2;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::InteractorConfig;
use crate::selector::Selector;

/// Raw pointer input kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Pointer moved
    Move,
    /// Button pressed
    Down,
    /// Button released
    Up,
    /// Pointer entered the surface
    Enter,
    /// Pointer left the surface
    Leave,
    /// Wheel step
    Wheel,
    /// Pointer cancelled by the platform
    Cancel,
}

/// One raw pointer input in device pixels, y pointing down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    /// Input kind
    pub kind: PointerKind,
    /// Device x
    pub x: f64,
    /// Device y
    pub y: f64,
    /// Pressed buttons bitmask (1 = primary)
    pub buttons: u32,
    /// Wheel delta
    pub delta: f64,
    /// Whether this comes from the primary pointer
    pub primary: bool,
}

impl PointerInput {
    /// Primary-pointer input without buttons
    pub fn new(kind: PointerKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            x,
            y,
            buttons: 0,
            delta: 0.0,
            primary: true,
        }
    }

    /// With a buttons bitmask
    pub fn buttons(mut self, buttons: u32) -> Self {
        self.buttons = buttons;
        self
    }

    /// With a wheel delta
    pub fn delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    /// From a secondary pointer
    pub fn secondary(mut self) -> Self {
        self.primary = false;
        self
    }
}

/// Notification topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Pointer moved without a pressed button
    PointerMove,
    /// Button pressed
    PointerDown,
    /// Button released away from where it was pressed
    PointerUp,
    /// Pointer entered the surface
    PointerEnter,
    /// Pointer left the surface
    PointerLeave,
    /// Pointer cancelled
    PointerCancel,
    /// Wheel step
    Wheel,
    /// Pointer moved with the button held over empty space
    Pan,
    /// Pointer moved with the button held over a selected element
    Drag,
    /// Button released where it was pressed
    Click,
    /// Animation frame
    Tick,
    /// Frame rate estimate changed
    Fps,
    /// Registered with a scheduler
    TimerStart,
    /// Removed from a scheduler
    TimerEnd,
}

impl From<PointerKind> for Topic {
    fn from(kind: PointerKind) -> Self {
        match kind {
            PointerKind::Move => Topic::PointerMove,
            PointerKind::Down => Topic::PointerDown,
            PointerKind::Up => Topic::PointerUp,
            PointerKind::Enter => Topic::PointerEnter,
            PointerKind::Leave => Topic::PointerLeave,
            PointerKind::Wheel => Topic::Wheel,
            PointerKind::Cancel => Topic::PointerCancel,
        }
    }
}

/// Shared pointer event record
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    /// Topic of the last processed input
    pub kind: Option<Topic>,
    /// Device x
    pub x: f64,
    /// Device y, flipped for cartesian views
    pub y: f64,
    /// Device x of the previous input
    pub xi: f64,
    /// Device y of the previous input
    pub yi: f64,
    /// Device movement since the previous input
    pub dx: f64,
    /// Device movement since the previous input
    pub dy: f64,
    /// Pressed buttons bitmask
    pub btn: u32,
    /// Button change since the previous input
    pub dbtn: i64,
    /// Device x where the button was last pressed or released
    pub xbtn: f64,
    /// Device y where the button was last pressed or released
    pub ybtn: f64,
    /// User x. While the button is held this is the position before the
    /// current move.
    pub xusr: f64,
    /// User y, same convention as `xusr`
    pub yusr: f64,
    /// User movement of the current move with the button held
    pub dxusr: f64,
    /// User movement of the current move with the button held
    pub dyusr: f64,
    /// Wheel delta clamped to `[-1, 1]`
    pub delta: f64,
    /// Pointer is inside the surface
    pub inside: bool,
    /// Something is selected under the pointer
    pub hit: bool,
    /// Scale factor requested by the last wheel step
    pub dscl: f64,
    /// Hit tolerance in user units
    pub eps: f64,
}

impl Default for PointerEvent {
    fn default() -> Self {
        Self {
            kind: None,
            x: -2.0,
            y: -2.0,
            xi: 0.0,
            yi: 0.0,
            dx: 0.0,
            dy: 0.0,
            btn: 0,
            dbtn: 0,
            xbtn: 0.0,
            ybtn: 0.0,
            xusr: -2.0,
            yusr: -2.0,
            dxusr: 0.0,
            dyusr: 0.0,
            delta: 0.0,
            inside: false,
            hit: false,
            dscl: 1.0,
            eps: 5.0,
        }
    }
}

impl PointerEvent {
    /// Record with hit tolerance `eps`
    pub fn with_eps(eps: f64) -> Self {
        Self {
            eps,
            ..Default::default()
        }
    }

    /// Hit-test position in user coordinates
    pub fn usr(&self) -> DVec2 {
        DVec2::new(self.xusr, self.yusr)
    }

    /// Drag step: current pointer position and movement in user coordinates
    pub fn drag_delta(&self) -> DragDelta {
        DragDelta {
            x: self.xusr + self.dxusr,
            y: self.yusr + self.dyusr,
            dx: self.dxusr,
            dy: self.dyusr,
        }
    }
}

/// Event record shared between an interactor and its selectors
pub type SharedEvent = Arc<RwLock<PointerEvent>>;

/// Animation frame notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Frame time in milliseconds
    pub t: f64,
    /// Seconds since the previous frame
    pub dt: f64,
    /// Something changed since the previous frame
    pub dirty: bool,
}

/// Payload delivered to listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal<'a> {
    /// Pointer topics
    Pointer(&'a PointerEvent),
    /// Animation frame
    Tick(Tick),
    /// Frame rate estimate in frames per second
    Fps(u32),
    /// Registered with a scheduler
    TimerStart,
    /// Removed from a scheduler, with the last frame time in seconds
    TimerEnd(f64),
}

/// Handle returned by [`Interactor::on`]
pub type ListenerId = Uuid;

type Listener = Box<dyn FnMut(&Signal<'_>) + Send>;

/// Pointer interaction state of one drawing surface
pub struct Interactor {
    id: Uuid,
    size: DVec2,
    view: View,
    config: InteractorConfig,
    evt: SharedEvent,
    dirty: bool,
    t: Option<f64>,
    attached: bool,
    signals: HashMap<Topic, Vec<(ListenerId, Listener)>>,
}

impl Interactor {
    /// Interactor for a surface of `size` device pixels
    pub fn new(size: DVec2, view: View, config: InteractorConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            size,
            view,
            evt: Arc::new(RwLock::new(PointerEvent::with_eps(config.eps))),
            config,
            dirty: true,
            t: None,
            attached: true,
            signals: HashMap::new(),
        }
    }

    /// Stable identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current view
    pub fn view(&self) -> View {
        self.view
    }

    /// Replace the view, e.g. after panning or zooming
    pub fn set_view(&mut self, view: View) {
        self.view = view;
        self.dirty = true;
    }

    /// Surface size in device pixels
    pub fn size(&self) -> DVec2 {
        self.size
    }

    /// Resize the surface
    pub fn resize(&mut self, size: DVec2) {
        self.size = size;
        self.dirty = true;
    }

    /// The shared event record
    pub fn event(&self) -> SharedEvent {
        self.evt.clone()
    }

    /// Copy of the event record
    pub fn snapshot(&self) -> PointerEvent {
        self.evt.read().clone()
    }

    /// Selector sharing this interactor's event record
    pub fn selector(&self) -> Selector {
        Selector::new(self.event())
    }

    /// Whether something changed since the last tick
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Request a redraw on the next tick
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Time of the last tick in milliseconds
    pub fn last_tick(&self) -> Option<f64> {
        self.t
    }

    /// Whether input is still processed
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Device point to user coordinates
    pub fn pnt_to_usr(&self, p: DVec2) -> DVec2 {
        (p - DVec2::new(self.view.x, self.view.y)) / self.view.scl
    }

    /// Process one pointer input and notify listeners. Returns false when the
    /// input is ignored (detached, or a secondary pointer).
    pub fn handle(&mut self, input: PointerInput) -> bool {
        if !self.attached || !(input.primary || input.kind == PointerKind::Wheel) {
            trace!(kind = ?input.kind, "pointer input ignored");
            return false;
        }
        let view = self.view;
        let snapshot = {
            let mut e = self.evt.write();
            e.kind = Some(input.kind.into());
            e.xi = e.x;
            e.yi = e.y;
            e.dx = 0.0;
            e.dy = 0.0;
            e.x = input.x;
            e.y = if view.cartesian {
                self.size.y - input.y
            } else {
                input.y
            };
            e.xusr = (e.x - view.x) / view.scl;
            e.yusr = (e.y - view.y) / view.scl;
            e.dxusr = 0.0;
            e.dyusr = 0.0;
            e.dbtn = i64::from(input.buttons) - i64::from(e.btn);
            e.btn = input.buttons;
            e.delta = if input.delta.is_nan() {
                0.0
            } else {
                input.delta.clamp(-1.0, 1.0)
            };

            match input.kind {
                PointerKind::Move => {
                    e.dx = e.x - e.xi;
                    e.dy = e.y - e.yi;
                    if e.btn == 1 {
                        e.dxusr = e.dx / view.scl;
                        e.dyusr = e.dy / view.scl;
                        e.xusr -= e.dxusr;
                        e.yusr -= e.dyusr;
                        e.kind = Some(if e.hit { Topic::Drag } else { Topic::Pan });
                    }
                    self.dirty = true;
                }
                PointerKind::Down => {
                    e.xbtn = e.x;
                    e.ybtn = e.y;
                }
                PointerKind::Up => {
                    let clicked = e.x == e.xbtn && e.y == e.ybtn;
                    e.kind = Some(if clicked { Topic::Click } else { Topic::PointerUp });
                    e.xbtn = e.x;
                    e.ybtn = e.y;
                    e.hit = false;
                }
                PointerKind::Enter => e.inside = true,
                PointerKind::Leave => e.inside = false,
                PointerKind::Wheel => {
                    e.dscl = if e.delta > 0.0 {
                        self.config.zoom_in
                    } else {
                        self.config.zoom_out
                    };
                    e.eps /= e.dscl;
                    self.dirty = true;
                }
                PointerKind::Cancel => {}
            }
            e.clone()
        };
        if let Some(topic) = snapshot.kind {
            self.notify(topic, &Signal::Pointer(&snapshot));
        }
        true
    }

    /// Register `listener` for `topic`
    pub fn on<F>(&mut self, topic: Topic, listener: F) -> ListenerId
    where
        F: FnMut(&Signal<'_>) + Send + 'static,
    {
        let id = Uuid::new_v4();
        self.signals
            .entry(topic)
            .or_default()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn off(&mut self, topic: Topic, id: ListenerId) -> bool {
        let Some(listeners) = self.signals.get_mut(&topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Deliver `signal` to every listener of `topic`, in registration order
    pub fn notify(&mut self, topic: Topic, signal: &Signal<'_>) {
        if let Some(listeners) = self.signals.get_mut(&topic) {
            for (_, listener) in listeners.iter_mut() {
                listener(signal);
            }
        }
    }

    /// One animation frame
    pub(crate) fn tick(&mut self, time: f64) {
        let dt = self.t.map_or(0.0, |t| (time - t) / 1000.0);
        let tick = Tick {
            t: time,
            dt,
            dirty: self.dirty,
        };
        self.notify(Topic::Tick, &Signal::Tick(tick));
        self.t = Some(time);
        self.dirty = false;
    }

    /// Stop processing input and drop every listener
    pub fn teardown(&mut self) {
        self.attached = false;
        self.signals.clear();
        let mut e = self.evt.write();
        e.kind = None;
        e.inside = false;
        e.hit = false;
        e.btn = 0;
        debug!(id = %self.id, "interactor torn down");
    }
}

impl fmt::Debug for Interactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interactor")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("view", &self.view)
            .field("dirty", &self.dirty)
            .field("attached", &self.attached)
            .field("topics", &self.signals.len())
            .finish()
    }
}
