//! Built-in command kinds
//!
//! Each kind is a declared list of capabilities, composed once when the
//! registry is built.

use crate::args::Args;
use crate::capability::{
    Behavior, Capability, arc, box_shape, circular, hatch, label, line, point, rect,
};
use crate::registry::Registry;
use crate::value::Value;

/// Copy `keys` that resolve on `from` onto `to`
fn pass(from: &Args, mut to: Args, keys: &[&str]) -> Args {
    for key in keys {
        if let Some(value) = from.get(key) {
            to = to.with(*key, value);
        }
    }
    to
}

fn or_default(args: &Args, key: &str, default: impl Into<Value>) -> Value {
    args.get(key).unwrap_or_else(|| default.into())
}

/// Draggable handle drawn as a highlighted circle
fn handle() -> Capability {
    Capability::new("hdl")
        .default_value("r", 5.0)
        .default_value("isSolid", true)
        .default_value("draggable", true)
        .default_value("lbloc", "se")
        .producer(0, |args, cx| {
            let circle = pass(args, Args::new(), &["x", "y", "r", "sh"])
                .with("ls", or_default(args, "ls", "black"))
                .with("fs", or_default(args, "fs", "#ffc"));
            let queue = cx.queue();
            queue.cir(circle);
            Some(queue)
        })
}

/// Node symbol
fn node() -> Capability {
    Capability::new("nod")
        .default_value("r", 5.0)
        .default_value("lbloc", "se")
        .producer(0, |args, cx| {
            let circle = pass(args, Args::new(), &["x", "y", "r"])
                .with("ls", or_default(args, "ls", "@nodcolor"))
                .with("fs", or_default(args, "fs", "@nodfill"));
            let queue = cx.queue();
            queue.cir(circle);
            Some(queue)
        })
}

/// Polygonal link drawn as a thick, round-capped polyline
fn link() -> Capability {
    Capability::new("link")
        .default_value("x", 0.0)
        .default_value("y", 0.0)
        .default_value("w", 0.0)
        .default_value("closed", false)
        .producer(0, |args, cx| {
            let fs = if args.flag("closed") {
                or_default(args, "fs", "@linkfill")
            } else {
                Value::from("transparent")
            };
            let polyline = pass(args, Args::new(), &["pts", "format", "x", "y", "w", "closed"])
                .with("ls", or_default(args, "ls", "@linkcolor"))
                .with("fs", fs)
                .with("lw", or_default(args, "lw", 5.0))
                .with("lc", or_default(args, "lc", "round"))
                .with("lj", or_default(args, "lj", "round"));
            let queue = cx.queue();
            queue.ply(polyline);
            Some(queue)
        })
}

/// Register the built-in command kinds on `registry`
pub fn install(registry: &Registry) {
    registry.register_kind(Behavior::compose("arc", [point(), arc(), label(), hatch()]));
    registry.register_kind(Behavior::compose("box", [label(), hatch(), box_shape()]));
    registry.register_kind(Behavior::compose("cir", [point(), circular(), label(), hatch()]));
    registry.register_kind(Behavior::compose("lin", [line(), label()]));
    registry.register_kind(Behavior::compose("rec", [label(), hatch(), rect()]));
    registry.register_kind(Behavior::compose(
        "hdl",
        [point(), circular(), label(), hatch(), handle()],
    ));
    registry.register_kind(Behavior::compose("nod", [point(), circular(), label(), node()]));
    registry.register_kind(Behavior::compose("link", [link()]));
}
