//! Geometric capabilities: point, line, arc, circular, box and rect

use std::f64::consts::{SQRT_2, TAU};

use glam::DVec2;

use super::{
    Accessor, Anchor, Capability, DragDelta, Draggable, Hittable, Locator, Outline,
    ParametricPath,
};
use crate::args::Args;
use crate::state;
use crate::value::Value;

/// Read `key` of the point-valued `field`
fn coord_of(args: &Args, field: &str, key: &str) -> Option<Value> {
    args.get(field)?.get(key).cloned()
}

/// Write `key` of the point-valued `field`. False when there is no such field.
fn set_coord_of(args: &Args, field: &str, key: &str, value: &Value) -> bool {
    if !matches!(args.field(field), Some(crate::args::Field::Literal(Value::Map(_)))) {
        return false;
    }
    args.modify(field, |p| {
        if let Value::Map(map) = p {
            map.insert(key.to_string(), value.clone());
        }
    });
    true
}

/// Stroke width used to size polygon approximations
fn stroke_width(args: &Args) -> f64 {
    match args.num("lw") {
        Some(lw) if lw > 0.0 => lw,
        _ => 1.0,
    }
}

/// Parameter along an open path for `loc`
fn path_fraction(loc: &Locator) -> f64 {
    match loc {
        Locator::Fraction(t) => *t,
        Locator::Named(name) => match name.as_str() {
            "beg" => 0.0,
            "end" => 1.0,
            _ => 0.5,
        },
    }
}

struct Point;

impl Accessor for Point {
    fn keys(&self) -> &'static [&'static str] {
        &["x", "y"]
    }

    fn get(&self, args: &Args, key: &str) -> Option<Value> {
        coord_of(args, "p", key)
    }

    fn set(&self, args: &Args, key: &str, value: &Value) -> bool {
        set_coord_of(args, "p", key, value)
    }
}

impl Draggable for Point {
    fn drag(&self, args: &Args, delta: &DragDelta) {
        args.set("x", delta.x);
        args.set("y", delta.y);
    }
}

/// Anchor point `x, y`, optionally backed by a `p: {x, y}` field; dragging
/// moves it to the pointer.
pub fn point() -> Capability {
    Capability::new("point").accessor(Point).draggable(Point)
}

struct Line;

impl Line {
    fn ends(args: &Args) -> (DVec2, DVec2) {
        (
            DVec2::new(args.num_or("x1", 0.0), args.num_or("y1", 0.0)),
            DVec2::new(args.num_or("x2", 0.0), args.num_or("y2", 0.0)),
        )
    }
}

impl Accessor for Line {
    fn keys(&self) -> &'static [&'static str] {
        &["x1", "y1", "x2", "y2", "len"]
    }

    fn get(&self, args: &Args, key: &str) -> Option<Value> {
        match key {
            "x1" => coord_of(args, "p1", "x"),
            "y1" => coord_of(args, "p1", "y"),
            "x2" => coord_of(args, "p2", "x"),
            "y2" => coord_of(args, "p2", "y"),
            "len" => {
                let (a, b) = Line::ends(args);
                Some(Value::Num(a.distance(b)))
            }
            _ => None,
        }
    }

    fn set(&self, args: &Args, key: &str, value: &Value) -> bool {
        match key {
            "x1" => set_coord_of(args, "p1", "x", value),
            "y1" => set_coord_of(args, "p1", "y", value),
            "x2" => set_coord_of(args, "p2", "x", value),
            "y2" => set_coord_of(args, "p2", "y", value),
            _ => false,
        }
    }
}

impl ParametricPath for Line {
    fn point_at(&self, args: &Args, loc: &Locator, _cartesian: bool) -> Anchor {
        let t = path_fraction(loc);
        let (a, b) = Line::ends(args);
        let d = b - a;
        let len = d.length();
        let p = a + d * t;
        if len > 0.0 {
            Anchor::new(p.x, p.y, d.y / len, -d.x / len)
        } else {
            Anchor::new(p.x, p.y, 0.0, -1.0)
        }
    }
}

impl Hittable for Line {
    fn hit(&self, args: &Args, pos: DVec2, eps: f64) -> bool {
        let (a, b) = Line::ends(args);
        let d = b - a;
        let d1 = pos - a;
        let dot = d.dot(d1);
        let perp = d.perp_dot(d1);
        let len = d.length();
        let band = eps * len;
        -band < perp && perp < band && -band < dot && dot < len * (len + eps)
    }
}

impl Draggable for Line {
    fn drag(&self, args: &Args, delta: &DragDelta) {
        let (a, b) = Line::ends(args);
        args.set("x1", a.x + delta.dx);
        args.set("y1", a.y + delta.dy);
        args.set("x2", b.x + delta.dx);
        args.set("y2", b.y + delta.dy);
    }
}

/// Line segment `x1, y1, x2, y2` (or `p1`, `p2`) with length, parametric
/// points, segment hit test and translation drag.
pub fn line() -> Capability {
    Capability::new("line")
        .accessor(Line)
        .path(Line)
        .hittable(Line)
        .draggable(Line)
}

struct ArcShape;

impl Accessor for ArcShape {
    fn keys(&self) -> &'static [&'static str] {
        &["angle"]
    }

    fn get(&self, args: &Args, _key: &str) -> Option<Value> {
        args.num("dw").map(|dw| Value::Num(dw.to_degrees()))
    }
}

impl ParametricPath for ArcShape {
    fn point_at(&self, args: &Args, loc: &Locator, _cartesian: bool) -> Anchor {
        let t = path_fraction(loc);
        let dw = match args.num("dw") {
            Some(dw) if dw != 0.0 => dw,
            _ => TAU,
        };
        let ang = args.num_or("w", 0.0) + t * dw;
        let (sin, cos) = ang.sin_cos();
        let r = match loc {
            Locator::Named(name) if name == "c" => 0.0,
            _ => args.num_or("r", 0.0),
        };
        Anchor::new(
            args.num_or("x", 0.0) + r * cos,
            args.num_or("y", 0.0) + r * sin,
            cos,
            sin,
        )
    }
}

impl Outline for ArcShape {
    fn as_poly(&self, args: &Args) -> Vec<DVec2> {
        let c = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let r = args.num_or("r", 0.0);
        let w = args.num_or("w", 0.0);
        let dw = args.num_or("dw", TAU);
        let n = (dw.abs() * r / (4.0 * stroke_width(args))).floor();
        if n.is_nan() || n < 1.0 {
            return Vec::new();
        }
        let n = n as usize;
        let step = dw / n as f64;
        (0..=n)
            .map(|i| {
                let (sin, cos) = (w + i as f64 * step).sin_cos();
                c + r * DVec2::new(cos, sin)
            })
            .collect()
    }
}

/// Arc `x, y, r, w, dw` with parametric points along the sweep and a
/// polygon approximation sized by curvature and stroke width.
pub fn arc() -> Capability {
    Capability::new("arc")
        .accessor(ArcShape)
        .path(ArcShape)
        .outline(ArcShape)
}

struct Circular;

impl Circular {
    fn geometry(args: &Args) -> (DVec2, f64) {
        (
            DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0)),
            args.num_or("r", 0.0),
        )
    }

    fn compass(name: &str) -> [f64; 2] {
        let q = SQRT_2 / 2.0;
        match name {
            "e" => [1.0, 0.0],
            "ne" => [q, q],
            "n" => [0.0, 1.0],
            "nw" => [-q, q],
            "w" => [-1.0, 0.0],
            "sw" => [-q, -q],
            "s" => [0.0, -1.0],
            "se" => [q, -q],
            _ => [0.0, 0.0],
        }
    }
}

impl Accessor for Circular {
    fn keys(&self) -> &'static [&'static str] {
        &["isSolid", "len", "lsh", "sh"]
    }

    fn get(&self, args: &Args, key: &str) -> Option<Value> {
        let over = args.state() & state::OVER != 0;
        match key {
            "isSolid" => Some(Value::Bool(
                args.str("fs").is_some_and(|fs| !fs.is_empty() && fs != "transparent"),
            )),
            "len" => Some(Value::Num(TAU * args.num_or("r", 0.0))),
            "lsh" => Some(Value::Bool(over)),
            "sh" if over => Some(Value::List(vec![
                Value::Num(0.0),
                Value::Num(0.0),
                Value::Num(5.0),
                Value::from("black"),
            ])),
            _ => None,
        }
    }
}

impl ParametricPath for Circular {
    fn point_at(&self, args: &Args, loc: &Locator, cartesian: bool) -> Anchor {
        let (c, r) = Circular::geometry(args);
        let [qx, mut qy] = match loc {
            Locator::Fraction(t) => {
                let (sin, cos) = (t * TAU).sin_cos();
                [cos, sin]
            }
            Locator::Named(name) => Circular::compass(name),
        };
        if !cartesian {
            qy = -qy;
        }
        Anchor::new(c.x + qx * r, c.y + qy * r, qx, qy)
    }
}

impl Outline for Circular {
    fn as_poly(&self, args: &Args) -> Vec<DVec2> {
        let (c, r) = Circular::geometry(args);
        let n = ((TAU * r / (4.0 * stroke_width(args))).floor()).max(5.0) as usize;
        let step = TAU / n as f64;
        (0..n)
            .map(|i| {
                let (sin, cos) = (i as f64 * step).sin_cos();
                c + r * DVec2::new(cos, sin)
            })
            .collect()
    }
}

impl Hittable for Circular {
    fn hit(&self, args: &Args, pos: DVec2, eps: f64) -> bool {
        let (c, r) = Circular::geometry(args);
        let dd = c.distance_squared(pos);
        if args.flag("isSolid") {
            dd < r * r
        } else {
            let reps = eps * r;
            let ddis = dd - r * r;
            -reps < ddis && ddis < reps
        }
    }
}

/// Circle `x, y, r`: compass-point and revolution-fraction anchors,
/// point-in (solid) or point-on (outline) hit test, hover shadow.
pub fn circular() -> Capability {
    Capability::new("circular")
        .accessor(Circular)
        .path(Circular)
        .outline(Circular)
        .hittable(Circular)
}

/// Compass anchor table for a `b` × `h` rectangle centered at the origin:
/// `[x, y, nx, ny]`
fn rect_anchor(name: &str, b: f64, h: f64) -> [f64; 4] {
    let diag = b.hypot(h);
    let (dx, dy) = if diag > 0.0 { (b / diag, h / diag) } else { (0.0, 0.0) };
    let (b2, h2) = (b / 2.0, h / 2.0);
    match name {
        "e" => [b2, 0.0, 1.0, 0.0],
        "ne" => [b2, h2, dx, dy],
        "n" => [0.0, h2, 0.0, 1.0],
        "nw" => [-b2, h2, -dx, dy],
        "w" => [-b2, 0.0, -1.0, 0.0],
        "sw" => [-b2, -h2, -dx, -dy],
        "s" => [0.0, -h2, 0.0, -1.0],
        "se" => [b2, -h2, dx, -dy],
        _ => [0.0, 0.0, 0.0, 0.0],
    }
}

fn anchor_name(loc: &Locator) -> &str {
    match loc {
        Locator::Named(name) => name,
        Locator::Fraction(_) => "c",
    }
}

struct BoxShape;

impl Outline for BoxShape {
    fn as_poly(&self, args: &Args) -> Vec<DVec2> {
        let (b2, h2) = (args.num_or("b", 0.0) / 2.0, args.num_or("h", 0.0) / 2.0);
        let c = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let rot = DVec2::from_angle(args.num_or("w", 0.0));
        [
            DVec2::new(-b2, -h2),
            DVec2::new(b2, -h2),
            DVec2::new(b2, h2),
            DVec2::new(-b2, h2),
        ]
        .into_iter()
        .map(|p| c + rot.rotate(p))
        .collect()
    }
}

impl ParametricPath for BoxShape {
    fn point_at(&self, args: &Args, loc: &Locator, _cartesian: bool) -> Anchor {
        let [qx, qy, nx, ny] = rect_anchor(anchor_name(loc), args.num_or("b", 0.0), args.num_or("h", 0.0));
        let c = DVec2::new(args.num_or("x", 0.0), args.num_or("y", 0.0));
        let rot = DVec2::from_angle(args.num_or("w", 0.0));
        let p = c + rot.rotate(DVec2::new(qx, qy));
        let n = rot.rotate(DVec2::new(nx, ny));
        Anchor::new(p.x, p.y, n.x, n.y)
    }
}

/// Centered, rotated box `x, y, b, h, w`
pub fn box_shape() -> Capability {
    Capability::new("box")
        .default_value("x", 0.0)
        .default_value("y", 0.0)
        .default_value("w", 0.0)
        .outline(BoxShape)
        .path(BoxShape)
}

struct Rect;

impl Outline for Rect {
    fn as_poly(&self, args: &Args) -> Vec<DVec2> {
        let (x, y) = (args.num_or("x", 0.0), args.num_or("y", 0.0));
        let (b, h) = (args.num_or("b", 0.0), args.num_or("h", 0.0));
        vec![
            DVec2::new(x, y),
            DVec2::new(x + b, y),
            DVec2::new(x + b, y + h),
            DVec2::new(x, y + h),
        ]
    }
}

impl ParametricPath for Rect {
    fn point_at(&self, args: &Args, loc: &Locator, _cartesian: bool) -> Anchor {
        let (b, h) = (args.num_or("b", 0.0), args.num_or("h", 0.0));
        let [qx, qy, nx, ny] = rect_anchor(anchor_name(loc), b, h);
        Anchor::new(
            args.num_or("x", 0.0) + b / 2.0 + qx,
            args.num_or("y", 0.0) + h / 2.0 + qy,
            nx,
            ny,
        )
    }
}

/// Axis-aligned rectangle `x, y, b, h` anchored at its origin corner
pub fn rect() -> Capability {
    Capability::new("rect").outline(Rect).path(Rect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Behavior;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn bind(args: Args, caps: Vec<Capability>) -> Args {
        let behavior = Arc::new(Behavior::compose("test", caps));
        let index = Arc::new(parking_lot::RwLock::new(Default::default()));
        args.bind(Some(behavior), &index);
        args
    }

    #[test]
    fn test_point_reads_and_writes_p() {
        let args = bind(
            Args::new().with("p", Value::from(DVec2::new(3.0, 4.0))),
            vec![point()],
        );
        assert_eq!(args.num("x"), Some(3.0));
        args.set("x", 7.0);
        assert_eq!(args.point("p"), Some(DVec2::new(7.0, 4.0)), "setter must write through p");
    }

    #[test]
    fn test_line_point_at_and_normal() {
        let args = bind(
            Args::new().with("x1", 0.0).with("y1", 0.0).with("x2", 10.0).with("y2", 0.0),
            vec![line()],
        );
        let mid = args.point_at(&Locator::from("mid"), false).unwrap();
        assert_eq!(mid.pos, DVec2::new(5.0, 0.0));
        assert_eq!(mid.normal, DVec2::new(0.0, -1.0));
        let end = args.point_at(&Locator::from("end"), false).unwrap();
        assert_eq!(end.pos, DVec2::new(10.0, 0.0));
        assert_eq!(args.num("len"), Some(10.0));
    }

    #[test]
    fn test_line_hit_band() {
        let args = bind(
            Args::new().with("x1", 0.0).with("y1", 0.0).with("x2", 10.0).with("y2", 0.0),
            vec![line()],
        );
        assert!(args.hit(DVec2::new(5.0, 2.0), 5.0), "inside the band");
        assert!(!args.hit(DVec2::new(5.0, 6.0), 5.0), "outside the band");
        assert!(!args.hit(DVec2::new(-6.0, 0.0), 5.0), "before the start");
    }

    #[test]
    fn test_line_drag_translates() {
        let args = bind(
            Args::new().with("x1", 0.0).with("y1", 0.0).with("x2", 10.0).with("y2", 0.0),
            vec![line()],
        );
        assert!(args.drag(&DragDelta { x: 0.0, y: 0.0, dx: 1.0, dy: 2.0 }));
        assert_eq!(args.num("x1"), Some(1.0));
        assert_eq!(args.num("y2"), Some(2.0));
    }

    #[test]
    fn test_circular_compass_and_fraction() {
        let args = bind(
            Args::new().with("x", 10.0).with("y", 10.0).with("r", 2.0),
            vec![point(), circular()],
        );
        let n = args.point_at(&Locator::from("n"), true).unwrap();
        assert_eq!(n.pos, DVec2::new(10.0, 12.0));
        let n_screen = args.point_at(&Locator::from("n"), false).unwrap();
        assert_eq!(n_screen.pos, DVec2::new(10.0, 8.0), "y flips outside cartesian views");
        let quarter = args.point_at(&Locator::Fraction(0.25), true).unwrap();
        assert_relative_eq!(quarter.pos.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(quarter.pos.y, 12.0, epsilon = 1e-12);
        let c = args.point_at(&Locator::from("c"), true).unwrap();
        assert_eq!(c.pos, DVec2::new(10.0, 10.0));
    }

    #[test]
    fn test_circular_hit_solid_and_outline() {
        let outline = bind(
            Args::new().with("x", 0.0).with("y", 0.0).with("r", 10.0),
            vec![point(), circular()],
        );
        assert!(!outline.hit(DVec2::new(0.0, 0.0), 1.0), "center misses an outline");
        assert!(outline.hit(DVec2::new(10.0, 0.0), 1.0), "contour hits");

        let solid = bind(
            Args::new().with("x", 0.0).with("y", 0.0).with("r", 10.0).with("fs", "red"),
            vec![point(), circular()],
        );
        assert!(solid.hit(DVec2::new(0.0, 0.0), 1.0), "center hits a solid");
        assert!(!solid.hit(DVec2::new(11.0, 0.0), 1.0));
    }

    #[test]
    fn test_circular_shadow_follows_state() {
        let args = bind(Args::new().with("r", 5.0), vec![point(), circular()]);
        assert_eq!(args.get("sh"), None);
        args.set_state(state::OVER);
        assert!(args.get("sh").is_some(), "hovered circle casts a shadow");
        assert_eq!(args.get("lsh"), Some(Value::Bool(true)));
    }

    #[test]
    fn test_circular_poly_has_minimum_vertices() {
        let args = bind(Args::new().with("r", 1.0), vec![point(), circular()]);
        assert_eq!(args.as_poly().unwrap().len(), 5);
    }

    #[test]
    fn test_arc_poly_covers_sweep() {
        let args = bind(
            Args::new().with("x", 0.0).with("y", 0.0).with("r", 40.0).with("w", 0.0).with("dw", PI),
            vec![point(), arc()],
        );
        let poly = args.as_poly().unwrap();
        let first = poly.first().copied().unwrap();
        let last = poly.last().copied().unwrap();
        assert_relative_eq!(first.x, 40.0, epsilon = 1e-9);
        assert_relative_eq!(last.x, -40.0, epsilon = 1e-9);
        assert_eq!(args.num("angle"), Some(180.0));
    }

    #[test]
    fn test_arc_center_locator() {
        let args = bind(
            Args::new().with("x", 1.0).with("y", 2.0).with("r", 5.0),
            vec![point(), arc()],
        );
        let c = args.point_at(&Locator::from("c"), false).unwrap();
        assert_eq!(c.pos, DVec2::new(1.0, 2.0));
    }

    #[test]
    fn test_rect_and_box_anchors() {
        let r = bind(
            Args::new().with("x", 0.0).with("y", 0.0).with("b", 4.0).with("h", 2.0),
            vec![rect()],
        );
        assert_eq!(r.point_at(&Locator::from("c"), false).unwrap().pos, DVec2::new(2.0, 1.0));
        assert_eq!(r.point_at(&Locator::from("ne"), false).unwrap().pos, DVec2::new(4.0, 2.0));

        let b = bind(Args::new().with("b", 4.0).with("h", 2.0), vec![box_shape()]);
        assert_eq!(b.point_at(&Locator::from("e"), false).unwrap().pos, DVec2::new(2.0, 0.0));
        assert_eq!(b.as_poly().unwrap().len(), 4);
    }
}
