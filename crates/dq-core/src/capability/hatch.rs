//! Hatch capability
//!
//! `hatch: true` or `hatch: { w, dist, gap, ls, lw, lc }` fills the command's
//! polygon approximation with parallel strokes.

use std::f64::consts::FRAC_PI_4;
use std::fmt::Write;

use glam::DVec2;

use super::{Capability, DrawContext};
use crate::args::Args;
use crate::queue::Queue;
use crate::value::Value;

/// Producer level of hatching
const LEVEL: i32 = 1;

/// Parallel segments clipped to `poly`.
///
/// Lines run at `angle`, `dist` apart. Each segment is shortened by `gap` at
/// both ends; segments shorter than `2 * gap` are dropped.
pub fn hatch_lines(poly: &[DVec2], angle: f64, dist: f64, gap: f64) -> Vec<(DVec2, DVec2)> {
    if poly.len() < 3 || !(dist > 0.0) {
        return Vec::new();
    }
    let to_local = DVec2::from_angle(-angle);
    let to_world = DVec2::from_angle(angle);
    let local: Vec<DVec2> = poly.iter().map(|p| to_local.rotate(*p)).collect();

    let (ymin, ymax) = local
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));

    let mut lines = Vec::new();
    let mut xs = Vec::new();
    let first = (ymin / dist).ceil() as i64;
    let last = (ymax / dist).floor() as i64;
    for k in first..=last {
        let y = k as f64 * dist;
        xs.clear();
        for (i, a) in local.iter().enumerate() {
            let b = local[(i + 1) % local.len()];
            if (a.y <= y) != (b.y <= y) {
                xs.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
            }
        }
        xs.sort_by(f64::total_cmp);
        for pair in xs.chunks_exact(2) {
            let (x0, x1) = (pair[0] + gap, pair[1] - gap);
            if x1 - x0 <= 0.0 {
                continue;
            }
            lines.push((
                to_world.rotate(DVec2::new(x0, y)),
                to_world.rotate(DVec2::new(x1, y)),
            ));
        }
    }
    lines
}

fn produce(args: &Args, cx: &DrawContext) -> Option<Queue> {
    let hatch = args.get("hatch").filter(Value::truthy)?;
    let poly = args.as_poly()?;
    let opt = |key: &str| hatch.get(key).cloned();

    let lw = args.num("lw").filter(|v| *v != 0.0).unwrap_or(1.0);
    let angle = opt("w").and_then(|v| v.as_num()).unwrap_or(FRAC_PI_4);
    let dist = opt("dist").and_then(|v| v.as_num()).unwrap_or(4.0 * lw);
    let gap = opt("gap").and_then(|v| v.as_num()).unwrap_or(3.0 * lw);

    let lines = hatch_lines(&poly, angle, dist, gap);
    if lines.is_empty() {
        return None;
    }
    let mut d = String::new();
    for (a, b) in &lines {
        let _ = write!(d, "M{},{}L{},{}", a.x, a.y, b.x, b.y);
    }

    let mut stroke = Args::new()
        .with("d", d)
        .with("lc", opt("lc").unwrap_or_else(|| Value::from("round")));
    if let Some(ls) = opt("ls").or_else(|| args.get("ls")) {
        stroke = stroke.with("ls", ls);
    }
    if let Some(lw) = opt("lw").or_else(|| args.get("lw")) {
        stroke = stroke.with("lw", lw);
    }
    let queue = cx.queue();
    queue.stroke(stroke);
    Some(queue)
}

/// Parallel-line fill of the command's outline
pub fn hatch() -> Capability {
    Capability::new("hatch").producer(LEVEL, produce)
}
