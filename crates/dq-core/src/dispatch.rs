//! Handler contract and execution dispatcher
//!
//! `Queue::execute` resolves a [`Handler`] for a target through the
//! registry's factories, then either hands the whole command list to the
//! handler's bulk entry point or walks it:
//! 1. apply the command, awaiting a deferred result before moving on
//! 2. run the behavior's ordered producers and walk each sub-queue, or the
//!    single producer when only one was composed
//! 3. walk the command's attached sub-queue (`use`, `ins`)
//!
//! Commands a handler does not implement are skipped.

use std::any::Any;

use async_trait::async_trait;
use futures::FutureExt;
use futures::executor::block_on;
use futures::future::LocalBoxFuture;
use tracing::{debug, trace};

use crate::args::Args;
use crate::capability::DrawContext;
use crate::error::DrawResult;
use crate::queue::{Command, Queue, View};
use crate::style::Style;

/// Outcome of applying one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The handler implemented the command
    Done,
    /// The handler does not implement the command
    Unsupported,
}

/// A backend executing queued commands
#[async_trait(?Send)]
pub trait Handler {
    /// Prepare a pass. Returning false aborts it.
    fn init(&mut self, _queue: &Queue, _style: Option<&Style>) -> bool {
        true
    }

    /// Bulk entry point. `Some` means the handler processed the whole list
    /// itself and the dispatcher does not walk it.
    fn execute_all(&mut self, _commands: &[Command]) -> Option<DrawResult<()>> {
        None
    }

    /// Apply one command
    async fn apply(&mut self, name: &str, args: Option<&Args>) -> DrawResult<Applied>;

    /// End of pass
    fn finish(&mut self) {}
}

#[async_trait(?Send)]
impl<H: Handler + ?Sized> Handler for &mut H {
    fn init(&mut self, queue: &Queue, style: Option<&Style>) -> bool {
        (**self).init(queue, style)
    }

    fn execute_all(&mut self, commands: &[Command]) -> Option<DrawResult<()>> {
        (**self).execute_all(commands)
    }

    async fn apply(&mut self, name: &str, args: Option<&Args>) -> DrawResult<Applied> {
        (**self).apply(name, args).await
    }

    fn finish(&mut self) {
        (**self).finish()
    }
}

/// Walk `commands` against `handler`
fn walk<'h, 'd: 'h>(
    handler: &'h mut (dyn Handler + 'd),
    commands: Vec<Command>,
    mut cx: DrawContext,
) -> LocalBoxFuture<'h, DrawResult<()>> {
    async move {
        for cmd in commands {
            if cmd.name == "view" {
                if let Some(args) = &cmd.args {
                    cx.view = View::from_args(args);
                }
            }

            if handler.apply(&cmd.name, cmd.args.as_ref()).await? == Applied::Unsupported {
                trace!(command = %cmd.name, "command not supported by handler, skipped");
            }

            if let Some(args) = &cmd.args {
                if let Some(behavior) = args.behavior() {
                    if !behavior.producers().is_empty() {
                        for producer in behavior.producers() {
                            if let Some(sub) = producer.produce(args, &cx) {
                                walk(&mut *handler, sub.commands(), cx.clone()).await?;
                            }
                        }
                    } else if let Some(producer) = behavior.single() {
                        if let Some(sub) = producer.produce(args, &cx) {
                            walk(&mut *handler, sub.commands(), cx.clone()).await?;
                        }
                    }
                }
            }

            if let Some(sub) = &cmd.sub {
                walk(&mut *handler, sub.commands(), cx.clone()).await?;
            }
        }
        Ok(())
    }
    .boxed_local()
}

impl Queue {
    /// Execute against `target`, resolving a handler through the registry.
    ///
    /// Returns `Ok(false)` when no factory accepts the target or the handler
    /// declines the pass.
    pub fn execute(&self, target: &mut dyn Any) -> DrawResult<bool> {
        block_on(self.execute_async(target))
    }

    /// Async form of [`Queue::execute`]
    pub async fn execute_async(&self, target: &mut dyn Any) -> DrawResult<bool> {
        let Some(mut handler) = self.registry().resolve_handler(target) else {
            return Ok(false);
        };
        self.execute_handler(handler.as_mut(), None).await
    }

    /// Execute against an explicit handler
    pub fn execute_with(&self, handler: &mut dyn Handler) -> DrawResult<bool> {
        block_on(self.execute_handler(handler, None))
    }

    /// Execute against an explicit handler with base style overrides
    pub fn execute_with_style(&self, handler: &mut dyn Handler, style: &Style) -> DrawResult<bool> {
        block_on(self.execute_handler(handler, Some(style)))
    }

    /// One full pass: `init`, bulk execution or walk, `finish`
    pub async fn execute_handler<'d>(
        &self,
        handler: &mut (dyn Handler + 'd),
        style: Option<&Style>,
    ) -> DrawResult<bool> {
        if !handler.init(self, style) {
            debug!("handler declined the pass");
            return Ok(false);
        }
        let commands = self.commands();
        let result = match handler.execute_all(&commands) {
            Some(result) => result,
            None => {
                let cx = DrawContext {
                    view: self.view_params(),
                    registry: self.registry().clone(),
                };
                walk(&mut *handler, commands, cx).await
            }
        };
        handler.finish();
        result.map(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Behavior, Capability};
    use crate::error::DrawError;
    use crate::registry::Registry;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    /// Future that is pending once before completing
    struct YieldOnce(bool);

    impl Future for YieldOnce {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
        supported: Vec<&'static str>,
        decline: bool,
        fail_on: Option<&'static str>,
        finished: bool,
    }

    #[async_trait(?Send)]
    impl Handler for Recorder {
        fn init(&mut self, _queue: &Queue, _style: Option<&Style>) -> bool {
            !self.decline
        }

        async fn apply(&mut self, name: &str, args: Option<&Args>) -> DrawResult<Applied> {
            if !self.supported.iter().any(|s| *s == name) {
                return Ok(Applied::Unsupported);
            }
            if name == "img" {
                YieldOnce(false).await;
            }
            if self.fail_on == Some(name) {
                return Err(DrawError::Handler(name.to_string()));
            }
            let tag = args.and_then(|a| a.str("tag")).unwrap_or_default();
            self.log.push(format!("{name}{tag}"));
            Ok(Applied::Done)
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn recorder(supported: &[&'static str]) -> Recorder {
        Recorder {
            supported: supported.to_vec(),
            ..Default::default()
        }
    }

    fn tagged(tag: &str) -> Args {
        Args::new().with("tag", tag)
    }

    #[test]
    fn test_walk_order_with_async_op() {
        let q = Queue::with_registry(Arc::new(Registry::new()));
        q.add("a", tagged("1")).add("img", tagged("2")).add("a", tagged("3"));
        let mut h = recorder(&["a", "img"]);
        assert_eq!(q.execute_with(&mut h), Ok(true));
        assert_eq!(h.log, vec!["a1", "img2", "a3"], "deferred op keeps paint order");
        assert!(h.finished);
    }

    #[test]
    fn test_unknown_commands_skipped() {
        let q = Queue::with_registry(Arc::new(Registry::new()));
        q.add("mystery", tagged("x")).add("a", tagged("1"));
        let mut h = recorder(&["a"]);
        assert_eq!(q.execute_with(&mut h), Ok(true));
        assert_eq!(h.log, vec!["a1"]);
    }

    #[test]
    fn test_producers_walk_in_level_order() {
        let registry = Arc::new(Registry::new());
        let emit = |tag: &'static str| {
            move |_: &Args, cx: &DrawContext| {
                let q = cx.queue();
                q.add("a", tagged(tag));
                Some(q)
            }
        };
        registry.register_kind(Behavior::compose(
            "k",
            [
                Capability::new("late").producer(5, emit("late")),
                Capability::new("early").producer(0, emit("early")),
                Capability::new("none").producer(1, |_, _| None),
            ],
        ));
        let q = Queue::with_registry(registry);
        q.add("k", tagged("!"));
        let mut h = recorder(&["a", "k"]);
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.log, vec!["k!", "aearly", "alate"]);
    }

    #[test]
    fn test_single_producer_and_sub_queues() {
        let registry = Arc::new(Registry::new());
        registry.register_kind(Behavior::compose(
            "k",
            [Capability::new("one").producer(0, |_, cx| {
                let q = cx.queue();
                q.add("a", tagged("p"));
                Some(q)
            })],
        ));
        let q = Queue::with_registry(registry.clone());
        let group = Queue::with_registry(registry);
        group.add("a", tagged("g"));
        q.add("k", tagged("")).instance(&group, tagged("s")).inject(&group);
        let mut h = recorder(&["a", "k", "beg", "end"]);
        q.execute_with(&mut h).unwrap();
        assert_eq!(h.log, vec!["k", "ap", "begs", "ag", "end", "ag"]);
    }

    #[test]
    fn test_declined_and_failed_passes() {
        let q = Queue::with_registry(Arc::new(Registry::new()));
        q.add("a", tagged("1")).add("b", tagged("2")).add("a", tagged("3"));

        let mut declined = recorder(&["a"]);
        declined.decline = true;
        assert_eq!(q.execute_with(&mut declined), Ok(false));
        assert!(declined.log.is_empty());

        let mut failing = recorder(&["a", "b"]);
        failing.fail_on = Some("b");
        assert_eq!(
            q.execute_with(&mut failing),
            Err(DrawError::Handler("b".into()))
        );
        assert_eq!(failing.log, vec!["a1"], "walk stops at the failing command");
        assert!(failing.finished, "finish still runs");
    }

    #[test]
    fn test_execute_resolves_through_registry() {
        let registry = Arc::new(Registry::new());
        registry.register_handler_type::<Recorder>();
        let q = Queue::with_registry(registry);
        q.add("a", tagged("1"));

        let mut h = recorder(&["a"]);
        assert_eq!(q.execute(&mut h), Ok(true));
        assert_eq!(h.log, vec!["a1"]);

        let mut not_a_handler = String::new();
        assert_eq!(q.execute(&mut not_a_handler), Ok(false));
    }

    struct Bulk(usize);

    #[async_trait(?Send)]
    impl Handler for Bulk {
        fn execute_all(&mut self, commands: &[Command]) -> Option<DrawResult<()>> {
            self.0 = commands.len();
            Some(Ok(()))
        }

        async fn apply(&mut self, _name: &str, _args: Option<&Args>) -> DrawResult<Applied> {
            panic!("bulk handlers are not walked");
        }
    }

    #[test]
    fn test_bulk_entry_point() {
        let q = Queue::with_registry(Arc::new(Registry::new()));
        q.add("a", Args::new()).add("b", Args::new());
        let mut h = Bulk(0);
        assert_eq!(q.execute_with(&mut h), Ok(true));
        assert_eq!(h.0, 2);
    }
}
