use std::{sync::Arc, time::Duration};

use {
    rand::{SeedableRng, rngs::StdRng},
    tokio::{
        sync::{Mutex, mpsc},
        task::JoinSet,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use echopost_common::ChannelPost;

use crate::{
    dedup::{self, DedupLedger},
    delay::sample_delay,
    dispatch::{ReplyDispatcher, ReplySink},
    error::{Error, Result},
    limiter::SlidingWindowLimiter,
};

/// Trailing window over which replies are counted (1 hour).
pub const RATE_WINDOW: Duration = Duration::from_secs(3600);

/// Validated, immutable pipeline configuration.
///
/// Built by the surrounding program (config layer) and checked once at
/// construction; violations are fatal at startup, never runtime conditions.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Max replies per trailing window. Must be ≥ 1.
    pub max_replies_per_window: usize,
    /// Rate-limiter window. [`RATE_WINDOW`] in production.
    pub window: Duration,
    /// Lower bound of the random pre-reply delay.
    pub delay_min: Duration,
    /// Upper bound of the random pre-reply delay. Must be ≥ `delay_min`.
    pub delay_max: Duration,
    /// Candidate reply texts. Must be non-empty.
    pub reply_messages: Vec<String>,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_replies_per_window < 1 {
            return Err(Error::config("max replies per window must be at least 1"));
        }
        if self.delay_max < self.delay_min {
            return Err(Error::config(format!(
                "reply delay maximum ({:?}) is below the minimum ({:?})",
                self.delay_max, self.delay_min
            )));
        }
        if self.reply_messages.is_empty() {
            return Err(Error::config("at least one reply message is required"));
        }
        Ok(())
    }
}

/// Shared mutable state, serialized behind one lock: every admission
/// decision and every post-dispatch record goes through here.
struct Gate {
    limiter: SlidingWindowLimiter,
    ledger: DedupLedger,
    /// Admitted reactions whose dispatch has not finished yet. Counted
    /// against capacity so a burst arriving within one delay span cannot
    /// overshoot the window budget.
    reserved: usize,
    rng: StdRng,
}

/// Orchestrator: consumes channel posts and drives each one through
/// dedup → rate check → delay → dispatch → record.
///
/// Per-event workflows run concurrently; only the admission and record
/// steps serialize on the gate. Shutdown via [`Self::cancellation_token`]
/// stops intake and aborts reactions still waiting out their delay (a
/// dispatch already underway is allowed to finish).
pub struct ReactionPipeline {
    gate: Arc<Mutex<Gate>>,
    dispatcher: Arc<ReplyDispatcher>,
    capacity: usize,
    delay_min: Duration,
    delay_max: Duration,
    /// Identity of the acting account; posts it authored are ignored.
    own_sender_id: Option<i64>,
    cancel: CancellationToken,
}

impl ReactionPipeline {
    /// Construct a pipeline from a validated config.
    ///
    /// The random source drives both delay sampling and reply selection;
    /// tests inject a seeded generator for deterministic outcomes.
    pub fn new(
        config: MonitorConfig,
        sink: Arc<dyn ReplySink>,
        own_sender_id: Option<i64>,
        mut rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;

        let dispatcher_rng = StdRng::from_rng(&mut rng);
        let dispatcher = Arc::new(ReplyDispatcher::new(
            sink,
            config.reply_messages,
            dispatcher_rng,
        ));

        Ok(Self {
            gate: Arc::new(Mutex::new(Gate {
                limiter: SlidingWindowLimiter::new(config.max_replies_per_window, config.window),
                ledger: DedupLedger::new(),
                reserved: 0,
                rng,
            })),
            dispatcher,
            capacity: config.max_replies_per_window,
            delay_min: config.delay_min,
            delay_max: config.delay_max,
            own_sender_id,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops intake and aborts pending delays when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Consume the event stream until it ends or shutdown is requested.
    ///
    /// Stream end (source disconnect) drains in-flight reactions and
    /// returns; per-event failures never escalate past this loop.
    pub async fn run(&self, mut events: mpsc::Receiver<ChannelPost>) {
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            while in_flight.try_join_next().is_some() {}

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("shutdown requested, aborting pending reactions");
                    break;
                }
                next = events.recv() => match next {
                    Some(post) => self.accept(post, &mut in_flight).await,
                    None => {
                        info!("event stream ended");
                        break;
                    },
                },
            }
        }

        while in_flight.join_next().await.is_some() {}
    }

    /// Run the admission steps for one post and, if admitted, spawn its
    /// delay+dispatch tail.
    async fn accept(&self, post: ChannelPost, in_flight: &mut JoinSet<()>) {
        if self.own_sender_id.is_some() && post.sender_id == self.own_sender_id {
            debug!(post_id = post.id, "ignoring self-authored post");
            return;
        }

        let delay = {
            let mut gate = self.gate.lock().await;

            if gate.ledger.has_processed(post.id) {
                debug!(post_id = post.id, "duplicate post, already handled");
                return;
            }

            if dedup::is_backlog(post.date) {
                gate.ledger.mark_processed(post.id);
                debug!(post_id = post.id, "suppressing backlog post");
                return;
            }

            let in_window = gate.limiter.recent_action_count() + gate.reserved;
            if !gate.limiter.can_perform_action() || in_window >= self.capacity {
                gate.ledger.mark_processed(post.id);
                warn!(
                    post_id = post.id,
                    in_window,
                    capacity = self.capacity,
                    "rate limit reached, skipping reply"
                );
                return;
            }

            // Commit to exactly one attempt for this id before the delay
            // starts, so a duplicate delivered mid-delay cannot dispatch a
            // second time.
            gate.ledger.mark_processed(post.id);
            gate.reserved += 1;
            sample_delay(&mut gate.rng, self.delay_min, self.delay_max)
        };

        info!(
            post_id = post.id,
            delay_ms = delay.as_millis() as u64,
            "post accepted, waiting before reply"
        );

        let gate = Arc::clone(&self.gate);
        let dispatcher = Arc::clone(&self.dispatcher);
        let cancel = self.cancel.clone();
        in_flight.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(post_id = post.id, "reaction aborted by shutdown");
                    return;
                }
                _ = tokio::time::sleep(delay) => {},
            }

            let outcome = dispatcher.dispatch(&post).await;

            let mut gate = gate.lock().await;
            gate.reserved = gate.reserved.saturating_sub(1);
            if outcome.is_sent() {
                gate.limiter.record_action();
            }
        });
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        async_trait::async_trait,
        chrono::{TimeDelta, Utc},
        echopost_common::{ReplyOutcome, ReplyTarget},
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    struct RecordingSink {
        outcome: ReplyOutcome,
        attempts: AtomicUsize,
        dispatched_ids: std::sync::Mutex<Vec<i64>>,
    }

    impl RecordingSink {
        fn new(outcome: ReplyOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                attempts: AtomicUsize::new(0),
                dispatched_ids: std::sync::Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send_reply(&self, target: &ReplyTarget, _text: &str) -> ReplyOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.dispatched_ids
                .lock()
                .unwrap()
                .push(i64::from(target.message_id));
            self.outcome.clone()
        }
    }

    fn config(capacity: usize) -> MonitorConfig {
        MonitorConfig {
            max_replies_per_window: capacity,
            window: RATE_WINDOW,
            delay_min: Duration::from_secs(5),
            delay_max: Duration::from_secs(15),
            reply_messages: vec!["nice post".into()],
        }
    }

    fn pipeline(capacity: usize, sink: Arc<RecordingSink>) -> ReactionPipeline {
        ReactionPipeline::new(config(capacity), sink, Some(7777), StdRng::seed_from_u64(1))
            .unwrap()
    }

    fn post(id: i64) -> ChannelPost {
        ChannelPost {
            id,
            date: Utc::now(),
            sender_id: Some(42),
            reply_target: ReplyTarget {
                chat_id: -1001,
                message_id: id as i32,
            },
        }
    }

    async fn run_with_events(p: &ReactionPipeline, events: Vec<ChannelPost>) {
        let (tx, rx) = mpsc::channel(16);
        for e in events {
            tx.send(e).await.unwrap();
        }
        drop(tx);
        p.run(rx).await;
    }

    #[test]
    fn config_rejects_zero_capacity() {
        let mut cfg = config(0);
        cfg.max_replies_per_window = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn config_rejects_inverted_delay_bounds() {
        let mut cfg = config(1);
        cfg.delay_min = Duration::from_secs(10);
        cfg.delay_max = Duration::from_secs(5);
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn config_rejects_empty_messages() {
        let mut cfg = config(1);
        cfg.reply_messages.clear();
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_delivery_dispatches_once() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = pipeline(10, Arc::clone(&sink));
        run_with_events(&p, vec![post(1), post(1)]).await;
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_post_is_suppressed_and_marked() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = pipeline(10, Arc::clone(&sink));

        let mut stale = post(1);
        stale.date = Utc::now() - TimeDelta::seconds(301);
        run_with_events(&p, vec![stale]).await;

        assert_eq!(sink.attempts(), 0);
        assert!(p.gate.lock().await.ledger.has_processed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn almost_stale_post_is_eligible() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = pipeline(10, Arc::clone(&sink));

        let mut fresh = post(1);
        fresh.date = Utc::now() - TimeDelta::seconds(299);
        run_with_events(&p, vec![fresh]).await;

        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn self_authored_posts_are_ignored() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = pipeline(10, Arc::clone(&sink));

        let mut own = post(1);
        own.sender_id = Some(7777);
        run_with_events(&p, vec![own]).await;

        assert_eq!(sink.attempts(), 0);
        // Not even marked: the filter runs before the ledger is consulted.
        assert!(!p.gate.lock().await.ledger.has_processed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_outcome_consumes_no_slot_and_never_redispatches() {
        let sink = RecordingSink::new(ReplyOutcome::ThrottledRetryAfter(Duration::from_secs(30)));
        let p = pipeline(10, Arc::clone(&sink));

        run_with_events(&p, vec![post(1), post(1)]).await;

        assert_eq!(sink.attempts(), 1);
        let gate = p.gate.lock().await;
        assert_eq!(gate.limiter.recent_action_count(), 0);
        assert!(gate.ledger.has_processed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_two_admits_exactly_two_of_three() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = pipeline(2, Arc::clone(&sink));

        run_with_events(&p, vec![post(1), post(2), post(3)]).await;

        assert_eq!(sink.attempts(), 2);
        let dispatched = sink.dispatched_ids.lock().unwrap().clone();
        assert!(dispatched.contains(&1) && dispatched.contains(&2));

        let gate = p.gate.lock().await;
        assert_eq!(gate.limiter.recent_action_count(), 2);
        // The third is marked processed without a dispatch attempt.
        assert!(gate.ledger.has_processed(3));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dispatch_frees_the_reserved_slot() {
        let sink = RecordingSink::new(ReplyOutcome::TransientFailure("boom".into()));
        let p = pipeline(1, Arc::clone(&sink));

        run_with_events(&p, vec![post(1)]).await;

        let gate = p.gate.lock().await;
        assert_eq!(gate.reserved, 0);
        assert_eq!(gate.limiter.recent_action_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_a_pending_delay() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = Arc::new(pipeline(10, Arc::clone(&sink)));
        let cancel = p.cancellation_token();

        let (tx, rx) = mpsc::channel(16);
        let runner = {
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.run(rx).await })
        };

        tx.send(post(1)).await.unwrap();
        // Let the pipeline admit the post and start its delay (min 5 s).
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
        runner.await.unwrap();

        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_readmits_later_posts() {
        let sink = RecordingSink::new(ReplyOutcome::Sent);
        let p = Arc::new(pipeline(1, Arc::clone(&sink)));

        let (tx, rx) = mpsc::channel(16);
        let runner = {
            let p = Arc::clone(&p);
            tokio::spawn(async move { p.run(rx).await })
        };

        tx.send(post(1)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.attempts(), 1);

        // Inside the window: denied. Past the window: admitted again.
        tx.send(post(2)).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.attempts(), 1);

        tokio::time::advance(RATE_WINDOW).await;
        tx.send(post(3)).await.unwrap();
        drop(tx);
        runner.await.unwrap();
        assert_eq!(sink.attempts(), 2);
    }
}
