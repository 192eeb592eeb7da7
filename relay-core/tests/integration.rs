//! Integration Tests for Signal Delivery
//!
//! These tests drive signals across real threads with real run loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::Level;

use relay_core::context::{LoopRegistry, LoopThread, RunLoop, RunLoopConfig};
use relay_core::handle::{Lifeline, ThreadAffine};
use relay_core::signals::Signal;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::TRACE)
        .try_init();
}

/// Collects values and lets a test wait for a given count.
#[derive(Default)]
struct Inbox {
    items: Mutex<Vec<(ThreadId, i32)>>,
    arrived: Condvar,
}

impl Inbox {
    fn push(&self, value: i32) {
        self.items.lock().push((std::thread::current().id(), value));
        self.arrived.notify_all();
    }

    fn wait_for(&self, count: usize) -> Vec<(ThreadId, i32)> {
        let mut items = self.items.lock();
        while items.len() < count {
            let timed_out = self
                .arrived
                .wait_for(&mut items, Duration::from_secs(5))
                .timed_out();
            assert!(!timed_out, "timed out waiting for {count} deliveries");
        }
        items.clone()
    }

    fn snapshot(&self) -> Vec<(ThreadId, i32)> {
        self.items.lock().clone()
    }
}

/// Connect `inbox` to `signal` from inside `worker`'s thread, so the slot
/// belongs to that thread.
fn connect_on(worker: &LoopThread, signal: &Signal<i32>, inbox: &Arc<Inbox>) {
    let signal = signal.clone();
    let inbox = inbox.clone();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    worker
        .handle()
        .post(move || {
            let i = inbox.clone();
            signal.connect(move |v| i.push(v));
            let _ = done_tx.send(());
        })
        .unwrap();
    done_rx.blocking_recv().unwrap();
}

/// Inline slots run once each, in registration order, with the emitted value.
#[test]
fn inline_slots_run_in_registration_order() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let _loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry);
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in 0..5 {
        let log = log.clone();
        signal.connect(move |v| log.lock().push((tag, v)));
    }
    signal.emit(42);

    let expected: Vec<_> = (0..5).map(|tag| (tag, 42)).collect();
    assert_eq!(*log.lock(), expected);
}

/// cb1 on T1 runs inline; cb2 on T2 is posted and runs on T2.
#[test]
fn mixed_thread_scenario() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let mut t1 = RunLoop::attach(&registry).unwrap();
    let t2 = LoopThread::spawn(&registry, RunLoopConfig::named("t2")).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry.clone());

    let local = Arc::new(Inbox::default());
    let l = local.clone();
    signal.connect(move |v| l.push(v));

    let remote = Arc::new(Inbox::default());
    connect_on(&t2, &signal, &remote);

    // Hold T2 busy so cb2 cannot run before emit returns.
    let gate = Arc::new((Mutex::new(false), Condvar::new()));
    let g = gate.clone();
    t2.handle()
        .post(move || {
            let (open, cv) = &*g;
            let mut open = open.lock();
            while !*open {
                cv.wait(&mut open);
            }
        })
        .unwrap();

    let delivery = signal.emit_counted(42);
    assert_eq!(delivery.inline, 1);
    assert_eq!(delivery.posted, 1);

    // cb1 already ran; cb2 has not.
    assert_eq!(local.snapshot(), vec![(t1.thread(), 42)]);
    assert!(remote.snapshot().is_empty());

    {
        let (open, cv) = &*gate;
        *open.lock() = true;
        cv.notify_all();
    }
    assert_eq!(remote.wait_for(1), vec![(t2.thread(), 42)]);
    assert_eq!(t1.run_pending(), 0);
}

/// Each cross-thread slot gets exactly one delivery per emit.
#[test]
fn cross_thread_slots_receive_one_delivery_per_emit() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let workers: Vec<_> = (0..3)
        .map(|i| LoopThread::spawn(&registry, RunLoopConfig::named(format!("w{i}"))).unwrap())
        .collect();
    let signal: Signal<i32> = Signal::with_context(registry.clone());

    let inboxes: Vec<_> = workers
        .iter()
        .map(|worker| {
            let inbox = Arc::new(Inbox::default());
            connect_on(worker, &signal, &inbox);
            inbox
        })
        .collect();

    for v in 0..4 {
        signal.emit(v);
    }

    for (worker, inbox) in workers.iter().zip(&inboxes) {
        let items = inbox.wait_for(4);
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(|(thread, _)| *thread == worker.thread()));
        // One sender posting to one queue keeps its order.
        assert_eq!(items.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }
}

/// A receiver destroyed before emit is never called again.
#[test]
fn destroyed_receiver_is_never_called() {
    init_tracing();
    struct Widget {
        hits: Arc<AtomicUsize>,
    }
    impl Widget {
        fn on_value(&self, _v: i32) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    let registry = Arc::new(LoopRegistry::new());
    let _loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));
    let widget = Arc::new(Widget { hits: hits.clone() });

    signal.connect_method(&widget, Widget::on_value);
    signal.emit(0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    drop(widget);
    signal.emit(1);
    signal.emit(2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// A delivery posted before the receiver died is dropped when it runs.
#[test]
fn receiver_destroyed_after_post_is_not_called() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let mut run_loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));
    let receiver = Arc::new(hits.clone());

    signal.connect_method(&receiver, |hits, _v| {
        hits.fetch_add(1, Ordering::SeqCst);
    });

    let emitter = signal.clone();
    std::thread::spawn(move || emitter.emit(9)).join().unwrap();

    drop(receiver);
    assert_eq!(run_loop.run_pending(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

/// A slot whose thread has gone away is skipped without disturbing others.
#[test]
fn dead_owner_thread_is_skipped() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let _loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry.clone());

    let gone = LoopThread::spawn(&registry, RunLoopConfig::default()).unwrap();
    let remote = Arc::new(Inbox::default());
    connect_on(&gone, &signal, &remote);
    gone.join().unwrap();

    let local = Arc::new(Inbox::default());
    let l = local.clone();
    signal.connect(move |v| l.push(v));

    let delivery = signal.emit_counted(5);
    assert_eq!(delivery.dead_thread, 1);
    assert_eq!(delivery.inline, 1);
    assert_eq!(local.snapshot().len(), 1);
    assert!(remote.snapshot().is_empty());
}

/// Slots connected from a thread without a run loop only hear same-thread
/// emissions.
#[test]
fn thread_without_loop_is_not_alive() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let signal: Signal<i32> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));

    let h = hits.clone();
    signal.connect(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    signal.emit(1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let emitter = signal.clone();
    let delivery = std::thread::spawn(move || emitter.emit_counted(2))
        .join()
        .unwrap();
    assert_eq!(delivery.dead_thread, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

/// disconnect followed by emit delivers nothing.
#[test]
fn disconnect_then_emit_delivers_nothing() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let mut run_loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let h = hits.clone();
        signal.connect(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
    }
    signal.disconnect();

    let delivery = signal.emit_counted(1);
    assert_eq!(delivery.delivered() + delivery.skipped(), 0);
    assert_eq!(run_loop.run_pending(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

/// Forwarding A to B delivers each value to B's slots exactly once, with
/// B's slots still routed to their own threads.
#[test]
fn forwarding_respects_target_thread_affinity() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let _loop = RunLoop::attach(&registry).unwrap();
    let worker = LoopThread::spawn(&registry, RunLoopConfig::named("b-slots")).unwrap();

    let a: Signal<i32> = Signal::with_context(registry.clone());
    let b: Signal<i32> = Signal::with_context(registry.clone());

    let remote = Arc::new(Inbox::default());
    connect_on(&worker, &b, &remote);
    a.connect_signal(&b);

    a.emit(17);

    assert_eq!(remote.wait_for(1), vec![(worker.thread(), 17)]);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(remote.snapshot().len(), 1);
}

/// Emitting A from another thread posts the forwarding slot to the thread
/// that connected it; B then dispatches from there by its own rules.
#[test]
fn forwarding_from_another_thread_is_posted_to_connecting_thread() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let mut home = RunLoop::attach(&registry).unwrap();

    let a: Signal<i32> = Signal::with_context(registry.clone());
    let b: Signal<i32> = Signal::with_context(registry);

    let inbox = Arc::new(Inbox::default());
    let i = inbox.clone();
    b.connect(move |v| i.push(v));
    a.connect_signal(&b);

    let emitter = a.clone();
    let delivery = std::thread::spawn(move || emitter.emit_counted(8))
        .join()
        .unwrap();
    assert_eq!(delivery.posted, 1);
    assert_eq!(delivery.inline, 0);
    assert!(inbox.snapshot().is_empty());

    // One task: the forwarding slot. B's own slot then runs inline here.
    assert_eq!(home.run_pending(), 1);
    assert_eq!(inbox.snapshot(), vec![(home.thread(), 8)]);
    assert_eq!(home.run_pending(), 0);
    assert_eq!(inbox.snapshot().len(), 1);
}

/// Affine receivers are routed to their current thread, not the one they
/// were connected from.
#[test]
fn affine_receiver_follows_its_thread() {
    init_tracing();
    struct Model {
        lifeline: Lifeline,
        inbox: Arc<Inbox>,
    }
    impl ThreadAffine for Model {
        fn preferred_thread(&self) -> Option<ThreadId> {
            self.lifeline.affinity()
        }
    }

    let registry = Arc::new(LoopRegistry::new());
    let mut home = RunLoop::attach(&registry).unwrap();
    let worker = LoopThread::spawn(&registry, RunLoopConfig::named("model")).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry.clone());

    let inbox = Arc::new(Inbox::default());
    let model = Arc::new(Model {
        lifeline: Lifeline::on_current_thread(),
        inbox: inbox.clone(),
    });
    signal.connect_affine(&model, |model, v| model.inbox.push(v));

    signal.emit(1);
    assert_eq!(inbox.snapshot(), vec![(home.thread(), 1)]);

    model.lifeline.move_to_thread(worker.thread());
    signal.emit(2);
    let items = inbox.wait_for(2);
    assert_eq!(items[1], (worker.thread(), 2));
    assert_eq!(home.run_pending(), 0);
}

/// Watched closures skip once their lifeline is dropped, and follow its
/// affinity while alive.
#[test]
fn watched_slot_follows_lifeline() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let _home = RunLoop::attach(&registry).unwrap();
    let worker = LoopThread::spawn(&registry, RunLoopConfig::default()).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry.clone());

    let inbox = Arc::new(Inbox::default());
    let lifeline = Lifeline::new();
    lifeline.move_to_thread(worker.thread());
    let i = inbox.clone();
    signal.connect_watched(lifeline.watch(), move |v| i.push(v));

    signal.emit(1);
    assert_eq!(inbox.wait_for(1), vec![(worker.thread(), 1)]);

    drop(lifeline);
    let delivery = signal.emit_counted(2);
    assert_eq!(delivery.dead_receiver, 1);
}

/// Concurrent connect and emit: no duplicates, no missing slots that were
/// connected before the emit started.
#[test]
fn concurrent_connect_and_emit() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let signal: Signal<usize> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));

    // None of these threads has a run loop, so each thread's slots are only
    // ever invoked inline by that thread; posts to the others are skipped.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let signal = signal.clone();
            let hits = hits.clone();
            std::thread::spawn(move || {
                let mine = Arc::new(AtomicUsize::new(0));
                for _ in 0..50 {
                    let m = mine.clone();
                    let h = hits.clone();
                    signal.connect(move |_| {
                        m.fetch_add(1, Ordering::SeqCst);
                        h.fetch_add(1, Ordering::SeqCst);
                    });

                    let before = mine.load(Ordering::SeqCst);
                    let delivery = signal.emit_counted(0);
                    let after = mine.load(Ordering::SeqCst);

                    // Our own slots are all connected before our snapshot.
                    assert!(after - before >= 1);
                    assert_eq!(delivery.inline, after - before);
                }
                mine.load(Ordering::SeqCst)
            })
        })
        .collect();

    let per_thread: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    // Thread k's i-th emit sees its own i+1 slots: 1 + 2 + ... + 50.
    for total in &per_thread {
        assert_eq!(*total, (1..=50).sum::<usize>());
    }
    assert_eq!(hits.load(Ordering::SeqCst), per_thread.iter().sum::<usize>());
    assert_eq!(signal.slot_count(), 200);
}

/// Concurrent disconnect and emit: each emit invokes a slot at most once,
/// and nothing is delivered after the last disconnect.
#[test]
fn concurrent_disconnect_and_emit() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let signal: Signal<usize> = Signal::with_context(registry);
    let hits = Arc::new(AtomicUsize::new(0));

    let emitters: Vec<_> = (0..3)
        .map(|_| {
            let signal = signal.clone();
            let hits = hits.clone();
            std::thread::spawn(move || {
                let mine = Arc::new(AtomicUsize::new(0));
                for connected in 1..=100 {
                    let m = mine.clone();
                    let h = hits.clone();
                    signal.connect(move |_| {
                        m.fetch_add(1, Ordering::SeqCst);
                        h.fetch_add(1, Ordering::SeqCst);
                    });

                    let before = mine.load(Ordering::SeqCst);
                    let delivery = signal.emit_counted(0);
                    let after = mine.load(Ordering::SeqCst);

                    // Only this thread's slots run inline, each at most once.
                    assert_eq!(delivery.inline, after - before);
                    assert!(delivery.inline <= connected);
                }
                mine.load(Ordering::SeqCst)
            })
        })
        .collect();

    let disconnectors: Vec<_> = (0..2)
        .map(|_| {
            let signal = signal.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    signal.disconnect();
                    std::thread::yield_now();
                }
            })
        })
        .collect();

    for handle in disconnectors {
        handle.join().unwrap();
    }
    let total: usize = emitters.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(hits.load(Ordering::SeqCst), total);

    signal.disconnect();
    assert!(signal.is_empty());
    let delivery = signal.emit_counted(1);
    assert_eq!(delivery.delivered() + delivery.skipped(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), total);
}

/// Signal::new routes through the global registry.
#[test]
fn default_signal_uses_global_registry() {
    init_tracing();
    let mut run_loop = RunLoop::attach(&LoopRegistry::global()).unwrap();
    let signal: Signal<i32> = Signal::new();
    let inbox = Arc::new(Inbox::default());

    let i = inbox.clone();
    signal.connect(move |v| i.push(v));

    let emitter = signal.clone();
    std::thread::spawn(move || emitter.emit(3)).join().unwrap();

    assert!(inbox.snapshot().is_empty());
    assert_eq!(run_loop.run_pending(), 1);
    assert_eq!(inbox.snapshot(), vec![(run_loop.thread(), 3)]);
}

/// The async loop picks up deliveries posted from other threads.
#[tokio::test]
async fn async_run_loop_receives_deliveries() {
    init_tracing();
    let registry = Arc::new(LoopRegistry::new());
    let mut run_loop = RunLoop::attach(&registry).unwrap();
    let signal: Signal<i32> = Signal::with_context(registry);
    let inbox = Arc::new(Inbox::default());

    let i = inbox.clone();
    let h = run_loop.handle();
    signal.connect(move |v| {
        i.push(v);
        if v == 2 {
            let _ = h.stop();
        }
    });

    let emitter = signal.clone();
    std::thread::spawn(move || {
        emitter.emit(1);
        emitter.emit(2);
    });

    assert_eq!(run_loop.run_async().await, 2);
    let values: Vec<i32> = inbox.snapshot().into_iter().map(|(_, v)| v).collect();
    assert_eq!(values, vec![1, 2]);
}
