//! Multi-threaded behaviour of the primitives on the blocking backend.

use foundation_sync::{
    Barrier, BoundedQueue, Message, Mutex, RawMutex, RwLock, Semaphore, SyncError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        thread::yield_now();
    }
}

/// WHY: Mutual exclusion must hold for every interleaving
/// WHAT: 1000 lock/increment/unlock cycles across 50 threads yield exactly 1000
#[test]
#[ntest::timeout(20000)]
fn test_mutex_counter_is_exact() {
    let counter = Arc::new(Mutex::new(0usize));
    let handles: Vec<_> = (0..50)
        .map(|_| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..20 {
                    let mut guard = counter.lock();
                    let seen = *guard;
                    thread::yield_now();
                    *guard = seen + 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*counter.lock(), 1000);
    assert!(!counter.is_locked());
}

/// WHY: Waiters must be served in arrival order
/// WHAT: threads queued one after another acquire the raw mutex in that order
#[test]
#[ntest::timeout(10000)]
fn test_mutex_is_fifo() {
    let mutex = Arc::new(RawMutex::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    mutex.acquire();

    let mut handles = vec![];
    for id in 0..5 {
        let mutex_clone = Arc::clone(&mutex);
        let order_clone = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            mutex_clone.acquire();
            order_clone.lock().unwrap().push(id);
            mutex_clone.release().unwrap();
        }));
        wait_until(|| mutex.waiting() == id + 1);
    }

    mutex.release().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

/// WHY: A cancelled waiter must not disturb anybody else's position
/// WHAT: the middle waiter times out; the others still acquire, in order
#[test]
#[ntest::timeout(10000)]
fn test_mutex_timeout_keeps_other_waiters_in_place() {
    let mutex = Arc::new(RawMutex::new());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    mutex.acquire();

    let spawn_blocking = |id: &'static str| {
        let mutex = Arc::clone(&mutex);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            mutex.acquire();
            order.lock().unwrap().push(id);
            mutex.release().unwrap();
        })
    };

    let first = spawn_blocking("first");
    wait_until(|| mutex.waiting() == 1);

    let impatient = {
        let mutex = Arc::clone(&mutex);
        thread::spawn(move || mutex.acquire_timeout(Duration::from_millis(200)))
    };
    wait_until(|| mutex.waiting() == 2);

    let last = spawn_blocking("last");
    wait_until(|| mutex.waiting() == 3);

    assert_eq!(impatient.join().unwrap(), Err(SyncError::Timeout));
    assert_eq!(mutex.waiting(), 2);

    mutex.release().unwrap();
    first.join().unwrap();
    last.join().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "last"]);
    assert!(!mutex.is_locked());
}

/// WHY: Readers must hold the lock at the same time, not take turns
/// WHAT: three threads each holding a read guard meet at a barrier, which only trips if all hold at once
#[test]
#[ntest::timeout(10000)]
fn test_rwlock_readers_hold_concurrently() {
    let lock = Arc::new(RwLock::new(42u32));
    let rendezvous = Arc::new(Barrier::new(3).unwrap());

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let rendezvous = Arc::clone(&rendezvous);
            thread::spawn(move || {
                let guard = lock.read();
                rendezvous.wait().unwrap();
                *guard
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 42);
    }
    assert_eq!(lock.readers(), 0);
}

/// WHY: A writer excludes readers and writers alike
/// WHAT: a reader and a writer queued behind a write guard stay blocked until it drops
#[test]
#[ntest::timeout(10000)]
fn test_rwlock_writer_excludes_everyone() {
    let lock = Arc::new(RwLock::new(Vec::new()));
    let done = Arc::new(AtomicUsize::new(0));
    let mut guard = lock.write();
    guard.push("writer");

    let reader = {
        let lock = Arc::clone(&lock);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let seen = lock.read().len();
            done.fetch_add(1, Ordering::SeqCst);
            seen
        })
    };
    wait_until(|| lock.waiting() == 1);

    let writer = {
        let lock = Arc::clone(&lock);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            lock.write().push("second writer");
            done.fetch_add(1, Ordering::SeqCst);
        })
    };
    wait_until(|| lock.waiting() == 2);

    thread::sleep(Duration::from_millis(50));
    assert_eq!(done.load(Ordering::SeqCst), 0, "entered while a writer held the lock");

    drop(guard);
    assert_eq!(reader.join().unwrap(), 1);
    writer.join().unwrap();
    assert_eq!(*lock.read(), vec!["writer", "second writer"]);
}

/// WHY: Readers must never observe a half-finished write
/// WHAT: writers update a pair under the write guard; readers always see both halves equal
#[test]
#[ntest::timeout(20000)]
fn test_rwlock_readers_never_see_torn_writes() {
    let lock = Arc::new(RwLock::new((0u64, 0u64)));

    let writers: Vec<_> = (0..2)
        .map(|_| {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut pair = lock.write();
                    pair.0 += 1;
                    thread::yield_now();
                    pair.1 += 1;
                }
            })
        })
        .collect();
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                for _ in 0..200 {
                    let pair = lock.read();
                    assert_eq!(pair.0, pair.1);
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
    assert_eq!(*lock.read(), (400, 400));
}

/// WHY: A K-permit semaphore admits at most K holders at once
/// WHAT: a live counter incremented inside the permit never exceeds K
#[test]
#[ntest::timeout(20000)]
fn test_semaphore_bounds_concurrency() {
    const PERMITS: usize = 3;
    let semaphore = Arc::new(Semaphore::new(PERMITS).unwrap());
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let semaphore = Arc::clone(&semaphore);
            let live = Arc::clone(&live);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..50 {
                    let _permit = semaphore.permit();
                    let now = live.fetch_add(1, Ordering::SeqCst) + 1;
                    assert!(now <= PERMITS, "{now} holders inside a {PERMITS}-permit section");
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::yield_now();
                    live.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= PERMITS);
    assert_eq!(semaphore.available(), PERMITS);
    assert_eq!(semaphore.waiting(), 0);
}

/// WHY: Cancelled semaphore waiters must never be handed a permit
/// WHAT: after one waiter times out, the next release goes to the waiter behind it
#[test]
#[ntest::timeout(10000)]
fn test_semaphore_timeout_skips_cancelled_waiter() {
    let semaphore = Arc::new(Semaphore::with_available(0, 1).unwrap());

    let impatient = {
        let semaphore = Arc::clone(&semaphore);
        thread::spawn(move || semaphore.acquire_timeout(Duration::from_millis(200)))
    };
    wait_until(|| semaphore.waiting() == 1);

    let patient = {
        let semaphore = Arc::clone(&semaphore);
        thread::spawn(move || semaphore.acquire())
    };
    wait_until(|| semaphore.waiting() == 2);

    assert_eq!(impatient.join().unwrap(), Err(SyncError::Timeout));
    semaphore.release().unwrap();
    patient.join().unwrap();
    assert_eq!(semaphore.available(), 0);
}

/// WHY: Permits must go to waiters in arrival order
/// WHAT: five threads queued on an empty semaphore are served 0..5 through a chain of releases
#[test]
#[ntest::timeout(10000)]
fn test_semaphore_is_fifo() {
    let semaphore = Arc::new(Semaphore::with_available(0, 1).unwrap());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut handles = vec![];
    for id in 0..5 {
        let semaphore_clone = Arc::clone(&semaphore);
        let order_clone = Arc::clone(&order);
        handles.push(thread::spawn(move || {
            semaphore_clone.acquire();
            order_clone.lock().unwrap().push(id);
            semaphore_clone.release().unwrap();
        }));
        wait_until(|| semaphore.waiting() == id + 1);
    }

    semaphore.release().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert_eq!(semaphore.available(), 1);
}

/// WHY: Nobody may leave a barrier before everybody arrived, across rounds
/// WHAT: per generation, all pre-barrier writes precede any post-barrier read and there is one leader
#[test]
#[ntest::timeout(20000)]
fn test_barrier_rounds_with_logical_clock() {
    const PARTIES: usize = 5;
    const ROUNDS: usize = 4;

    let barrier = Arc::new(Barrier::new(PARTIES).unwrap());
    let arrivals: Arc<Vec<AtomicUsize>> =
        Arc::new((0..ROUNDS).map(|_| AtomicUsize::new(0)).collect());

    let handles: Vec<_> = (0..PARTIES)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let arrivals = Arc::clone(&arrivals);
            thread::spawn(move || {
                let mut results = vec![];
                for round in 0..ROUNDS {
                    arrivals[round].fetch_add(1, Ordering::SeqCst);
                    let result = barrier.wait().unwrap();
                    assert_eq!(
                        arrivals[round].load(Ordering::SeqCst),
                        PARTIES,
                        "left round {round} before every party arrived"
                    );
                    results.push(result);
                }
                results
            })
        })
        .collect();

    let mut leaders_per_generation: HashMap<u64, usize> = HashMap::new();
    for handle in handles {
        for result in handle.join().unwrap() {
            *leaders_per_generation.entry(result.generation).or_default() +=
                usize::from(result.is_leader);
        }
    }

    assert_eq!(leaders_per_generation.len(), ROUNDS);
    assert!(leaders_per_generation.values().all(|leaders| *leaders == 1));
    assert_eq!(barrier.generation(), ROUNDS as u64);
    assert_eq!(barrier.n_waiting(), 0);
}

/// WHY: A party timing out must not strand the others
/// WHAT: after one party withdraws, a replacement completes the round for those waiting
#[test]
#[ntest::timeout(10000)]
fn test_barrier_timeout_does_not_affect_others() {
    let barrier = Arc::new(Barrier::new(3).unwrap());

    let steady = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait())
    };
    wait_until(|| barrier.n_waiting() == 1);

    assert_eq!(
        barrier.wait_timeout(Duration::from_millis(30)),
        Err(SyncError::Timeout)
    );
    assert_eq!(barrier.n_waiting(), 1);

    let replacement = {
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || barrier.wait())
    };
    let last = barrier.wait().unwrap();

    let mut outcomes = vec![
        steady.join().unwrap().unwrap(),
        replacement.join().unwrap().unwrap(),
        last,
    ];
    outcomes.retain(|result| result.is_leader);
    assert_eq!(outcomes.len(), 1);
    assert!(!barrier.is_broken());
}

/// WHY: put must suspend on a full queue until a get frees room
/// WHAT: the third put on a capacity-2 queue stays blocked until one get
#[test]
#[ntest::timeout(10000)]
fn test_put_blocks_at_capacity() {
    let queue = Arc::new(BoundedQueue::new(2).unwrap());
    queue.put(1);
    queue.put(2);

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let queue = Arc::clone(&queue);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            queue.put(3);
            done.store(true, Ordering::SeqCst);
        })
    };

    wait_until(|| queue.waiting_producers() == 1);
    thread::sleep(Duration::from_millis(50));
    assert!(!done.load(Ordering::SeqCst), "put returned on a full queue");
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.get(), 1);
    producer.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    assert_eq!(queue.get(), 2);
    assert_eq!(queue.get(), 3);
}

/// WHY: Parked producers must be admitted in arrival order
/// WHAT: four producers parked on a full capacity-1 queue drain after the buffered item, in order
#[test]
#[ntest::timeout(10000)]
fn test_parked_producers_admitted_in_order() {
    let queue = Arc::new(BoundedQueue::new(1).unwrap());
    queue.put(100);

    let mut producers = vec![];
    for id in 0..4 {
        let queue_clone = Arc::clone(&queue);
        producers.push(thread::spawn(move || queue_clone.put(id)));
        wait_until(|| queue.waiting_producers() == id + 1);
    }

    let drained: Vec<_> = (0..5).map(|_| queue.get()).collect();
    for producer in producers {
        producer.join().unwrap();
    }
    assert_eq!(drained, vec![100, 0, 1, 2, 3]);
    assert_eq!(queue.waiting_producers(), 0);
}

/// WHY: Items must be neither lost nor duplicated under contention
/// WHAT: 4 producers x 25 items drained by 4 consumers x 25 gets yields every item once
#[test]
#[ntest::timeout(20000)]
fn test_multi_producer_multi_consumer_exactly_once() {
    let queue = Arc::new(BoundedQueue::new(5).unwrap());

    let producers: Vec<_> = (0..4)
        .map(|producer_id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..25 {
                    queue.put(producer_id * 100 + i);
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || (0..25).map(|_| queue.get()).collect::<Vec<_>>())
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }

    let mut received: Vec<usize> = consumers
        .into_iter()
        .flat_map(|consumer| consumer.join().unwrap())
        .collect();
    received.sort_unstable();

    let mut expected: Vec<usize> = (0..4)
        .flat_map(|producer_id| (0..25).map(move |i| producer_id * 100 + i))
        .collect();
    expected.sort_unstable();

    assert_eq!(received, expected);
    assert!(queue.is_empty());
}

/// WHY: A waiting consumer receives the next item without it passing through the buffer
/// WHAT: with two consumers blocked, each put resolves exactly one get, oldest consumer first
#[test]
#[ntest::timeout(10000)]
fn test_direct_handoff_to_oldest_consumer() {
    let queue = Arc::new(BoundedQueue::new(1).unwrap());

    let spawn_consumer = || {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.get())
    };

    let oldest = spawn_consumer();
    wait_until(|| queue.waiting_consumers() == 1);
    let newest = spawn_consumer();
    wait_until(|| queue.waiting_consumers() == 2);

    queue.put("x");
    assert_eq!(oldest.join().unwrap(), "x");
    assert_eq!(queue.waiting_consumers(), 1);
    assert!(queue.is_empty(), "handed-off item was stored in the buffer");
    assert!(!newest.is_finished());

    queue.put("y");
    assert_eq!(newest.join().unwrap(), "y");
}

/// WHY: A consumer that gives up must not swallow a later item
/// WHAT: after get_timeout fails, the next put is buffered for whoever gets next
#[test]
#[ntest::timeout(10000)]
fn test_get_timeout_leaves_no_consumer_behind() {
    let queue: BoundedQueue<u8> = BoundedQueue::new(1).unwrap();
    assert_eq!(
        queue.get_timeout(Duration::from_millis(20)),
        Err(SyncError::Timeout)
    );
    assert_eq!(queue.waiting_consumers(), 0);

    queue.put(9);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.try_get(), Some(9));
}

/// WHY: join is how a dispatcher learns all work was processed
/// WHAT: join returns only after workers marked every item done
#[test]
#[ntest::timeout(10000)]
fn test_join_waits_for_task_done() {
    let queue: Arc<BoundedQueue<Message<usize>>> = Arc::new(BoundedQueue::new(4).unwrap());
    let processed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let processed = Arc::clone(&processed);
            thread::spawn(move || {
                queue.consume(|_: usize| {
                    thread::sleep(Duration::from_millis(1));
                    processed.fetch_add(1, Ordering::SeqCst);
                })
            })
        })
        .collect();

    for job in 0..20 {
        queue.put_item(job);
    }
    queue.put_stop();
    queue.put_stop();

    queue.join();
    assert_eq!(processed.load(Ordering::SeqCst), 20);
    for worker in workers {
        worker.join().unwrap();
    }
}
