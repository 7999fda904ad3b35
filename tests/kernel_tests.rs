/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

#![allow(dead_code)]

use acton_mesh::prelude::*;

use crate::setup::initialize_tracing;

mod setup;

/// Tests bidirectional link maintenance and the exit signal.
///
/// **Scenario:**
/// 1. Create actors A and B.
/// 2. `A.link_to(B)`; both linked sets must contain the peer.
/// 3. Kill A with a non-normal reason.
///
/// **Verification:**
/// - B's linked set no longer contains A.
/// - B's mailbox receives `(:Exit, 42)` with A as the sender.
#[tokio::test]
async fn test_link_symmetry_and_exit_signal() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, mut rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);

    a.link_to(&b);
    assert!(a.is_linked_to(&b));
    assert!(b.is_linked_to(&a));

    a.exit(42);
    assert!(!b.is_linked_to(&a));

    let signal = rx_b.try_recv().expect("B should have received an exit signal");
    assert_eq!(signal.sender().as_ref(), Some(&a));
    let content = signal.content();
    assert_eq!(content.len(), 2);
    assert_eq!(content.get::<Atom>(0), Some(&atom(":Exit")));
    assert_eq!(content.get::<u32>(1), Some(&42));

    runtime.shutdown().await;
    Ok(())
}

/// A normal exit tears the link down silently: no `(:Exit, _)` signal.
#[tokio::test]
async fn test_normal_exit_sends_no_signal() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, mut rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);

    a.link_to(&b);
    a.exit(exit_reason::NORMAL);

    assert!(!b.is_linked_to(&a));
    assert!(rx_b.try_recv().is_err());

    runtime.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_unlink_removes_both_sides() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, _rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);

    a.link_to(&b);
    a.unlink_from(&b);
    assert!(!a.is_linked_to(&b));
    assert!(!b.is_linked_to(&a));

    // linking an exited peer is a no-op
    b.exit(exit_reason::NORMAL);
    a.link_to(&b);
    assert!(!a.is_linked_to(&b));

    runtime.shutdown().await;
    Ok(())
}

/// Attachables fire exactly once each, in attach order; attaching to an
/// exited actor fails and fires the attachable immediately.
#[tokio::test]
async fn test_attachables_fire_once_in_order() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx, _rx) = mailbox();
    let actor = runtime.create_actor(tx);

    let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    for label in ["first", "second", "third"] {
        let log = log.clone();
        assert!(actor.attach_functor(move |reason| log.lock().unwrap().push((label, reason))));
    }

    actor.exit(7);
    actor.exit(8); // second exit is a no-op
    assert_eq!(
        log.lock().unwrap().as_slice(),
        &[("first", 7), ("second", 7), ("third", 7)]
    );

    // attach after exit: refused, fired immediately with the recorded reason
    let log_after = log.clone();
    assert!(!actor.attach_functor(move |reason| log_after.lock().unwrap().push(("late", reason))));
    assert_eq!(log.lock().unwrap().last(), Some(&("late", 7)));

    runtime.shutdown().await;
    Ok(())
}

/// Registry behavior around exits: ids are monotonic, exited actors
/// resolve to `None`, and the slot stays seen.
#[tokio::test]
async fn test_registry_lifecycle() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, _rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);
    assert!(b.id() > a.id());

    assert_eq!(runtime.actors().get(a.id()), Some(a.clone()));
    a.exit(exit_reason::NORMAL);
    assert!(runtime.actors().get(a.id()).is_none());

    b.exit(exit_reason::NORMAL);
    runtime.shutdown().await;
    Ok(())
}

/// A lookup racing an exit observes either a live handle or `None`,
/// never anything in between.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_registry_exit_race() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    for _ in 0..50 {
        let (tx, _rx) = mailbox();
        let actor = runtime.create_actor(tx);
        let id = actor.id();
        let registry = runtime.actors().clone();

        let reader = std::thread::spawn(move || {
            for _ in 0..100 {
                if let Some(found) = registry.get(id) {
                    assert_eq!(found.id(), id);
                }
            }
        });
        actor.exit(exit_reason::NORMAL);
        reader.join().unwrap();
        assert!(runtime.actors().get(id).is_none());
    }

    runtime.shutdown().await;
    Ok(())
}

/// The running count follows actor lifetimes and the barrier wakes up.
#[tokio::test]
async fn test_running_count_follows_lifetimes() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let base = runtime.actors().running();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, _rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);
    assert_eq!(runtime.actors().running(), base + 2);

    a.exit(exit_reason::NORMAL);
    assert_eq!(runtime.actors().running(), base + 1);

    let registry = runtime.actors().clone();
    let waiter = std::thread::spawn(move || registry.await_running_count_equal(0));
    b.exit(exit_reason::NORMAL);
    waiter.join().unwrap();
    assert_eq!(runtime.actors().running(), 0);

    runtime.shutdown().await;
    Ok(())
}

/// Local delivery: enqueue lands in the mailbox with sender and
/// receiver filled in.
#[tokio::test]
async fn test_local_enqueue_delivers_envelope() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, mut rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);

    b.enqueue(Some(a.clone()), AnyTuple::make((atom("greet"), "hello".to_string())));

    let envelope = rx_b.try_recv().unwrap();
    assert_eq!(envelope.sender().as_ref(), Some(&a));
    assert_eq!(envelope.receiver().as_actor(), Some(&b));
    assert_eq!(envelope.content().get::<Atom>(0), Some(&atom("greet")));

    runtime.shutdown().await;
    Ok(())
}

/// `(:Link, ref)` arriving at a local actor installs a backlink instead
/// of being delivered to user code.
#[tokio::test]
async fn test_link_control_intercepted_at_receiver() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();

    let (tx_a, _rx_a) = mailbox();
    let (tx_b, mut rx_b) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);

    b.enqueue(None, AnyTuple::make((atom(":Link"), Some(a.clone()))));
    assert!(b.is_linked_to(&a));
    assert!(rx_b.try_recv().is_err(), "control message must not be delivered");

    b.enqueue(None, AnyTuple::make((atom(":Unlink"), Some(a.clone()))));
    assert!(!b.is_linked_to(&a));
    assert!(rx_b.try_recv().is_err());

    runtime.shutdown().await;
    Ok(())
}
