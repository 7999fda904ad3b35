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

/// Fan-out reaches every channel subscribed at call entry, and only
/// those.
#[tokio::test]
async fn test_group_fan_out() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let group = runtime.local_group("announcements");

    let (tx_a, mut rx_a) = mailbox();
    let (tx_b, mut rx_b) = mailbox();
    let (tx_c, mut rx_c) = mailbox();
    let a = runtime.create_actor(tx_a);
    let b = runtime.create_actor(tx_b);
    let c = runtime.create_actor(tx_c);

    a.join(&group);
    b.join(&group);
    assert_eq!(group.subscriber_count(), 2);

    group.enqueue(Some(c.clone()), &AnyTuple::make(("news".to_string(),)));

    for rx in [&mut rx_a, &mut rx_b] {
        let envelope = rx.try_recv().expect("subscriber should receive the message");
        assert_eq!(envelope.sender().as_ref(), Some(&c));
        assert_eq!(envelope.content().get::<String>(0).map(String::as_str), Some("news"));
    }
    assert!(rx_c.try_recv().is_err(), "non-subscriber must not receive");

    runtime.shutdown().await;
    Ok(())
}

/// Dropping the subscription handle unsubscribes; a second unsubscribe
/// is harmless.
#[tokio::test]
async fn test_subscription_scope() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let group = runtime.local_group("scoped");

    let (tx, mut rx) = mailbox();
    let actor = runtime.create_actor(tx);
    let channel = ChannelRef::Actor(actor.clone());

    let subscription = group.subscribe(channel.clone()).expect("first subscribe succeeds");
    assert!(group.is_subscribed(&channel));
    assert!(group.subscribe(channel.clone()).is_none(), "double subscribe is refused");

    // explicit unsubscribe first, then drop: idempotent
    group.unsubscribe(&channel);
    drop(subscription);
    assert!(!group.is_subscribed(&channel));

    group.enqueue(None, &AnyTuple::make((1i32,)));
    assert!(rx.try_recv().is_err());

    runtime.shutdown().await;
    Ok(())
}

/// `leave` finds the join's attachment by group identity and removes
/// exactly that subscription.
#[tokio::test]
async fn test_join_and_leave() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let first = runtime.local_group("first");
    let second = runtime.local_group("second");

    let (tx, _rx) = mailbox();
    let actor = runtime.create_actor(tx);

    actor.join(&first);
    actor.join(&second);
    assert_eq!(first.subscriber_count(), 1);
    assert_eq!(second.subscriber_count(), 1);

    actor.leave(&first);
    assert_eq!(first.subscriber_count(), 0);
    assert_eq!(second.subscriber_count(), 1, "other membership untouched");

    runtime.shutdown().await;
    Ok(())
}

/// Exit unsubscribes the actor from every joined group.
#[tokio::test]
async fn test_exit_leaves_groups() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let group = runtime.local_group("members");

    let (tx, _rx) = mailbox();
    let actor = runtime.create_actor(tx);
    actor.join(&group);
    assert_eq!(group.subscriber_count(), 1);

    actor.exit(exit_reason::NORMAL);
    assert_eq!(group.subscriber_count(), 0);

    runtime.shutdown().await;
    Ok(())
}

/// Groups can subscribe to groups; fan-out recurses.
#[tokio::test]
async fn test_nested_group_fan_out() -> anyhow::Result<()> {
    initialize_tracing();
    let runtime = MeshRuntime::launch();
    let outer = runtime.local_group("outer");
    let inner = runtime.local_group("inner");

    let (tx, mut rx) = mailbox();
    let actor = runtime.create_actor(tx);
    actor.join(&inner);

    let _membership = outer
        .subscribe(ChannelRef::Group(inner.clone()))
        .expect("group subscribes to group");

    outer.enqueue(None, &AnyTuple::make((9u16,)));
    let envelope = rx.try_recv().expect("message should flow through both groups");
    assert_eq!(envelope.content().get::<u16>(0), Some(&9));

    runtime.shutdown().await;
    Ok(())
}
