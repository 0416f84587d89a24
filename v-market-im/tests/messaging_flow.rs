//! 消息核心端到端场景（内存存储）
//! End-to-end messaging scenarios over the in-memory store

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use v_market_im::domain::{Role, SubscribeScope, UserProfile};
use v_market_im::service::{
    ChangeEvent, ChangeNotifier, MessagingService, MessagingSettings, ThreadView, Topic,
};
use v_market_im::storage::{MemoryDirectory, MemoryStore};
use v_market_im::ImError;

struct Fixture {
    service: MessagingService,
    store: Arc<MemoryStore>,
    notifier: ChangeNotifier,
}

fn users() -> Vec<UserProfile> {
    vec![
        UserProfile::new("u1", Role::Buyer, "Asha"),
        UserProfile::new("u2", Role::Seller, "Green Farm"),
        UserProfile::new("u3", Role::Buyer, "Bo"),
        UserProfile::new("s2", Role::Seller, "Hill Orchard"),
        UserProfile::new("a1", Role::Admin, "Ops"),
    ]
}

fn user(id: &str) -> UserProfile {
    users()
        .into_iter()
        .find(|u| u.id == id)
        .expect("fixture user")
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::with_users(users()));
    let notifier = ChangeNotifier::new(64);
    let service = MessagingService::new(
        store.clone(),
        directory,
        notifier.clone(),
        MessagingSettings::default(),
    );
    Fixture {
        service,
        store,
        notifier,
    }
}

#[tokio::test]
async fn thread_identity_is_idempotent_across_callers() {
    let f = fixture();
    let by_buyer = f
        .service
        .open_or_create_thread(&user("u1"), "u2", Some("p7"))
        .await
        .unwrap();
    let by_seller = f
        .service
        .open_or_create_thread(&user("u2"), "u1", Some("p7"))
        .await
        .unwrap();
    let again = f
        .service
        .open_or_create_thread(&user("u1"), " u2 ", Some("p7"))
        .await
        .unwrap();
    assert_eq!(by_buyer, by_seller);
    assert_eq!(by_buyer, again);

    let general = f
        .service
        .open_or_create_thread(&user("u1"), "u2", None)
        .await
        .unwrap();
    assert_ne!(general, by_buyer);
    assert_eq!(f.store.thread_count(), 2);
}

#[tokio::test]
async fn invalid_openings_are_rejected() {
    let f = fixture();
    assert!(matches!(
        f.service.open_or_create_thread(&user("u1"), "u1", None).await,
        Err(ImError::InvalidParticipants(_))
    ));
    assert!(matches!(
        f.service.open_or_create_thread(&user("u2"), "s2", None).await,
        Err(ImError::ForbiddenPair { .. })
    ));
    assert!(matches!(
        f.service.open_or_create_thread(&user("u1"), "ghost", None).await,
        Err(ImError::NotFound { .. })
    ));
    assert_eq!(f.store.thread_count(), 0);
}

#[tokio::test]
async fn append_order_is_preserved_without_duplicates() {
    let f = fixture();
    let buyer = user("u1");
    let seller = user("u2");
    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", None)
        .await
        .unwrap();
    for (who, text) in [(&buyer, "hi"), (&seller, "hello"), (&buyer, "price?")] {
        f.service.send_message(who, &tid, text).await.unwrap();
    }
    let all = f.service.list_messages(&buyer, &tid, None, None).await.unwrap();
    let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "hello", "price?"]);
    let ids: HashSet<&str> = all.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(all.windows(2).all(|w| w[0].created_at < w[1].created_at));

    let later = f
        .service
        .list_messages(&seller, &tid, Some(all[0].seq), None)
        .await
        .unwrap();
    assert_eq!(later.len(), 2);
    assert_eq!(later[0].content, "hello");
}

#[tokio::test]
async fn blank_messages_are_rejected_and_not_written() {
    let f = fixture();
    let buyer = user("u1");
    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", None)
        .await
        .unwrap();
    assert_eq!(
        f.service.send_message(&buyer, &tid, "").await,
        Err(ImError::EmptyMessage)
    );
    assert_eq!(
        f.service.send_message(&buyer, &tid, "   ").await,
        Err(ImError::EmptyMessage)
    );
    assert_eq!(f.store.message_count(), 0);
    assert!(matches!(
        f.service.send_message(&user("u3"), &tid, "let me in").await,
        Err(ImError::NotAParticipant { .. })
    ));
}

#[tokio::test]
async fn organic_question_scenario() {
    let f = fixture();
    let buyer = user("u1");
    let seller = user("u2");

    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", Some("p7"))
        .await
        .unwrap();
    let sent = f
        .service
        .send_message(&buyer, &tid, "Is this organic?")
        .await
        .unwrap();
    assert_eq!(sent.sender_id, "u1");
    assert_eq!(sent.receiver_id, "u2");
    assert!(!sent.is_read);

    let contacts = f.service.list_contacts(&seller, None).await.unwrap();
    assert_eq!(contacts.len(), 1);
    let c = &contacts[0];
    assert_eq!(c.counterpart_id, "u1");
    assert_eq!(c.counterpart_name, "Asha");
    assert_eq!(c.counterpart_role, Some(Role::Buyer));
    assert_eq!(c.product_id.as_deref(), Some("p7"));
    assert_eq!(c.last_message_preview, "Is this organic?");
    assert_eq!(c.unread_count, 1);
    assert_eq!(f.service.unread_total(&seller).await.unwrap(), 1);

    // 发送方自己的收件箱里没有未读 / The sender has nothing unread
    let buyer_view = f.service.list_contacts(&buyer, None).await.unwrap();
    assert_eq!(buyer_view[0].unread_count, 0);
    assert_eq!(buyer_view[0].counterpart_name, "Green Farm");

    assert_eq!(f.service.mark_thread_read(&seller, &tid).await.unwrap(), 1);
    let contacts = f.service.list_contacts(&seller, None).await.unwrap();
    assert_eq!(contacts[0].unread_count, 0);
    assert_eq!(f.service.mark_thread_read(&seller, &tid).await.unwrap(), 0);
    assert_eq!(f.service.unread_total(&seller).await.unwrap(), 0);
}

#[tokio::test]
async fn contacts_follow_latest_activity() {
    let f = fixture();
    let buyer = user("u1");
    let t_farm = f
        .service
        .open_or_create_thread(&buyer, "u2", None)
        .await
        .unwrap();
    let t_orchard = f
        .service
        .open_or_create_thread(&buyer, "s2", None)
        .await
        .unwrap();
    f.service.send_message(&buyer, &t_farm, "first").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    f.service.send_message(&buyer, &t_orchard, "second").await.unwrap();
    let order: Vec<String> = f
        .service
        .list_contacts(&buyer, None)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.thread_id)
        .collect();
    assert_eq!(order, vec![t_orchard.clone(), t_farm.clone()]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    f.service.send_message(&buyer, &t_farm, "bump").await.unwrap();
    let top = f.service.list_contacts(&buyer, None).await.unwrap();
    assert_eq!(top[0].thread_id, t_farm);
}

#[tokio::test]
async fn admin_tabs_are_disjoint() {
    let f = fixture();
    let admin = user("a1");
    let with_buyer = f
        .service
        .open_or_create_thread(&admin, "u1", None)
        .await
        .unwrap();
    let with_seller = f
        .service
        .open_or_create_thread(&admin, "u2", None)
        .await
        .unwrap();
    f.service
        .send_message(&user("u1"), &with_buyer, "refund please")
        .await
        .unwrap();
    f.service
        .send_message(&admin, &with_seller, "listing review")
        .await
        .unwrap();

    let sellers = f
        .service
        .list_contacts(&admin, Some(Role::Seller))
        .await
        .unwrap();
    let buyers = f
        .service
        .list_contacts(&admin, Some(Role::Buyer))
        .await
        .unwrap();
    assert_eq!(sellers.len(), 1);
    assert_eq!(buyers.len(), 1);
    assert_eq!(sellers[0].counterpart_id, "u2");
    assert_eq!(buyers[0].counterpart_id, "u1");
    let seller_threads: HashSet<_> = sellers.iter().map(|c| c.thread_id.clone()).collect();
    assert!(buyers.iter().all(|c| !seller_threads.contains(&c.thread_id)));
    assert_eq!(buyers[0].unread_count, 1);
    assert_eq!(f.service.list_contacts(&admin, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn two_sessions_converge_on_the_same_list() {
    let f = fixture();
    let buyer = user("u1");
    let seller = user("u2");
    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", Some("p7"))
        .await
        .unwrap();
    f.service.send_message(&buyer, &tid, "Is this organic?").await.unwrap();

    let mut sub_a = f
        .service
        .subscribe(&buyer, SubscribeScope::Thread, &tid)
        .await
        .unwrap();
    let mut sub_b = f
        .service
        .subscribe(&buyer, SubscribeScope::Thread, &tid)
        .await
        .unwrap();
    let mut view_a = ThreadView::new(tid.clone());
    let mut view_b = ThreadView::new(tid.clone());
    view_a.reload(&f.service, &buyer).await.unwrap();
    view_b.reload(&f.service, &buyer).await.unwrap();

    let reply = f
        .service
        .send_message(&seller, &tid, "Yes, certified")
        .await
        .unwrap();
    let expected = ChangeEvent::MessageAppended {
        thread_id: tid.clone(),
        message_id: reply.id.clone(),
        seq: reply.seq,
    };
    assert_eq!(sub_a.recv().await, Some(expected.clone()));
    assert_eq!(sub_b.recv().await, Some(expected));

    let fresh_a = view_a.reload(&f.service, &buyer).await.unwrap();
    let fresh_b = view_b.reload(&f.service, &buyer).await.unwrap();
    assert_eq!(fresh_a.len(), 1);
    assert_eq!(fresh_b.len(), 1);
    // 重复事件不会造成重复 / A duplicate event causes no duplicates
    assert!(view_a.reload(&f.service, &buyer).await.unwrap().is_empty());

    let ids = |v: &ThreadView| v.messages().iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&view_a), ids(&view_b));
    assert_eq!(view_a.messages().len(), 2);
}

#[tokio::test]
async fn read_state_reaches_other_sessions_inbox() {
    let f = fixture();
    let buyer = user("u1");
    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", None)
        .await
        .unwrap();
    f.service
        .send_message(&user("u2"), &tid, "fresh stock today")
        .await
        .unwrap();
    let mut other_session = f
        .service
        .subscribe(&buyer, SubscribeScope::Inbox, "u1")
        .await
        .unwrap();
    f.service.mark_thread_read(&buyer, &tid).await.unwrap();
    assert_eq!(
        other_session.recv().await,
        Some(ChangeEvent::ThreadTouched { thread_id: tid })
    );
}

#[tokio::test]
async fn subscriptions_are_authorized_and_released() {
    let f = fixture();
    let buyer = user("u1");
    let tid = f
        .service
        .open_or_create_thread(&buyer, "u2", None)
        .await
        .unwrap();

    assert!(matches!(
        f.service
            .subscribe(&user("u3"), SubscribeScope::Thread, &tid)
            .await,
        Err(ImError::NotAParticipant { .. })
    ));
    assert!(f
        .service
        .subscribe(&user("a1"), SubscribeScope::Inbox, "u1")
        .await
        .is_err());

    let admin_inbox = f
        .service
        .subscribe(&user("a1"), SubscribeScope::Inbox, "a1")
        .await
        .unwrap();
    let thread_sub = f
        .service
        .subscribe(&buyer, SubscribeScope::Thread, &tid)
        .await
        .unwrap();
    assert_eq!(f.notifier.topic_count(), 2);
    assert_eq!(f.notifier.subscriber_count(&Topic::Thread(tid.clone())), 1);

    drop(thread_sub);
    drop(admin_inbox);
    assert_eq!(f.notifier.topic_count(), 0);
}
