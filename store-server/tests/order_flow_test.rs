//! 订单全流程集成测试
//!
//! 购物车 → 结算 → 状态流转 → 配送跟踪 → 实时推送，覆盖
//! 顾客视角 (下单、取消、断线补发) 和操作端视角 (流转、配送上报)。

use shared::message::FeedPayload;
use shared::models::{CartOwner, ProductCreate};
use shared::order::{
    Actor, DeliveryInfo, OrderStatus, PaymentStatus, TrackingStatus, TrackingView,
};
use store_server::db::repository::{cart, product, stock, tracking};
use store_server::orders::{self, OrderError, TrackingUpdate};
use store_server::{Config, ServerState};

async fn test_state(dir: &tempfile::TempDir) -> ServerState {
    let config = Config::with_overrides(dir.path().to_string_lossy(), 0);
    ServerState::initialize(&config).await.unwrap()
}

fn operator() -> Actor {
    Actor::Operator { id: "op1".into() }
}

fn delivery() -> DeliveryInfo {
    DeliveryInfo {
        delivery_address: "1 Main St".into(),
        payment_method: Some("card".into()),
        notes: Some("Ring twice".into()),
    }
}

async fn seed_product(state: &ServerState, name: &str, price: i64, stock_units: i64) -> i64 {
    product::create(
        state.db(),
        ProductCreate {
            name: name.into(),
            description: None,
            price,
            image_url: None,
            category: Some("drinks".into()),
            stock_quantity: stock_units,
            is_available: Some(true),
        },
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn full_delivery_flow() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let owner = CartOwner::User("alice".into());
    let tea = seed_product(&state, "Tea", 900, 10).await;
    let coffee = seed_product(&state, "Coffee", 1200, 10).await;

    cart::add_item(state.db(), &owner, tea, 2).await.unwrap();
    cart::add_item(state.db(), &owner, coffee, 1).await.unwrap();

    let mut feed_rx = state.feed().subscribe_all();

    let detail = orders::checkout(
        state.db(),
        state.feed(),
        &owner,
        delivery(),
        state.config.delivery_fee,
    )
    .await
    .unwrap();
    let order_id = detail.order.id;
    assert_eq!(detail.order.subtotal, 3000);
    assert_eq!(detail.order.total_amount, 6000);
    assert_eq!(detail.order.payment_status, PaymentStatus::Pending);

    // Creation and the initial tracking event hit the feed in order
    let created = feed_rx.recv().await.unwrap();
    assert!(matches!(created.payload, FeedPayload::OrderCreated { .. }));
    let placed = feed_rx.recv().await.unwrap();
    assert!(matches!(placed.payload, FeedPayload::TrackingAppended { .. }));

    // Operator confirms and marks payment collected
    let confirmed = orders::transition(
        state.db(),
        state.feed(),
        order_id,
        OrderStatus::Confirmed,
        &operator(),
        Some(PaymentStatus::Paid),
    )
    .await
    .unwrap();
    assert_eq!(confirmed.payment_status, PaymentStatus::Paid);

    orders::transition(
        state.db(),
        state.feed(),
        order_id,
        OrderStatus::Preparing,
        &operator(),
        None,
    )
    .await
    .unwrap();

    // Courier takes over: out_for_delivery implies delivering
    orders::record_tracking(
        state.db(),
        state.feed(),
        order_id,
        TrackingUpdate {
            status: TrackingStatus::OutForDelivery,
            location: Some("Depot 4".into()),
            notes: None,
            estimated_time: None,
        },
        &operator(),
    )
    .await
    .unwrap();

    orders::record_tracking(
        state.db(),
        state.feed(),
        order_id,
        TrackingUpdate {
            status: TrackingStatus::Delivered,
            location: None,
            notes: Some("Left at the door".into()),
            estimated_time: None,
        },
        &operator(),
    )
    .await
    .unwrap();

    // Final state: delivered, full log, 100% progress
    let history = tracking::history(state.db(), order_id).await.unwrap();
    let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![
            TrackingStatus::OrderPlaced,
            TrackingStatus::OrderConfirmed,
            TrackingStatus::Preparing,
            TrackingStatus::OutForDelivery,
            TrackingStatus::Delivered,
        ]
    );

    let view = TrackingView::from_history(order_id, history);
    assert_eq!(view.current_status, Some(TrackingStatus::Delivered));
    assert_eq!(view.progress, 100);
    // Initial 30-minute estimate survives on the view
    assert!(view.estimated_time.is_some());

    // Terminal: nothing moves a delivered order
    let result = orders::transition(
        state.db(),
        state.feed(),
        order_id,
        OrderStatus::Cancelled,
        &operator(),
        None,
    )
    .await;
    assert!(matches!(result, Err(OrderError::IllegalTransition { .. })));
}

#[tokio::test]
async fn cancellation_restores_stock_and_closes_the_log() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let owner = CartOwner::User("bob".into());
    let tea = seed_product(&state, "Tea", 900, 5).await;

    cart::add_item(state.db(), &owner, tea, 4).await.unwrap();
    let detail = orders::checkout(
        state.db(),
        state.feed(),
        &owner,
        delivery(),
        state.config.delivery_fee,
    )
    .await
    .unwrap();
    assert_eq!(stock::quantity_of(state.db(), tea).await.unwrap(), 1);

    let actor = Actor::Customer { owner: owner.key() };
    let cancelled = orders::transition(
        state.db(),
        state.feed(),
        detail.order.id,
        OrderStatus::Cancelled,
        &actor,
        None,
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock::quantity_of(state.db(), tea).await.unwrap(), 5);

    let history = tracking::history(state.db(), detail.order.id).await.unwrap();
    assert_eq!(history.last().unwrap().status, TrackingStatus::Cancelled);
    let view = TrackingView::from_history(detail.order.id, history);
    assert_eq!(view.progress, 0);
}

#[tokio::test]
async fn reconnect_resync_returns_exactly_the_missed_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let owner = CartOwner::Session("anon-7".into());
    let tea = seed_product(&state, "Tea", 900, 10).await;

    cart::add_item(state.db(), &owner, tea, 1).await.unwrap();
    let detail = orders::checkout(
        state.db(),
        state.feed(),
        &owner,
        delivery(),
        state.config.delivery_fee,
    )
    .await
    .unwrap();
    let order_id = detail.order.id;

    // Viewer saw only the order_placed event, then dropped
    let seen = tracking::history(state.db(), order_id).await.unwrap();
    let last_seen = seen.last().unwrap().event_id.clone();

    orders::transition(
        state.db(),
        state.feed(),
        order_id,
        OrderStatus::Confirmed,
        &operator(),
        None,
    )
    .await
    .unwrap();
    orders::transition(
        state.db(),
        state.feed(),
        order_id,
        OrderStatus::Preparing,
        &operator(),
        None,
    )
    .await
    .unwrap();

    let missed = tracking::events_after(state.db(), order_id, &last_seen)
        .await
        .unwrap();
    let statuses: Vec<_> = missed.iter().map(|e| e.status).collect();
    assert_eq!(
        statuses,
        vec![TrackingStatus::OrderConfirmed, TrackingStatus::Preparing]
    );
}

#[tokio::test]
async fn session_cart_merges_into_user_before_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir).await;
    let session = CartOwner::Session("anon-1".into());
    let user = CartOwner::User("carol".into());
    let tea = seed_product(&state, "Tea", 900, 10).await;
    let coffee = seed_product(&state, "Coffee", 1200, 10).await;

    // Browsing anonymously, then logging in
    cart::add_item(state.db(), &session, tea, 2).await.unwrap();
    cart::add_item(state.db(), &user, coffee, 1).await.unwrap();
    let merged = cart::merge(state.db(), &user, &session).await.unwrap();
    assert_eq!(merged.item_count, 3);

    let detail = orders::checkout(
        state.db(),
        state.feed(),
        &user,
        delivery(),
        state.config.delivery_fee,
    )
    .await
    .unwrap();
    assert_eq!(detail.order.owner, "user:carol");
    assert_eq!(detail.order.subtotal, 3000);
    assert_eq!(detail.items.len(), 2);

    // The anonymous cart stays empty after the merge
    assert!(
        cart::snapshot(state.db(), &session)
            .await
            .unwrap()
            .is_empty()
    );
}
