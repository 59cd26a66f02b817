//! End-to-end engine tests against the in-memory store.
//!
//! Verifies:
//! - stock always equals initial stock minus committed demand, never negative
//! - concurrent checkouts on one product never oversell
//! - aborted placements leave no trace
//! - review uniqueness and verified-purchase immutability

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value as JsonValue};

    use storefront_core::{CustomerId, ProductId};
    use storefront_products::NewProduct;
    use storefront_reviews::NewReview;
    use storefront_sales::{Cart, CartLine, OrderStatus};

    use crate::engine::Engine;
    use crate::error::EngineError;
    use crate::order_placement::{PlaceOrder, PlacementPolicy};
    use crate::store::testing::RecordingStore;
    use crate::store::InMemoryStore;

    fn engine() -> Engine {
        Engine::in_memory()
    }

    async fn create(engine: &Engine, slug: &str, price: u64, stock: i64) -> ProductId {
        engine
            .catalog
            .create_product(NewProduct {
                slug: slug.to_string(),
                name: slug.to_uppercase(),
                price,
                discount_price: None,
                initial_stock: stock,
            })
            .await
            .unwrap()
            .id_typed()
    }

    fn order_of(customer_id: Option<CustomerId>, product_id: ProductId, quantity: i64) -> PlaceOrder {
        PlaceOrder {
            customer_id,
            cart: Cart::new(vec![CartLine {
                product_id,
                quantity,
            }])
            .unwrap(),
            shipping: json!({ "line1": "12 Mall Road" }),
            billing: JsonValue::Null,
        }
    }

    #[tokio::test]
    async fn esp32_cam_scenario() {
        let engine = engine();
        let cam = create(&engine, "esp32-cam", 1_299, 5).await;

        engine.orders.place_order(order_of(None, cam, 5)).await.unwrap();
        let snap = engine.ledger.get_stock(cam).await.unwrap();
        assert_eq!((snap.quantity, snap.in_stock), (0, false));

        let err = engine
            .orders
            .place_order(order_of(None, cam, 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "insufficient_stock");
        assert_eq!(err.product_id(), Some(cam));

        let snap = engine.inventory.restock(cam, 10).await.unwrap();
        assert_eq!((snap.quantity, snap.in_stock), (10, true));

        engine.orders.place_order(order_of(None, cam, 3)).await.unwrap();
        assert_eq!(engine.ledger.get_stock(cam).await.unwrap().quantity, 7);
    }

    #[tokio::test]
    async fn stock_tracks_committed_demand() {
        let engine = engine();
        let initial = 20;
        let id = create(&engine, "led-strip", 800, initial).await;

        let mut ordered = 0;
        for qty in [3, 7, 9, 4, 1] {
            match engine.orders.place_order(order_of(None, id, qty)).await {
                Ok(_) => ordered += qty,
                Err(EngineError::InsufficientStock(_)) => {}
                Err(other) => panic!("unexpected error {other:?}"),
            }
            let snap = engine.ledger.get_stock(id).await.unwrap();
            assert_eq!(snap.quantity, initial - ordered);
            assert!(snap.quantity >= 0);
            assert_eq!(snap.in_stock, snap.quantity > 0);
        }
        assert_eq!(ordered, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let store = Arc::new(InMemoryStore::with_lock_timeout(Duration::from_secs(5)));
        let engine = Engine::new(store, PlacementPolicy::default());
        let n = 4;
        let k = 8;
        let id = create(&engine, "raspberry-pi", 5_500, n).await;

        let mut handles = Vec::new();
        for _ in 0..k {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.orders.place_order(order_of(None, id, n)).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(err) => assert!(
                    matches!(err, EngineError::InsufficientStock(_) | EngineError::Conflict(_)),
                    "unexpected error {err:?}"
                ),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(engine.ledger.get_stock(id).await.unwrap().quantity, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_unit_checkouts_consume_exactly_the_stock() {
        let engine = Engine::new(
            Arc::new(InMemoryStore::with_lock_timeout(Duration::from_secs(5))),
            PlacementPolicy::default(),
        );
        let id = create(&engine, "servo", 300, 5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.orders.place_order(order_of(None, id, 1)).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        let snap = engine.ledger.get_stock(id).await.unwrap();
        assert_eq!((snap.quantity, snap.in_stock), (0, false));
    }

    enum Outcome {
        Placed,
        Restocked,
        Corrected,
        Rejected,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admin_adjustments_serialise_with_checkouts() {
        const INITIAL: i64 = 10;
        const RESTOCK: i64 = 50;
        const CORRECTIONS: [i64; 4] = [4, 0, 7, 2];

        let recording = Arc::new(RecordingStore::new(InMemoryStore::with_lock_timeout(
            Duration::from_secs(5),
        )));
        let engine = Engine::new(recording.clone(), PlacementPolicy::default());
        let id = create(&engine, "stepper-motor", 1_800, INITIAL).await;

        let mut handles = Vec::new();
        for i in 0..24 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                let result = match i % 6 {
                    1 if i < 18 => engine.inventory.restock(id, RESTOCK).await.map(|_| Outcome::Restocked),
                    4 => engine
                        .inventory
                        .correct_stock(id, CORRECTIONS[i / 6])
                        .await
                        .map(|_| Outcome::Corrected),
                    _ => engine
                        .orders
                        .place_order(order_of(None, id, 1))
                        .await
                        .map(|_| Outcome::Placed),
                };
                match result {
                    Ok(outcome) => outcome,
                    Err(EngineError::InsufficientStock(_) | EngineError::Conflict(_)) => Outcome::Rejected,
                    Err(other) => panic!("unexpected error {other:?}"),
                }
            }));
        }

        let (mut placed, mut restocked, mut corrected) = (0, 0, 0);
        for handle in handles {
            match handle.await.unwrap() {
                Outcome::Placed => placed += 1,
                Outcome::Restocked => restocked += 1,
                Outcome::Corrected => corrected += 1,
                Outcome::Rejected => {}
            }
        }

        let writes: Vec<_> = recording
            .stock_writes()
            .into_iter()
            .filter(|w| w.product_id == id)
            .collect();
        assert_eq!(writes.len(), placed + restocked + corrected);

        // Every committed write starts from the level the previous one left.
        let mut current = INITIAL;
        let (mut seen_placed, mut seen_restocked, mut seen_corrected) = (0, 0, 0);
        for w in &writes {
            assert_eq!(w.before.quantity(), current);
            let after = w.after.quantity();
            assert!(after >= 0);
            assert_eq!(w.after.in_stock(), after > 0);

            if w.with_order {
                assert_eq!(after, current - 1);
                seen_placed += 1;
            } else if after - current == RESTOCK {
                seen_restocked += 1;
            } else {
                assert!(CORRECTIONS.contains(&after), "unexplained stock write {w:?}");
                seen_corrected += 1;
            }
            current = after;
        }
        assert_eq!((seen_placed, seen_restocked, seen_corrected), (placed, restocked, corrected));

        let snap = engine.ledger.get_stock(id).await.unwrap();
        assert_eq!(snap.quantity, current);
        assert_eq!(snap.in_stock, snap.quantity > 0);
    }

    #[tokio::test]
    async fn aborted_placement_is_idempotent() {
        let engine = engine();
        let plenty = create(&engine, "resistor-kit", 900, 50).await;
        let scarce = create(&engine, "oled-display", 1_100, 1).await;

        let request = PlaceOrder {
            customer_id: Some(CustomerId::new()),
            cart: Cart::new(vec![
                CartLine {
                    product_id: plenty,
                    quantity: 10,
                },
                CartLine {
                    product_id: scarce,
                    quantity: 2,
                },
            ])
            .unwrap(),
            shipping: JsonValue::Null,
            billing: JsonValue::Null,
        };

        for _ in 0..3 {
            let err = engine.orders.place_order(request.clone()).await.unwrap_err();
            assert_eq!(err.kind(), "insufficient_stock");
            assert_eq!(engine.ledger.get_stock(plenty).await.unwrap().quantity, 50);
            assert_eq!(engine.ledger.get_stock(scarce).await.unwrap().quantity, 1);
        }

        // The product is still deletable: no order item was left behind.
        engine.catalog.delete_product(plenty).await.unwrap();
    }

    #[tokio::test]
    async fn review_pair_is_unique() {
        let engine = engine();
        create(&engine, "multimeter", 2_500, 3).await;

        let submit = |email: &str| NewReview {
            product_slug: "multimeter".to_string(),
            customer_email: email.to_string(),
            rating: 4,
            comment: "Accurate enough".to_string(),
            customer_id: None,
        };

        engine.reviews.submit_review(submit("kim@example.com")).await.unwrap();
        let err = engine
            .reviews
            .submit_review(submit("kim@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateReview { .. }));

        engine.reviews.submit_review(submit("lee@example.com")).await.unwrap();
        assert_eq!(engine.reviews.list_reviews("multimeter").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn verified_flag_survives_cancellation() {
        let engine = engine();
        let id = create(&engine, "heat-gun", 3_200, 2).await;
        let customer = CustomerId::new();

        let order = engine
            .orders
            .place_order(order_of(Some(customer), id, 1))
            .await
            .unwrap();
        let review = engine
            .reviews
            .submit_review(NewReview {
                product_slug: "heat-gun".to_string(),
                customer_email: "buyer@example.com".to_string(),
                rating: 5,
                comment: String::new(),
                customer_id: Some(customer),
            })
            .await
            .unwrap();
        assert!(review.verified_purchase());

        engine
            .orders
            .update_status(order.id_typed(), OrderStatus::Cancelled)
            .await
            .unwrap();

        let listed = engine.reviews.list_reviews("heat-gun").await.unwrap();
        assert!(listed[0].verified_purchase());
        assert_eq!(listed[0].id_typed(), review.id_typed());
    }

    #[tokio::test]
    async fn closed_engine_reports_storage_unavailable() {
        let engine = engine();
        let id = create(&engine, "fuse", 50, 1).await;
        engine.close().await;

        let err = engine.ledger.get_stock(id).await.unwrap_err();
        assert_eq!(err.kind(), "storage_unavailable");
    }
}
