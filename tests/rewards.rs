mod common;

use campus_connect::error::ConsoleError;
use campus_connect::models::reward::{Reward, RewardCategory, RewardEdit, RewardForm};
use campus_connect::models::Entity;
use campus_connect::store::Store;
use serde_json::json;

use common::{balance, put, seed_reward, seed_student};

fn hoodie() -> RewardForm {
    RewardForm {
        title: "Campus Hoodie".to_owned(),
        description: "Official CampusConnect hoodie".to_owned(),
        credit_cost: 100,
        quantity: 10,
        expiry_date: Some("2099-12-31".to_owned()),
        image_url: String::new(),
        category: Some(RewardCategory::Merchandise),
        tags: vec!["apparel".to_owned(), "apparel".to_owned()],
    }
}

#[tokio::test]
async fn created_rewards_start_unredeemed() {
    let store = Store::memory();

    let id = Reward::create(hoodie(), &store).await.unwrap();
    let reward = Reward::with_id(&id, &store).await.unwrap();

    assert_eq!(reward.title, "Campus Hoodie");
    assert_eq!(reward.category, "merchandise");
    assert_eq!(reward.tags, ["apparel"]);
    assert!(reward.redeemed_by.is_empty());
    assert!(reward.created_at.is_some());
    assert!(!reward.expired_at(time::OffsetDateTime::now_utc()));
}

#[tokio::test]
async fn updates_keep_redemptions() {
    let store = Store::memory();
    seed_reward(&store, "R1", 20, 2).await;
    seed_student(&store, "S1", 50).await;
    Reward::redeem("R1", "S1", &store).await.unwrap();

    let edit = RewardEdit {
        quantity: Some(0),
        ..RewardEdit::default()
    };
    Reward::update("R1", edit, &store).await.unwrap();

    let reward = Reward::with_id("R1", &store).await.unwrap();
    assert_eq!(reward.quantity, 0);
    assert_eq!(reward.credit_cost, 20);
    assert_eq!(reward.title, "Reward R1");
    assert_eq!(reward.category, "merchandise");
    assert_eq!(reward.redeemed_by, ["S1"]);

    let err = Reward::update("missing", RewardEdit::default(), &store)
        .await
        .unwrap_err();
    assert!(matches!(err, ConsoleError::NotFound { entity: "reward", .. }));
}

#[tokio::test]
async fn redeeming_spends_points_and_stock() {
    let store = Store::memory();
    seed_reward(&store, "R1", 20, 2).await;
    seed_student(&store, "S1", 50).await;

    let redemption = Reward::redeem("R1", "S1", &store).await.unwrap();

    assert_eq!(redemption.credit_points, 30);
    assert_eq!(redemption.quantity_remaining, 1);
    assert_eq!(balance(&store, "S1").await, 30);

    let err = Reward::redeem("R1", "S1", &store).await.unwrap_err();
    assert!(matches!(err, ConsoleError::Redemption(_)));
    assert_eq!(balance(&store, "S1").await, 30);
}

#[tokio::test]
async fn redemption_needs_stock_balance_and_time() {
    let store = Store::memory();
    seed_student(&store, "S1", 10).await;
    seed_reward(&store, "sold-out", 5, 0).await;
    seed_reward(&store, "pricey", 500, 3).await;
    put(
        &store,
        Reward::COLLECTION,
        "expired",
        json!({
            "title": "Old voucher",
            "creditCost": 1,
            "quantity": 3,
            "expiryDate": { "seconds": 1_000 },
        }),
    )
    .await;

    for reward in ["sold-out", "pricey", "expired"] {
        let err = Reward::redeem(reward, "S1", &store).await.unwrap_err();
        assert!(
            matches!(err, ConsoleError::Redemption(_)),
            "{} should not be redeemable",
            reward
        );
    }
    assert_eq!(balance(&store, "S1").await, 10);
}

#[tokio::test]
async fn deleted_rewards_are_gone() {
    let store = Store::memory();
    seed_reward(&store, "R1", 20, 2).await;

    Reward::delete("R1", &store).await.unwrap();

    assert!(Reward::with_id_opt("R1", &store).await.unwrap().is_none());
    let err = Reward::delete("R1", &store).await.unwrap_err();
    assert!(matches!(err, ConsoleError::NotFound { entity: "reward", .. }));
}
