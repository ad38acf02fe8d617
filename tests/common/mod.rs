#![allow(dead_code)]

use campus_connect::models::event::Event;
use campus_connect::models::reward::Reward;
use campus_connect::models::student::Student;
use campus_connect::models::Entity;
use campus_connect::store::{encode, Store, Timestamp};
use serde_json::{json, Value};

pub async fn put(store: &Store, collection: &str, id: &str, fields: Value) {
    store
        .set(collection, id, encode(&fields).unwrap())
        .await
        .unwrap();
}

pub async fn seed_student(store: &Store, id: &str, credit_points: i64) {
    put(
        store,
        Student::COLLECTION,
        id,
        json!({
            "studentId": format!("2025-{}", id),
            "firstName": "Student",
            "lastName": id,
            "email": format!("{}@campus.example.edu", id.to_lowercase()),
            "creditPoints": credit_points,
        }),
    )
    .await;
}

/// An event a week from now worth `credit_points`.
pub async fn seed_event(store: &Store, id: &str, credit_points: i64, attendees: &[&str]) {
    let date = Timestamp::from_seconds(Timestamp::now().seconds + 7 * 24 * 60 * 60);
    put(
        store,
        Event::COLLECTION,
        id,
        json!({
            "title": format!("Event {}", id),
            "description": "A campus event",
            "location": "Library",
            "date": date,
            "creditPoints": credit_points,
            "tags": ["Academic"],
            "attendees": attendees,
        }),
    )
    .await;
}

pub async fn seed_reward(store: &Store, id: &str, credit_cost: i64, quantity: i64) {
    put(
        store,
        Reward::COLLECTION,
        id,
        json!({
            "title": format!("Reward {}", id),
            "description": "Something nice",
            "creditCost": credit_cost,
            "quantity": quantity,
            "category": "merchandise",
            "redeemedBy": [],
        }),
    )
    .await;
}

pub async fn balance(store: &Store, id: &str) -> i64 {
    Student::with_id(id, store).await.unwrap().credit_points
}
