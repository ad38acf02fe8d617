mod common;

use async_graphql::Request;
use campus_connect::graphql::{build_schema, ConsoleSchema};
use campus_connect::models::session::{AdminUser, Session};
use campus_connect::store::Store;
use futures::StreamExt;
use serde_json::{json, Value};

use common::{balance, seed_event, seed_reward, seed_student};

fn admin() -> Session {
    Session::Admin(AdminUser {
        id: "admin-1".to_owned(),
        first_name: "Dana".to_owned(),
        last_name: "Reyes".to_owned(),
        email: "dana@campus.example.edu".to_owned(),
    })
}

async fn run(schema: &ConsoleSchema, session: Session, query: &str) -> Value {
    let response = schema.execute(Request::new(query).data(session)).await;
    serde_json::to_value(&response).unwrap()
}

async fn seeded() -> (Store, ConsoleSchema) {
    let store = Store::memory();
    seed_student(&store, "S1", 5).await;
    seed_student(&store, "S2", 3).await;
    seed_event(&store, "E1", 10, &["S1", "S2"]).await;

    let schema = build_schema(store.clone());
    (store, schema)
}

#[tokio::test]
async fn anonymous_visitors_are_sent_to_sign_up() {
    let (_, schema) = seeded().await;

    let body = run(&schema, Session::Anonymous, "{ events { id } }").await;

    let error = &body["errors"][0];
    assert_eq!(error["message"], "Sign in required");
    assert_eq!(error["extensions"]["redirect"], "/signup");
    assert_eq!(error["extensions"]["status"], 401);

    let body = run(&schema, Session::Anonymous, "{ session { id } }").await;
    assert_eq!(body["data"]["session"], Value::Null);
}

#[tokio::test]
async fn the_dashboard_counts_everything() {
    let (_, schema) = seeded().await;

    let body = run(
        &schema,
        admin(),
        "{ dashboard { adminName totalEvents totalStudents upcomingEvents nextEvents { id registeredCount } } }",
    )
    .await;

    assert_eq!(
        body["data"]["dashboard"],
        json!({
            "adminName": "Dana",
            "totalEvents": 1,
            "totalStudents": 2,
            "upcomingEvents": 1,
            "nextEvents": [{ "id": "E1", "registeredCount": 2 }],
        })
    );
}

#[tokio::test]
async fn invalid_event_forms_report_every_field() {
    let (_, schema) = seeded().await;

    let body = run(
        &schema,
        admin(),
        r#"mutation { createEvent(form: { title: "", description: "", location: "", date: "" }) { id } }"#,
    )
    .await;

    let fields = &body["errors"][0]["extensions"]["fieldErrors"];
    assert_eq!(fields.as_object().unwrap().len(), 4);
    assert_eq!(fields["title"], "Title is required");
    assert_eq!(fields["date"], "Date is required");
}

#[tokio::test]
async fn created_events_can_be_read_back() {
    let (_, schema) = seeded().await;

    let body = run(
        &schema,
        admin(),
        r#"mutation {
            createEvent(form: {
                title: "Career Fair 2025",
                description: "Meet employers",
                location: "Student Union",
                date: "2025-04-30T10:00:00Z",
                tags: ["Career", "Career"]
            }) { id title creditPoints tags registeredCount }
        }"#,
    )
    .await;

    let event = &body["data"]["createEvent"];
    assert_eq!(event["title"], "Career Fair 2025");
    assert_eq!(event["creditPoints"], 10);
    assert_eq!(event["tags"], json!(["Career"]));
    assert_eq!(event["registeredCount"], 0);

    let query = format!(r#"{{ event(id: {}) {{ title }} }}"#, event["id"]);
    let body = run(&schema, admin(), &query).await;
    assert_eq!(body["data"]["event"]["title"], "Career Fair 2025");
}

#[tokio::test]
async fn missing_events_are_null() {
    let (_, schema) = seeded().await;

    let body = run(&schema, admin(), r#"{ event(id: "missing") { id } }"#).await;

    assert_eq!(body["data"]["event"], Value::Null);
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn toggling_attendance_updates_the_student() {
    let (store, schema) = seeded().await;
    let toggle = |was_attended: bool| {
        format!(
            r#"mutation {{ toggleAttendance(eventId: "E1", studentId: "S1", wasAttended: {}) {{ attended creditPoints changed }} }}"#,
            was_attended
        )
    };

    let body = run(&schema, admin(), &toggle(false)).await;
    assert_eq!(
        body["data"]["toggleAttendance"],
        json!({ "attended": true, "creditPoints": 15, "changed": true })
    );

    let body = run(
        &schema,
        admin(),
        r#"{ event(id: "E1") { attendance { student { id fullName } attended } } }"#,
    )
    .await;
    assert_eq!(
        body["data"]["event"]["attendance"][0],
        json!({ "student": { "id": "S1", "fullName": "Student S1" }, "attended": true })
    );

    run(&schema, admin(), &toggle(true)).await;
    assert_eq!(balance(&store, "S1").await, 5);
}

#[tokio::test]
async fn redeeming_through_the_api() {
    let (store, schema) = seeded().await;
    seed_reward(&store, "R1", 4, 1).await;

    let body = run(
        &schema,
        admin(),
        r#"mutation { redeemReward(rewardId: "R1", studentId: "S1") { creditPoints quantityRemaining } }"#,
    )
    .await;
    assert_eq!(
        body["data"]["redeemReward"],
        json!({ "creditPoints": 1, "quantityRemaining": 0 })
    );

    let body = run(
        &schema,
        admin(),
        r#"{ reward(id: "R1") { quantity redemptions { id } } }"#,
    )
    .await;
    assert_eq!(
        body["data"]["reward"],
        json!({ "quantity": 0, "redemptions": [{ "id": "S1" }] })
    );
}

#[tokio::test]
async fn the_calendar_filters_by_tag() {
    let (_, schema) = seeded().await;

    let body = run(
        &schema,
        admin(),
        r#"{ calendar(date: "2025-05-02", tag: "Sport") { selectedDate tagFilter events { id } eventsOnDate { id } } }"#,
    )
    .await;

    assert_eq!(
        body["data"]["calendar"],
        json!({
            "selectedDate": "2025-05-02",
            "tagFilter": "Sport",
            "events": [],
            "eventsOnDate": [],
        })
    );
}

#[tokio::test]
async fn reward_subscriptions_see_new_rewards() {
    let (store, schema) = seeded().await;

    let mut stream =
        schema.execute_stream(Request::new("subscription { rewards { id } }").data(admin()));

    let first = serde_json::to_value(stream.next().await.unwrap()).unwrap();
    assert_eq!(first["data"]["rewards"], json!([]));

    seed_reward(&store, "R1", 10, 1).await;
    let second = serde_json::to_value(stream.next().await.unwrap()).unwrap();
    assert_eq!(second["data"]["rewards"], json!([{ "id": "R1" }]));
}

#[tokio::test]
async fn anonymous_subscribers_are_sent_to_sign_up() {
    let (_, schema) = seeded().await;

    for request in [
        Request::new("subscription { students { id email creditPoints } }")
            .data(Session::Anonymous),
        Request::new("subscription { students { id email creditPoints } }"),
    ] {
        let mut stream = schema.execute_stream(request);
        let body = serde_json::to_value(stream.next().await.unwrap()).unwrap();

        assert_eq!(body["data"], Value::Null);
        let error = &body["errors"][0];
        assert_eq!(error["message"], "Sign in required");
        assert_eq!(error["extensions"]["redirect"], "/signup");
    }
}

#[tokio::test]
async fn partial_event_edits_keep_points_and_tags() {
    let (store, schema) = seeded().await;
    seed_event(&store, "E2", 25, &[]).await;

    let body = run(
        &schema,
        admin(),
        r#"mutation { updateEvent(id: "E2", edit: { title: "Renamed" }) { title creditPoints tags } }"#,
    )
    .await;

    assert_eq!(
        body["data"]["updateEvent"],
        json!({ "title": "Renamed", "creditPoints": 25, "tags": ["Academic"] })
    );

    let body = run(
        &schema,
        admin(),
        r#"mutation { updateEvent(id: "E2", edit: { location: " " }) { id } }"#,
    )
    .await;
    assert_eq!(
        body["errors"][0]["extensions"]["fieldErrors"]["location"],
        "Location is required"
    );
}
