//! Attendance marking and the credit adjustments that go with it.
//!
//! Each (event, student) pair has at most one attendance record. The record
//! remembers how many points were credited, so marking is idempotent across
//! reloads and unmarking takes back exactly what was awarded. The student's
//! balance and the record are written in one store transaction.

use async_graphql::SimpleObject;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ConsoleError, ConsoleResult};
use crate::models::event::Event;
use crate::models::student::Student;
use crate::models::{decode_all, Entity};
use crate::store::{encode, Store, Timestamp};

/// A change in a student's attendance at one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditTransition {
    Mark,
    Unmark,
}

impl CreditTransition {
    /// The new balance after applying `points` for this transition. Balances
    /// never drop below zero.
    pub fn apply(self, balance: i64, points: i64) -> i64 {
        let points = points.max(0);
        match self {
            Self::Mark => balance.saturating_add(points),
            Self::Unmark => balance.saturating_sub(points).max(0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(skip_serializing)]
    pub id: String,
    pub event_id: String,
    pub student_id: String,
    pub attended: bool,
    /// The points awarded when attendance was marked; zero while unmarked
    pub credited_points: i64,
    pub credited_at: Option<Timestamp>,
}

impl Entity for AttendanceRecord {
    const COLLECTION: &'static str = "attendance";
    const NAME: &'static str = "attendance record";
}

impl AttendanceRecord {
    pub fn id_for(event_id: &str, student_id: &str) -> String {
        format!("{}_{}", event_id, student_id)
    }

    pub async fn for_event(event_id: &str, store: &Store) -> ConsoleResult<Vec<Self>> {
        decode_all(
            store
                .query(Self::COLLECTION, "eventId", &json!(event_id))
                .await?,
        )
    }
}

/// A registered student as shown on the event page.
#[derive(SimpleObject)]
pub struct Attendee {
    pub student: Student,
    /// Whether the student has been marked as attending
    pub attended: bool,
    /// When the student was credited for attending
    pub credited_at: Option<Timestamp>,
}

/// The committed result of an attendance change.
#[derive(Debug, Clone, PartialEq, Eq, SimpleObject)]
pub struct AttendanceOutcome {
    pub event_id: String,
    pub student_id: String,
    /// Whether the student is now marked as attending
    pub attended: bool,
    /// The student's balance after the change
    pub credit_points: i64,
    /// How much the balance moved
    pub delta: i64,
    /// False if the student was already in the requested state
    pub changed: bool,
}

pub struct Attendance;

impl Attendance {
    /// Flips attendance from `was_attended`.
    pub async fn toggle(
        event_id: &str,
        student_id: &str,
        was_attended: bool,
        store: &Store,
    ) -> ConsoleResult<AttendanceOutcome> {
        Self::set(event_id, student_id, !was_attended, store).await
    }

    /// Marks or unmarks a student's attendance and adjusts their credit
    /// balance to match. Asking for the state the student is already in
    /// changes nothing.
    pub async fn set(
        event_id: &str,
        student_id: &str,
        attended: bool,
        store: &Store,
    ) -> ConsoleResult<AttendanceOutcome> {
        let outcome = Self::set_in_transaction(event_id, student_id, attended, store).await;

        match &outcome {
            Ok(outcome) if outcome.changed => tracing::info!(
                "Set attendance of student {} at event {} to {} ({:+} points, balance {})",
                student_id,
                event_id,
                attended,
                outcome.delta,
                outcome.credit_points
            ),
            Ok(_) => {}
            Err(err) => tracing::error!(
                "Failed to set attendance of student {} at event {}: {}",
                student_id,
                event_id,
                err
            ),
        }

        outcome
    }

    async fn set_in_transaction(
        event_id: &str,
        student_id: &str,
        attended: bool,
        store: &Store,
    ) -> ConsoleResult<AttendanceOutcome> {
        let mut transaction = store.begin().await?;
        let event = Event::locked(&mut *transaction, event_id).await?;
        let student = Student::locked(&mut *transaction, student_id).await?;

        if !event.attendees.iter().any(|id| id == student_id) {
            return Err(ConsoleError::NotRegistered {
                event: event_id.to_owned(),
                student: student_id.to_owned(),
            });
        }

        let record_id = AttendanceRecord::id_for(event_id, student_id);
        let record = match transaction
            .get(AttendanceRecord::COLLECTION, &record_id)
            .await?
        {
            Some(document) => AttendanceRecord::decode(&document)?,
            None => AttendanceRecord {
                id: record_id.clone(),
                event_id: event_id.to_owned(),
                student_id: student_id.to_owned(),
                ..AttendanceRecord::default()
            },
        };

        let mut outcome = AttendanceOutcome {
            event_id: event_id.to_owned(),
            student_id: student_id.to_owned(),
            attended,
            credit_points: student.credit_points,
            delta: 0,
            changed: false,
        };
        if record.attended == attended {
            return Ok(outcome);
        }

        let (transition, points, updated) = if attended {
            let points = event.credit_points.max(0);
            let updated = AttendanceRecord {
                attended: true,
                credited_points: points,
                credited_at: Some(Timestamp::now()),
                ..record
            };
            (CreditTransition::Mark, points, updated)
        } else {
            let updated = AttendanceRecord {
                attended: false,
                credited_points: 0,
                credited_at: None,
                ..record.clone()
            };
            (CreditTransition::Unmark, record.credited_points, updated)
        };

        let balance = transition.apply(student.credit_points, points);
        transaction
            .update_fields(
                Student::COLLECTION,
                student_id,
                encode(&json!({ "creditPoints": balance }))?,
            )
            .await?;
        transaction
            .set(AttendanceRecord::COLLECTION, &record_id, encode(&updated)?)
            .await?;
        transaction.commit().await?;

        outcome.credit_points = balance;
        outcome.delta = balance - student.credit_points;
        outcome.changed = true;

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marking_adds_the_event_points() {
        assert_eq!(CreditTransition::Mark.apply(5, 10), 15);
        assert_eq!(CreditTransition::Mark.apply(0, 0), 0);
    }

    #[test]
    fn unmarking_returns_to_the_previous_balance() {
        let marked = CreditTransition::Mark.apply(5, 10);
        assert_eq!(CreditTransition::Unmark.apply(marked, 10), 5);
    }

    #[test]
    fn unmarking_clamps_at_zero() {
        assert_eq!(CreditTransition::Unmark.apply(3, 10), 0);
        for balance in 0..10 {
            assert_eq!(CreditTransition::Unmark.apply(balance, 10), 0);
        }
    }

    #[test]
    fn negative_points_never_move_the_balance() {
        assert_eq!(CreditTransition::Mark.apply(5, -10), 5);
        assert_eq!(CreditTransition::Unmark.apply(5, -10), 5);
    }

    #[test]
    fn record_ids_pair_event_and_student() {
        assert_eq!(AttendanceRecord::id_for("E1", "S1"), "E1_S1");
    }
}
