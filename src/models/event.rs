use async_graphql::{ComplexObject, Context, InputObject, Result, SimpleObject};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{ConsoleError, ConsoleResult, FieldErrors};
use crate::graphql::IntoGql;
use crate::models::attendance::{AttendanceRecord, Attendee};
use crate::models::student::Student;
use crate::models::tags::TagList;
use crate::models::{decode_all, Entity};
use crate::store::{encode, Document, Store, Timestamp};
use crate::util::{format_long_date, parse_form_datetime};

#[derive(Debug, Clone, Default, Deserialize, SimpleObject)]
#[serde(default, rename_all = "camelCase")]
#[graphql(complex)]
pub struct Event {
    /// The ID of the event
    pub id: String,
    /// The name of the event
    pub title: String,
    /// General information or details about this event
    pub description: String,
    /// Where this event will be held
    pub location: String,
    /// When the event takes place
    pub date: Option<Timestamp>,
    /// How many credit points attending this event is worth
    pub credit_points: i64,
    pub tags: Vec<String>,
    /// The ids of the students registered for this event
    pub attendees: Vec<String>,
    pub created_at: Option<Timestamp>,
}

#[ComplexObject]
impl Event {
    /// The date of the event, e.g. "Wednesday, April 30, 2025"
    pub async fn formatted_date(&self) -> String {
        self.datetime().map(format_long_date).unwrap_or_default()
    }

    /// How many students are registered for this event
    pub async fn registered_count(&self) -> i32 {
        self.attendees.len() as i32
    }

    /// The registered students, with whether each one attended
    pub async fn attendance(&self, ctx: &Context<'_>) -> Result<Vec<Attendee>> {
        let store: &Store = ctx.data_unchecked();
        self.attendee_rows(store).await.gql()
    }
}

impl Entity for Event {
    const COLLECTION: &'static str = "events";
    const NAME: &'static str = "event";
}

impl Event {
    pub fn datetime(&self) -> Option<OffsetDateTime> {
        self.date.and_then(|date| date.to_datetime().ok())
    }

    pub fn is_upcoming(&self, now: OffsetDateTime) -> bool {
        self.datetime().map(|date| date > now).unwrap_or(false)
    }

    /// Orders events by date, undated events last.
    pub fn sort_by_date(events: &mut [Event]) {
        events.sort_by_key(|event| (event.date.is_none(), event.date));
    }

    pub async fn all_by_date(store: &Store) -> ConsoleResult<Vec<Self>> {
        let mut events = Self::all(store).await?;
        Self::sort_by_date(&mut events);

        Ok(events)
    }

    pub fn from_documents(documents: Vec<Document>) -> ConsoleResult<Vec<Self>> {
        let mut events = decode_all(documents)?;
        Self::sort_by_date(&mut events);

        Ok(events)
    }

    /// The soonest events after `now`.
    pub async fn upcoming(
        now: OffsetDateTime,
        limit: usize,
        store: &Store,
    ) -> ConsoleResult<Vec<Self>> {
        Ok(Self::all_by_date(store)
            .await?
            .into_iter()
            .filter(|event| event.is_upcoming(now))
            .take(limit)
            .collect())
    }

    pub async fn create(form: EventForm, store: &Store) -> ConsoleResult<String> {
        let fields = form.validate()?;
        let mut document = encode(&fields)?;
        document.insert("attendees".to_owned(), json!([]));
        document.insert("createdAt".to_owned(), json!(Timestamp::now()));

        let id = store.add(Self::COLLECTION, document).await.map_err(|err| {
            tracing::error!("Failed to create event {:?}: {}", fields.title, err);
            err
        })?;
        tracing::info!("Created event {} ({})", id, fields.title);

        Ok(id)
    }

    /// Applies the edit over the stored event. Fields left out of the edit
    /// keep their current values.
    pub async fn update(id: &str, edit: EventEdit, store: &Store) -> ConsoleResult<()> {
        let event = Self::with_id(id, store).await?;
        let fields = edit.over(&event).validate()?;

        store
            .update_fields(Self::COLLECTION, id, encode(&fields)?)
            .await
            .map_err(|err| {
                tracing::error!("Failed to update event {}: {}", id, err);
                err
            })
    }

    /// Adds the student to the event's attendee list. Registering twice
    /// changes nothing.
    pub async fn register_attendee(
        event_id: &str,
        student_id: &str,
        store: &Store,
    ) -> ConsoleResult<Self> {
        let mut transaction = store.begin().await?;
        let mut event = Self::locked(&mut *transaction, event_id).await?;
        Student::locked(&mut *transaction, student_id).await?;

        if !event.attendees.iter().any(|id| id == student_id) {
            event.attendees.push(student_id.to_owned());
            transaction
                .update_fields(
                    Self::COLLECTION,
                    event_id,
                    encode(&json!({ "attendees": event.attendees }))?,
                )
                .await?;
            transaction.commit().await?;
            tracing::info!("Registered student {} for event {}", student_id, event_id);
        }

        Ok(event)
    }

    /// Removes the student from the attendee list. Refused while the student
    /// holds credit for attending, since that credit would be orphaned.
    pub async fn unregister_attendee(
        event_id: &str,
        student_id: &str,
        store: &Store,
    ) -> ConsoleResult<Self> {
        let mut transaction = store.begin().await?;
        let mut event = Self::locked(&mut *transaction, event_id).await?;

        let record_id = AttendanceRecord::id_for(event_id, student_id);
        if let Some(record) = transaction
            .get(AttendanceRecord::COLLECTION, &record_id)
            .await?
        {
            if AttendanceRecord::decode(&record)?.attended {
                return Err(ConsoleError::AttendanceCredited {
                    event: event_id.to_owned(),
                    student: student_id.to_owned(),
                });
            }
        }

        let before = event.attendees.len();
        event.attendees.retain(|id| id != student_id);
        if event.attendees.len() != before {
            transaction
                .update_fields(
                    Self::COLLECTION,
                    event_id,
                    encode(&json!({ "attendees": event.attendees }))?,
                )
                .await?;
            transaction.commit().await?;
            tracing::info!("Unregistered student {} from event {}", student_id, event_id);
        }

        Ok(event)
    }

    /// Every registered student that still exists, with their persisted
    /// attendance.
    pub async fn attendee_rows(&self, store: &Store) -> ConsoleResult<Vec<Attendee>> {
        let records = AttendanceRecord::for_event(&self.id, store).await?;
        let students = Student::with_ids(&self.attendees, store).await?;

        Ok(students
            .into_iter()
            .map(|student| {
                let record = records
                    .iter()
                    .find(|record| record.student_id == student.id);
                Attendee {
                    attended: record.map(|r| r.attended).unwrap_or(false),
                    credited_at: record.and_then(|r| r.credited_at),
                    student,
                }
            })
            .collect())
    }
}

/// The event form, shared by creation and editing.
#[derive(Debug, Clone, InputObject)]
pub struct EventForm {
    pub title: String,
    pub description: String,
    pub location: String,
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM`, or an RFC 3339 timestamp
    pub date: String,
    #[graphql(default = 10)]
    pub credit_points: i64,
    #[graphql(default)]
    pub tags: Vec<String>,
}

/// Changes to an existing event. Absent fields are left as they are.
#[derive(Debug, Clone, Default, InputObject)]
pub struct EventEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub credit_points: Option<i64>,
    pub tags: Option<Vec<String>>,
}

impl EventEdit {
    /// The full form this edit produces for `event`.
    pub fn over(self, event: &Event) -> EventForm {
        EventForm {
            title: self.title.unwrap_or_else(|| event.title.clone()),
            description: self.description.unwrap_or_else(|| event.description.clone()),
            location: self.location.unwrap_or_else(|| event.location.clone()),
            date: self.date.unwrap_or_else(|| {
                event
                    .datetime()
                    .and_then(|date| date.format(&Rfc3339).ok())
                    .unwrap_or_default()
            }),
            credit_points: self.credit_points.unwrap_or(event.credit_points),
            tags: self.tags.unwrap_or_else(|| event.tags.clone()),
        }
    }
}

/// The stored fields of a valid event form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFields {
    pub title: String,
    pub description: String,
    pub location: String,
    pub date: Timestamp,
    pub credit_points: i64,
    pub tags: TagList,
}

impl EventForm {
    /// Checks every field at once, so all problems are reported together.
    pub fn validate(&self) -> ConsoleResult<EventFields> {
        let mut errors = FieldErrors::new();

        if self.title.trim().is_empty() {
            errors.add("title", "Title is required");
        }
        if self.description.trim().is_empty() {
            errors.add("description", "Description is required");
        }
        if self.location.trim().is_empty() {
            errors.add("location", "Location is required");
        }
        let date = if self.date.trim().is_empty() {
            errors.add("date", "Date is required");
            None
        } else {
            match parse_form_datetime(&self.date) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("date", "Date is invalid");
                    None
                }
            }
        };
        if self.credit_points < 0 {
            errors.add("creditPoints", "Credit points cannot be negative");
        }

        match date {
            Some(date) if errors.is_empty() => Ok(EventFields {
                title: self.title.trim().to_owned(),
                description: self.description.trim().to_owned(),
                location: self.location.trim().to_owned(),
                date: Timestamp::from(date),
                credit_points: self.credit_points,
                tags: self.tags.iter().collect(),
            }),
            _ => Err(ConsoleError::Validation(errors)),
        }
    }
}
