use async_graphql::SimpleObject;
use time::OffsetDateTime;

use crate::error::ConsoleResult;
use crate::models::event::Event;
use crate::models::session::AdminUser;
use crate::models::student::Student;
use crate::models::Entity;
use crate::store::Store;
use crate::util::{format_clock, greeting_for_hour};

/// How many upcoming events the overview pages list.
pub const UPCOMING_PREVIEW: usize = 3;

/// The admin overview: quick stats and the next few events.
#[derive(SimpleObject)]
pub struct Dashboard {
    /// The first name of the signed-in admin
    pub admin_name: String,
    pub total_events: i32,
    pub total_students: i32,
    /// How many events haven't happened yet
    pub upcoming_events: i32,
    /// The soonest upcoming events
    pub next_events: Vec<Event>,
}

impl Dashboard {
    pub async fn load(
        admin: &AdminUser,
        now: OffsetDateTime,
        store: &Store,
    ) -> ConsoleResult<Self> {
        let events = Event::all_by_date(store).await?;
        let students = Student::all(store).await?;
        let total_events = events.len();
        let upcoming = events
            .into_iter()
            .filter(|event| event.is_upcoming(now))
            .collect::<Vec<_>>();

        Ok(Self {
            admin_name: admin.first_name.clone(),
            total_events: count(total_events),
            total_students: count(students.len()),
            upcoming_events: count(upcoming.len()),
            next_events: upcoming.into_iter().take(UPCOMING_PREVIEW).collect(),
        })
    }
}

/// The staff landing page.
#[derive(SimpleObject)]
pub struct StaffHome {
    /// "Good Morning", "Good Afternoon" or "Good Evening"
    pub greeting: String,
    /// The current local time, e.g. "09:30 AM"
    pub time: String,
    pub upcoming_events: Vec<Event>,
}

impl StaffHome {
    pub async fn load(now: OffsetDateTime, limit: usize, store: &Store) -> ConsoleResult<Self> {
        Ok(Self {
            greeting: greeting_for_hour(now.hour()).to_owned(),
            time: format_clock(now),
            upcoming_events: Event::upcoming(now, limit, store).await?,
        })
    }
}

fn count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}
