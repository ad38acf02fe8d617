use async_graphql::{Context, Object, Result};

use crate::graphql::guards::AdminOnly;
use crate::graphql::IntoGql;
use crate::models::attendance::{Attendance, AttendanceOutcome};
use crate::models::event::{Event, EventEdit, EventForm};
use crate::models::reward::{Redemption, Reward, RewardEdit, RewardForm};
use crate::models::Entity;
use crate::store::Store;

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Creates a new event with an empty attendee list
    #[graphql(guard = "AdminOnly")]
    pub async fn create_event(&self, ctx: &Context<'_>, form: EventForm) -> Result<Event> {
        let store: &Store = ctx.data_unchecked();
        let id = Event::create(form, store).await.gql()?;
        Event::with_id(&id, store).await.gql()
    }

    /// Updates an event's details. Attendees, and any field left out of the
    /// edit, are left alone.
    #[graphql(guard = "AdminOnly")]
    pub async fn update_event(
        &self,
        ctx: &Context<'_>,
        id: String,
        edit: EventEdit,
    ) -> Result<Event> {
        let store: &Store = ctx.data_unchecked();
        Event::update(&id, edit, store).await.gql()?;
        Event::with_id(&id, store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn register_attendee(
        &self,
        ctx: &Context<'_>,
        event_id: String,
        student_id: String,
    ) -> Result<Event> {
        let store: &Store = ctx.data_unchecked();
        Event::register_attendee(&event_id, &student_id, store)
            .await
            .gql()
    }

    /// Fails while the student is marked as attending
    #[graphql(guard = "AdminOnly")]
    pub async fn unregister_attendee(
        &self,
        ctx: &Context<'_>,
        event_id: String,
        student_id: String,
    ) -> Result<Event> {
        let store: &Store = ctx.data_unchecked();
        Event::unregister_attendee(&event_id, &student_id, store)
            .await
            .gql()
    }

    /// Marks or unmarks a registered student as attending, crediting or
    /// debiting their balance. Repeating a request changes nothing.
    #[graphql(guard = "AdminOnly")]
    pub async fn set_attendance(
        &self,
        ctx: &Context<'_>,
        event_id: String,
        student_id: String,
        attended: bool,
    ) -> Result<AttendanceOutcome> {
        let store: &Store = ctx.data_unchecked();
        Attendance::set(&event_id, &student_id, attended, store)
            .await
            .gql()
    }

    /// Flips attendance away from `wasAttended`
    #[graphql(guard = "AdminOnly")]
    pub async fn toggle_attendance(
        &self,
        ctx: &Context<'_>,
        event_id: String,
        student_id: String,
        was_attended: bool,
    ) -> Result<AttendanceOutcome> {
        let store: &Store = ctx.data_unchecked();
        Attendance::toggle(&event_id, &student_id, was_attended, store)
            .await
            .gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn create_reward(&self, ctx: &Context<'_>, form: RewardForm) -> Result<Reward> {
        let store: &Store = ctx.data_unchecked();
        let id = Reward::create(form, store).await.gql()?;
        Reward::with_id(&id, store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn update_reward(
        &self,
        ctx: &Context<'_>,
        id: String,
        edit: RewardEdit,
    ) -> Result<Reward> {
        let store: &Store = ctx.data_unchecked();
        Reward::update(&id, edit, store).await.gql()?;
        Reward::with_id(&id, store).await.gql()
    }

    /// Deletes a reward, returning its id
    #[graphql(guard = "AdminOnly")]
    pub async fn delete_reward(&self, ctx: &Context<'_>, id: String) -> Result<String> {
        let store: &Store = ctx.data_unchecked();
        Reward::delete(&id, store).await.gql()?;

        Ok(id)
    }

    /// Spends a student's points on a reward
    #[graphql(guard = "AdminOnly")]
    pub async fn redeem_reward(
        &self,
        ctx: &Context<'_>,
        reward_id: String,
        student_id: String,
    ) -> Result<Redemption> {
        let store: &Store = ctx.data_unchecked();
        Reward::redeem(&reward_id, &student_id, store).await.gql()
    }
}
