use async_graphql::{Context, Object, Result};

use crate::graphql::guards::{current_admin, AdminOnly};
use crate::graphql::IntoGql;
use crate::models::calendar::Calendar;
use crate::models::dashboard::{Dashboard, StaffHome, UPCOMING_PREVIEW};
use crate::models::event::Event;
use crate::models::reward::Reward;
use crate::models::session::{AdminUser, Session};
use crate::models::student::Student;
use crate::models::Entity;
use crate::store::Store;
use crate::util::{current_time, local_offset, parse_iso_date};

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in admin, if any
    pub async fn session(&self, ctx: &Context<'_>) -> Option<AdminUser> {
        ctx.data_opt::<Session>()
            .and_then(Session::admin)
            .cloned()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn dashboard(&self, ctx: &Context<'_>) -> Result<Dashboard> {
        let store: &Store = ctx.data_unchecked();
        let admin = current_admin(ctx)?;
        Dashboard::load(admin, current_time(), store).await.gql()
    }

    /// Every event, soonest first
    #[graphql(guard = "AdminOnly")]
    pub async fn events(&self, ctx: &Context<'_>) -> Result<Vec<Event>> {
        let store: &Store = ctx.data_unchecked();
        Event::all_by_date(store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn event(&self, ctx: &Context<'_>, id: String) -> Result<Option<Event>> {
        let store: &Store = ctx.data_unchecked();
        Event::with_id_opt(&id, store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn rewards(&self, ctx: &Context<'_>) -> Result<Vec<Reward>> {
        let store: &Store = ctx.data_unchecked();
        Reward::all(store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn reward(&self, ctx: &Context<'_>, id: String) -> Result<Option<Reward>> {
        let store: &Store = ctx.data_unchecked();
        Reward::with_id_opt(&id, store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn students(&self, ctx: &Context<'_>) -> Result<Vec<Student>> {
        let store: &Store = ctx.data_unchecked();
        Student::all(store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn student(&self, ctx: &Context<'_>, id: String) -> Result<Option<Student>> {
        let store: &Store = ctx.data_unchecked();
        Student::with_id_opt(&id, store).await.gql()
    }

    #[graphql(guard = "AdminOnly")]
    pub async fn staff_home(
        &self,
        ctx: &Context<'_>,
        #[graphql(default = 3)] limit: i32,
    ) -> Result<StaffHome> {
        let store: &Store = ctx.data_unchecked();
        let limit = usize::try_from(limit).unwrap_or(UPCOMING_PREVIEW);
        StaffHome::load(current_time(), limit, store).await.gql()
    }

    /// The event calendar for one day, defaulting to today. `tag` narrows
    /// every list to events carrying that tag.
    #[graphql(guard = "AdminOnly")]
    pub async fn calendar(
        &self,
        ctx: &Context<'_>,
        date: Option<String>,
        tag: Option<String>,
    ) -> Result<Calendar> {
        let store: &Store = ctx.data_unchecked();
        let selected = match date.as_deref().map(str::trim) {
            None | Some("") => current_time().to_offset(local_offset()).date(),
            Some(raw) => parse_iso_date(raw).gql()?,
        };
        let events = Event::all_by_date(store).await.gql()?;

        Ok(Calendar::build(events, selected, tag.as_deref()))
    }
}
