use async_graphql::{Context, Result, Subscription};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use crate::error::ConsoleResult;
use crate::graphql::guards::AdminOnly;
use crate::graphql::IntoGql;
use crate::models::event::Event;
use crate::models::reward::Reward;
use crate::models::student::Student;
use crate::models::{decode_all, Entity};
use crate::store::{Document, Store};

pub struct SubscriptionRoot;

/// Live views of whole collections. Each subscription starts with the
/// current contents and yields again after every change.
#[Subscription]
impl SubscriptionRoot {
    /// Every event, soonest first
    #[graphql(guard = "AdminOnly")]
    async fn events(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Result<Vec<Event>>>> {
        watch(ctx, Event::COLLECTION, Event::from_documents).await
    }

    #[graphql(guard = "AdminOnly")]
    async fn rewards(&self, ctx: &Context<'_>) -> Result<impl Stream<Item = Result<Vec<Reward>>>> {
        watch(ctx, Reward::COLLECTION, decode_all::<Reward>).await
    }

    #[graphql(guard = "AdminOnly")]
    async fn students(
        &self,
        ctx: &Context<'_>,
    ) -> Result<impl Stream<Item = Result<Vec<Student>>>> {
        watch(ctx, Student::COLLECTION, decode_all::<Student>).await
    }
}

async fn watch<T, F>(
    ctx: &Context<'_>,
    collection: &'static str,
    decode: F,
) -> Result<BoxStream<'static, Result<Vec<T>>>>
where
    T: Send + 'static,
    F: Fn(Vec<Document>) -> ConsoleResult<Vec<T>> + Send + 'static,
{
    let store: &Store = ctx.data_unchecked();
    let subscription = store.subscribe(collection).await.gql()?;
    tracing::debug!("Opened a subscription to {}", collection);

    Ok(subscription
        .into_stream()
        .map(move |snapshot| snapshot.and_then(&decode).gql())
        .boxed())
}
