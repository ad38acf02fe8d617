use async_graphql::{ErrorExtensions, Schema};

use crate::error::ConsoleResult;
use crate::graphql::mutation::MutationRoot;
use crate::graphql::query::QueryRoot;
use crate::graphql::subscription::SubscriptionRoot;
use crate::store::Store;

pub mod guards;
pub mod mutation;
pub mod query;
pub mod subscription;

pub type ConsoleSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

/// Builds the schema against the given store. The request's
/// [`Session`](crate::models::session::Session) is attached per request.
pub fn build_schema(store: Store) -> ConsoleSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(store)
        .finish()
}

/// Converts console errors into GraphQL errors, keeping their extensions.
pub trait IntoGql<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> IntoGql<T> for ConsoleResult<T> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|err| err.extend())
    }
}
