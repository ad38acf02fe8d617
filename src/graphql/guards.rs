use async_graphql::{Context, ErrorExtensions, Guard, Result};

use crate::error::ConsoleError;
use crate::models::session::{AdminUser, Session};

/// Only lets signed-in admins through. Everyone else is told to sign up.
pub struct AdminOnly;

#[async_trait::async_trait]
impl Guard for AdminOnly {
    async fn check(&self, ctx: &Context<'_>) -> Result<()> {
        current_admin(ctx).map(|_| ())
    }
}

/// The signed-in admin for this request.
pub fn current_admin<'c>(ctx: &Context<'c>) -> Result<&'c AdminUser> {
    match ctx.data_opt::<Session>() {
        Some(session) => session.require_admin().map_err(|err| err.extend()),
        None => Err(ConsoleError::SessionRequired.extend()),
    }
}
