//! Bundled demo site.
//!
//! ```text
//! /                     home
//! /(marketing)/about    about (served at /about)
//! /users/[id]           user profile with server data
//! /docs/[...slug]       documentation, any depth
//! POST /api/users/rename  rename a user, invalidating their profile
//! ```

pub mod docs;
pub mod home;
pub mod layout;
pub mod users;

use std::sync::Arc;

use crate::http::action::ActionRegistry;
use crate::routing::{RouteError, RouterBuilder};

/// Register every demo page, layout and action.
pub fn register(builder: &mut RouterBuilder, actions: &mut ActionRegistry) -> Result<(), RouteError> {
    let directory = Arc::new(users::UserDirectory::with_samples());

    builder
        .layout("/", Arc::new(layout::SiteLayout))?
        .page("/", Arc::new(home::HomePage))?
        .page("/(marketing)/about", Arc::new(home::AboutPage))?
        .layout("/users", Arc::new(users::UsersLayout))?
        .page("/users/[id]", Arc::new(users::UserPage::new(directory.clone())))?
        .page("/docs/[...slug]", Arc::new(docs::DocsPage))?;

    actions.register("/api/users/rename", Arc::new(users::RenameUser::new(directory)));
    Ok(())
}
