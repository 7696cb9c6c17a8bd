//! Domain entities - the core business objects.

mod post;
mod query;
mod token;
mod user;

pub use post::{Post, PostChanges};
pub use query::{Page, PostQuery};
pub use token::TokenPayload;
pub use user::{User, UserChanges, UserPatch};
