//! Route builders: the configurable CRUD router, its ownership-authorized
//! variant, and the common service routes.

pub mod common;
pub mod crud;
pub mod owned;

pub use common::{common_routes, common_routes_with_ready};
pub use crud::{CrudContext, CrudOp, CrudRouter, RouteEntry, RouteFlags};
pub use owned::{Authenticated, OwnedContext, OwnedCrudRouter, OwnedRouterOptions};
