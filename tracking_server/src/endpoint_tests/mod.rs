//! HTTP endpoint tests against a mocked backend. These cover the authentication and
//! authorization surface of the routes; the engine's own behaviour is tested in the engine crate
//! against a real database.

pub(crate) mod helpers;
pub(crate) mod mocks;
mod tracking;
