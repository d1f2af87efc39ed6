//! Client SDK for the Themis legal-assistant API.
//!
//! [`HttpTransport`] talks to a running server; [`ThemisClient`] adds typed
//! calls on top; [`ChatSession`] drives a streamed chat transcript and
//! [`Workspace`] holds the whole client state.

pub mod analysis;
pub mod api;
pub mod error;
pub mod input;
pub mod prefs;
pub mod session;
pub mod transport;
pub mod workspace;

pub use api::ThemisClient;
pub use error::{ClientError, Result};
pub use session::{AbortHandle, ChatSession, TurnOutcome};
pub use transport::{ClientConfig, FragmentStream, HttpTransport, Transport};
pub use workspace::Workspace;
