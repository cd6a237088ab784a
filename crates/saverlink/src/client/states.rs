//! Type-state markers for the client's login state.

/// Marker type for a client that has not logged in.
///
/// In this state, only login is possible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// Marker type for a logged-in client.
///
/// In this state, accounts and exports are available.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;
