//! Session module
//!
//! Everything after the profile is known: the backend login call, the local
//! record of the logged-in user and the reconciler tying both to feedback.
//!
//! # Modules
//!
//! - [`backend`] - Application backend API (federated login, password login, registration)
//! - [`store`] - Key/value session storage and the `user` record helpers
//! - [`reconciler`] - Outcome handling for backend login answers

pub mod backend;
pub mod reconciler;
pub mod store;

pub use backend::{AuthBackend, AuthResponse, BackendError, FederatedLoginRequest, HttpAuthBackend};
pub use reconciler::{ReconcileError, SessionReconciler, LOGIN_SUCCESS_MESSAGE};
pub use store::{
    current_user, is_logged_in, logout, persist_user, FileStore, MemoryStore, SessionStore,
    StoreError,
};
