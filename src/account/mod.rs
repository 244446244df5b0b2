//! Account module - Backend client, sessions, auth, premium status and checkout

pub mod auth;
pub mod checkout;
pub mod client;
pub mod premium;
pub mod session;

pub use auth::AuthService;
pub use checkout::{BackendCheckout, CheckoutGateway, CheckoutOutcome};
pub use client::{BackendClient, FunctionResponse, HttpBackendClient};
pub use premium::{PremiumService, PremiumState, PremiumStatus};
pub use session::{AuthState, Session, SessionStore, User};
