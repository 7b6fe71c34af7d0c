//! Authentication: credentials, tokens, second factor and the login flow.

pub mod attempts;
pub mod codes;
pub mod password;
pub mod service;
pub mod token;
pub mod totp;

pub use attempts::AttemptTracker;
pub use codes::CodeStore;
pub use password::CredentialHasher;
pub use service::{
    AuthService, ConfirmTwoFactorRequest, ForgotPasswordRequest, LoginOutcome, LoginRequest,
    RegisterRequest, ResetPasswordRequest, SessionGrant, SessionUser, VerifyEmailRequest,
    VerifyTwoFactorRequest,
};
pub use token::{Claims, TokenError, TokenPurpose, TokenSigner};
