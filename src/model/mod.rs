//! Cacheable data model: credentials, user records, and authentication results.

pub mod credential;
pub mod result;
pub mod user_record;

pub use credential::Credential;
pub use result::{AuthenticationResult, CacheTier};
pub use user_record::{HashAlgorithm, LockoutInfo, RiskLevel, UserRecord, UserStatus};
