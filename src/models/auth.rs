//! Request bodies for password-based authentication
//!
//! Field validation happens in the form layer before these are built; the
//! types here only describe what the backend accepts.

use serde::Serialize;
use std::fmt;

/// Password login request body
#[derive(Serialize, Clone)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// Account registration request body
#[derive(Serialize, Clone)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for Signup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signup")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("mobile", &self.mobile)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_prints_password() {
        let login = Login {
            email: "a@x.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{login:?}");
        assert!(rendered.contains("a@x.com"));
        assert!(!rendered.contains("hunter2"));
    }
}
