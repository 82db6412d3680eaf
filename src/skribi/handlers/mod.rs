pub mod health;
pub use self::health::health;

pub mod root;
pub use self::root::root;

pub mod user_register;
pub use self::user_register::createuser;

pub mod user_login;
pub use self::user_login::login;

pub mod user_data;
pub use self::user_data::getuserdata;

pub mod blog;

// common functions for the handlers
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// One failed field check, in the wire shape deployed clients parse.
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldError {
    pub msg: String,
    pub param: String,
}

impl FieldError {
    #[must_use]
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            param: param.to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(valid_email("a@x.com"));
        assert!(valid_email("first.last@sub.example.org"));
        assert!(!valid_email("a@x"));
        assert!(!valid_email("not an email"));
        assert!(!valid_email(""));
    }
}
