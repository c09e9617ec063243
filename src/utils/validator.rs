use validator::ValidationError;

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let fail = |code: &'static str, message: &'static str| {
        Err(ValidationError::new(code).with_message(message.into()))
    };

    if password.len() < 8 {
        return fail("password_too_short", "must be at least 8 characters");
    }
    if password.len() > 128 {
        return fail("password_too_long", "must be at most 128 characters");
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return fail("password_needs_uppercase", "needs an uppercase letter");
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return fail("password_needs_lowercase", "needs a lowercase letter");
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return fail("password_needs_number", "needs a digit");
    }

    Ok(())
}

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("must not be blank".into()));
    }
    Ok(())
}
