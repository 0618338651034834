//! Form validation run before any collaborator call.

use crate::{Gender, ValidationError};

/// Minimum password length in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Validate an email address shape.
///
/// This is a format check only (one `@`, a dotted domain, no whitespace);
/// deliverability is the provider's business.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }

    let (local, domain) = email.split_once('@').ok_or(ValidationError::InvalidEmail)?;
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::InvalidEmail);
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

/// Result of the five independent password strength checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordChecks {
    pub length: bool,
    pub upper: bool,
    pub lower: bool,
    pub digit: bool,
    pub symbol: bool,
}

impl PasswordChecks {
    /// Evaluate every check for `password`.
    pub fn evaluate(password: &str) -> Self {
        Self {
            length: password.chars().count() >= MIN_PASSWORD_LEN,
            upper: password.chars().any(char::is_uppercase),
            lower: password.chars().any(char::is_lowercase),
            digit: password.chars().any(|c| c.is_ascii_digit()),
            symbol: password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
        }
    }

    /// True when all five checks pass.
    pub fn all_pass(&self) -> bool {
        self.first_failure().is_none()
    }

    /// The first failing check, in display order.
    pub fn first_failure(&self) -> Option<ValidationError> {
        if !self.length {
            Some(ValidationError::PasswordTooShort)
        } else if !self.upper {
            Some(ValidationError::PasswordMissingUppercase)
        } else if !self.lower {
            Some(ValidationError::PasswordMissingLowercase)
        } else if !self.digit {
            Some(ValidationError::PasswordMissingDigit)
        } else if !self.symbol {
            Some(ValidationError::PasswordMissingSymbol)
        } else {
            None
        }
    }
}

/// Fields collected by the sign-up form.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub display_name: String,
    /// `None` until the user picks one.
    pub gender: Option<Gender>,
}

impl std::fmt::Debug for SignUpForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpForm")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("gender", &self.gender)
            .finish_non_exhaustive()
    }
}

/// Sign-up fields after validation.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidSignUp {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub gender: Gender,
}

impl std::fmt::Debug for ValidSignUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidSignUp")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("gender", &self.gender)
            .finish_non_exhaustive()
    }
}

impl SignUpForm {
    /// Validate in form order and return the first problem found.
    pub fn validate(&self) -> Result<ValidSignUp, ValidationError> {
        validate_email(&self.email)?;

        if let Some(failure) = PasswordChecks::evaluate(&self.password).first_failure() {
            return Err(failure);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }

        let display_name = self.display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::MissingDisplayName);
        }

        let gender = self.gender.ok_or(ValidationError::MissingGender)?;

        Ok(ValidSignUp {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            display_name: display_name.to_string(),
            gender,
        })
    }
}

/// Validate sign-in fields: a well-formed email and a non-empty password.
pub fn validate_sign_in(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    Ok(())
}
