use thiserror::Error;

pub const MAX_PREVIEW_CHARS: usize = 100;

/// A request rejected before it reached the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Invalid(pub String);

impl Invalid {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

pub fn required(field: &str, value: &str) -> Result<String, Invalid> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Invalid(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn name(value: &str) -> Result<String, Invalid> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if !(2..=50).contains(&len) {
        return Err(Invalid::new("name must be between 2 and 50 characters"));
    }
    Ok(trimmed.to_string())
}

pub fn email(value: &str) -> Result<String, Invalid> {
    let lowered = value.trim().to_lowercase();
    let valid = match lowered.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !lowered.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Invalid(format!("{} is not a valid email", value.trim())));
    }
    Ok(lowered)
}

pub fn password(value: &str) -> Result<(), Invalid> {
    if value.chars().count() < 6 {
        return Err(Invalid::new("password must be at least 6 characters"));
    }
    Ok(())
}

pub fn pincode(value: &str) -> Result<String, Invalid> {
    let trimmed = value.trim();
    if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(Invalid::new("pincode must be 6 digits"));
    }
    Ok(trimmed.to_string())
}

/// Cuts to at most `MAX_PREVIEW_CHARS` characters, appending `...` when cut.
pub fn preview(content: &str) -> String {
    if content.chars().count() <= MAX_PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(MAX_PREVIEW_CHARS - 3).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_is_lowercased() {
        assert_eq!(email("  Asha@Example.EDU ").unwrap(), "asha@example.edu");
    }

    #[test]
    fn test_email_rejects_garbage() {
        for bad in ["", "asha", "asha@", "@example.com", "a@b", "a b@c.com", "a@@b.com"] {
            assert!(email(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_name_bounds() {
        assert!(name("A").is_err());
        assert!(name("Al").is_ok());
        assert!(name(&"x".repeat(51)).is_err());
        assert_eq!(name("  Ravi  ").unwrap(), "Ravi");
    }

    #[test]
    fn test_pincode() {
        assert!(pincode("560001").is_ok());
        assert!(pincode("56001").is_err());
        assert!(pincode("56000a").is_err());
    }

    #[test]
    fn test_preview_truncates_to_limit() {
        let long = "é".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), MAX_PREVIEW_CHARS);
        assert!(cut.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }
}
