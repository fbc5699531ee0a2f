//! Secret lookup
//!
//! Secrets come either straight from an environment variable or, for
//! container setups, from a file whose path is in `<NAME>_FILE`.

use crate::error::PoolError;
use std::env;
use std::path::PathBuf;

/// Read the secret `name` from `$name`, falling back to the file in `$name_FILE`
///
/// Surrounding whitespace is stripped; an empty result counts as missing.
pub fn api_key(name: &str) -> Result<String, PoolError> {
    let mut key = env::var(name).unwrap_or_default();

    if key.trim().is_empty() {
        if let Ok(path) = env::var(format!("{}_FILE", name)) {
            let path = PathBuf::from(path);
            key = std::fs::read_to_string(&path)
                .map_err(|source| PoolError::Io { path, source })?;
        }
    }

    let key = key.trim();
    if key.is_empty() {
        return Err(PoolError::MissingSecret(name.to_string()));
    }

    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_api_key_from_env() {
        env::set_var("CLIENT_POOL_TEST_SECRET_ENV", "abc123\n");
        assert_eq!(api_key("CLIENT_POOL_TEST_SECRET_ENV").unwrap(), "abc123");
    }

    #[test]
    fn test_api_key_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  from-file  ").unwrap();
        env::set_var("CLIENT_POOL_TEST_SECRET_FILE_FILE", file.path());

        assert_eq!(api_key("CLIENT_POOL_TEST_SECRET_FILE").unwrap(), "from-file");
    }

    #[test]
    fn test_env_takes_precedence_over_file() {
        env::set_var("CLIENT_POOL_TEST_SECRET_BOTH", "from-env");
        env::set_var("CLIENT_POOL_TEST_SECRET_BOTH_FILE", "/nonexistent/secret");
        assert_eq!(api_key("CLIENT_POOL_TEST_SECRET_BOTH").unwrap(), "from-env");
    }

    #[test]
    fn test_missing_api_key() {
        let err = api_key("CLIENT_POOL_TEST_SECRET_MISSING").unwrap_err();
        assert!(matches!(err, PoolError::MissingSecret(ref name) if name == "CLIENT_POOL_TEST_SECRET_MISSING"));
    }

    #[test]
    fn test_unreadable_secret_file() {
        env::set_var("CLIENT_POOL_TEST_SECRET_BAD_FILE", "/nonexistent/secret");
        let err = api_key("CLIENT_POOL_TEST_SECRET_BAD").unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }
}
