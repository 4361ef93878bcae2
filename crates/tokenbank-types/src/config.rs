//! Configuration helpers shared by the token bank crates.
//!
//! Config files are JSON. Secrets such as the signer key should not be written
//! into them directly, so any field typed as [`LiteralOrEnv`] may instead name an
//! environment variable:
//!
//! ```json
//! {
//!   "rpc": [{ "http": "https://ethereum-sepolia-rpc.publicnode.com" }],
//!   "signer": "$TOKENBANK_PRIVATE_KEY"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::str::FromStr;
use url::Url;

/// A single JSON-RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcConfig {
    pub http: Url,
    /// Requests per second allowed against this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
}

/// A config value given either literally or as an environment variable reference.
///
/// `"$NAME"` and `"${NAME}"` are looked up in the environment during
/// deserialization; anything else is parsed as `T` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// Returns the variable name for `$VAR` / `${VAR}` syntax.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
            return Some(braced);
        }
        let name = s.strip_prefix('$')?;
        let is_identifier =
            !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        is_identifier.then_some(name)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        let value = match Self::env_var_name(&s) {
            Some(var_name) => std::env::var(var_name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{var_name}' not found (referenced as '{s}')"
                ))
            })?,
            None => s,
        };

        let parsed = value
            .parse::<T>()
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))?;

        Ok(LiteralOrEnv(parsed))
    }
}

impl<T> Serialize for LiteralOrEnv<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_value() {
        let value: LiteralOrEnv<u64> = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(*value, 42);
    }

    #[test]
    fn test_env_var_syntax() {
        assert_eq!(LiteralOrEnv::<u64>::env_var_name("$FOO_1"), Some("FOO_1"));
        assert_eq!(LiteralOrEnv::<u64>::env_var_name("${FOO}"), Some("FOO"));
        assert_eq!(LiteralOrEnv::<u64>::env_var_name("$"), None);
        assert_eq!(LiteralOrEnv::<u64>::env_var_name("$FOO-BAR"), None);
        assert_eq!(LiteralOrEnv::<u64>::env_var_name("plain"), None);
    }

    #[test]
    fn test_resolves_from_environment() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("TOKENBANK_TYPES_TEST_VALUE", "7") };
        let value: LiteralOrEnv<u64> =
            serde_json::from_str("\"${TOKENBANK_TYPES_TEST_VALUE}\"").unwrap();
        assert_eq!(value.into_inner(), 7);
    }

    #[test]
    fn test_missing_environment_variable() {
        let result =
            serde_json::from_str::<LiteralOrEnv<u64>>("\"$TOKENBANK_TYPES_SURELY_UNSET\"");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("TOKENBANK_TYPES_SURELY_UNSET"));
    }

    #[test]
    fn test_rpc_config_rate_limit_optional() {
        let rpc: RpcConfig = serde_json::from_str(r#"{"http":"http://localhost:8545"}"#).unwrap();
        assert_eq!(rpc.rate_limit, None);
        assert_eq!(rpc.http.as_str(), "http://localhost:8545/");
    }
}
