use snapreport_core::ParamError;
use tracing::debug;

use crate::traits::ParameterStore;

pub const DEFAULT_PARAM_PREFIX: &str = "SNAPREPORT_PARAM_";

/// Parameters read from process environment variables.
///
/// A key such as `/trello/arn` maps to `SNAPREPORT_PARAM_TRELLO_ARN`.
#[derive(Clone, Debug)]
pub struct EnvParameterStore {
    pub prefix: String,
}

impl EnvParameterStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn var_name(&self, key: &str) -> String {
        let body: String = key
            .trim_start_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, body)
    }
}

impl Default for EnvParameterStore {
    fn default() -> Self {
        Self::new(DEFAULT_PARAM_PREFIX)
    }
}

impl ParameterStore for EnvParameterStore {
    fn get(&self, key: &str, secret: bool) -> Result<String, ParamError> {
        let var = self.var_name(key);
        match std::env::var(&var) {
            Ok(v) if !v.is_empty() => {
                debug!(key, var = %var, secret, "parameter resolved from environment");
                Ok(v)
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => Err(ParamError::NotFound(key.to_string())),
            Err(std::env::VarError::NotUnicode(_)) => {
                Err(ParamError::Unavailable(format!("{var} is not valid unicode")))
            }
        }
    }
}
