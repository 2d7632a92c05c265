pub const ENV_FILE: &str = "var.env";
pub const DEFAULT_VALUES: &str = "config/defaults.yml";
pub const LAST_SUMMARY: &str = "last_deployment_summary.yml";

/// Environment variables that override the locations above
pub const ENV_FILE_VAR: &str = "AZURE_ENV_FILE";
pub const DEFAULT_VALUES_VAR: &str = "AZURE_DEFAULTS_FILE";
