//! Configuration and secrets for things2reclaim.
//!
//! ## config.kdl - preferences (safe to sync across machines)
//!
//! Located at `$T2R_CONFIG_DIR/config.kdl`, else
//! `~/.config/things2reclaim/config.kdl`. Keys: `area`, `database-path`,
//! `things-database`, `reclaim-url`, `toggl-url`, `completion-delay-secs`,
//! `tracking-days`, `output-format`.
//!
//! ## state.kdl - secrets (machine-specific)
//!
//! Located at `$T2R_DATA_DIR/state.kdl`, else
//! `~/.local/share/things2reclaim/state.kdl`. Keys: `reclaim-token`,
//! `toggl-token`, `things-auth-token`.
//!
//! **CRITICAL**: `state.kdl` MUST be created with 0600 permissions.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DB_PATH_ENV, RECLAIM_TOKEN_ENV, Resolved, Settings, THINGS_TOKEN_ENV,
    TOGGL_TOKEN_ENV, ValueSource, resolve_settings, resolve_settings_with_env,
};
pub use schema::{
    AppConfig, AppState, CONFIG_FILE_MODE, CONFIG_TEMPLATE, OutputFormat, STATE_FILE_MODE,
    STATE_TEMPLATE, mask_token,
};
