//! User-facing strings.

pub const CONNECT_SLACK_ACCOUNT: &str = "Connect your slack account";
pub const MANAGE_SLACK_ACCOUNT: &str = "Manage your slack account";
pub const NOT_CONFIGURED: &str =
    "The Slack server hasn't been configured so Slack messages cannot be sent";

pub const INVALID_STATE: &str =
    "Error - unexpected state variable. Start the connection again from your preferences.";
pub const PROVIDER_REJECTED: &str = "Slack did not grant access to an incoming webhook.";
pub const USER_MISMATCH: &str =
    "This account is already connected to a different Slack user. Disconnect it first.";
pub const TRANSPORT_FAILED: &str = "Slack could not be reached. Please try again later.";
pub const CONNECT_LINK_INVALID: &str =
    "This connect link is invalid or has expired. Start again from your preferences.";
pub const STORE_FAILED: &str = "Your Slack connection could not be saved.";
