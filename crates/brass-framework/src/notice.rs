//! User-visible notice templates.
//!
//! Every message the dispatcher sends on its own behalf comes from a
//! [`Notices`] template, so the wording can be replaced per deployment.
//! Templates use `{name}` placeholders filled in by [`render`].

use serde::{Deserialize, Serialize};

/// Notice templates with English defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Notices {
    /// Shown for description-only modules. `{desc}`
    pub module_desc: String,
    /// Chain over the cap. `{max}`
    pub too_many_chained: String,
    pub already_executing: String,
    /// `{module}`, `{prefix}`
    pub module_disabled: String,
    pub superuser_only: String,
    /// `{module}`
    pub admin_only: String,
    /// Admin-only entry of a module the sender may otherwise use.
    pub sub_admin_only: String,
    /// `{module}`, `{report}`
    pub unbound_module: String,
    /// `{usage}`
    pub invalid_format: String,
    /// `{module}`, `{report}`
    pub invalid_help_doc: String,
    /// `{error}`, `{report}`
    pub handler_error: String,
    /// `{seconds}`
    pub ban_first: String,
    /// `{seconds}`
    pub ban_repeat: String,
    /// Sent by the default sanction sink. `{reason}`
    pub warned: String,
    /// Filled into `{report}` when an issue URL is configured. `{url}`
    pub report_suffix: String,
    /// Reason passed to the sanction sink. `{module}`
    pub same_command_reason: String,
    pub volume_reason: String,
}

impl Default for Notices {
    fn default() -> Self {
        Self {
            module_desc: "About:\n{desc}".into(),
            too_many_chained: "You are not a superuser of this bot; at most {max} commands can be chained."
                .into(),
            already_executing: "You already have a command running, please try again later.".into(),
            module_disabled: "The {module} module is not enabled. Send {prefix}enable {module} to enable it."
                .into(),
            superuser_only: "You do not have permission to use this command.".into(),
            admin_only: "The {module} command can only be used by admins of this conversation.".into(),
            sub_admin_only: "This command can only be used by admins of this conversation.".into(),
            unbound_module: "Error: {module} is not bound to any handler, please contact the developers.{report}"
                .into(),
            invalid_format: "Invalid syntax.\n{usage}".into(),
            invalid_help_doc: "The help doc of the {module} module is malformed, please contact the developers.{report}"
                .into(),
            handler_error: "An error occurred while running the command, please report it to the developers:\n{error}{report}"
                .into(),
            ban_first: "Notice:\nYou have been temporarily banned because your behaviour triggered a warning.\nThe ban lifts in {seconds} seconds."
                .into(),
            ban_repeat: "Using commands during a temporary ban may get you warned again.\nThe ban lifts in {seconds} seconds."
                .into(),
            warned: "Warning: {reason}".into(),
            report_suffix: "\nReport it at: {url}".into(),
            same_command_reason: "Repeated use of the {module} command in a short time".into(),
            volume_reason: "Too many commands in a short time".into(),
        }
    }
}

/// Substitutes `{key}` placeholders in `template`.
///
/// Unknown placeholders are left as they are.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (key, value) in values {
        let placeholder = format!("{{{key}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}
