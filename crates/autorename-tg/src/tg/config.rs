use serde::Deserialize;
use teloxide::types::ChatId;

#[derive(Deserialize, Clone)]
pub(crate) struct Config {
    pub(crate) token: String,

    /// Chat where the bot reports every renamed file. Nothing is reported
    /// if it isn't set.
    #[serde(default)]
    pub(crate) log_chat: Option<ChatId>,
}
