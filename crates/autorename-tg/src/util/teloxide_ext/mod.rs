mod requester;

use easy_ext::ext;
use teloxide::types::{Chat, UpdateKind, User};

pub(crate) mod prelude {
    pub(crate) use super::{
        requester::UtilRequesterExt as _, ChatExt as _, UpdateKindExt as _, UserExt as _,
    };
}

#[ext(UserExt)]
pub(crate) impl User {
    fn username(&self) -> String {
        self.username.clone().unwrap_or_else(|| self.full_name())
    }

    fn debug_id(&self) -> String {
        format!("{} ({})", self.username(), self.id)
    }
}

#[ext(ChatExt)]
pub(crate) impl Chat {
    fn debug_id(&self) -> String {
        let username = self
            .username()
            .map(|name| format!("{name}, "))
            .unwrap_or_default();

        let title = self
            .title()
            .or_else(|| self.first_name())
            .unwrap_or("{{unknown_chat_title}}");

        format!("{title} ({username}{})", self.id)
    }
}

#[ext(UpdateKindExt)]
pub(crate) impl UpdateKind {
    fn discriminator(&self) -> &'static str {
        match self {
            UpdateKind::Message(_) => "Message",
            UpdateKind::EditedMessage(_) => "EditedMessage",
            UpdateKind::CallbackQuery(_) => "CallbackQuery",
            UpdateKind::InlineQuery(_) => "InlineQuery",
            UpdateKind::MyChatMember(_) => "MyChatMember",
            UpdateKind::Error(_) => "Error",
            _ => "Other",
        }
    }
}
