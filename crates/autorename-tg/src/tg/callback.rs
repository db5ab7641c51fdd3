use crate::prelude::*;
use crate::rename::ABORT_ALL_CALLBACK;
use crate::util::DynResult;
use crate::{tg, Error};
use futures::prelude::*;
use std::sync::Arc;
use teloxide::prelude::*;

pub(crate) fn filter_abort_all(query: CallbackQuery) -> bool {
    query.data.as_deref() == Some(ABORT_ALL_CALLBACK)
}

#[instrument(skip_all, fields(from = %query.from.debug_id()))]
pub(crate) async fn handle_abort_all(ctx: Arc<tg::Ctx>, query: CallbackQuery) -> DynResult {
    async {
        let queue = query
            .message
            .as_ref()
            .and_then(|message| ctx.existing_queue(message.chat().id));

        let aborted = match queue {
            Some(queue) => queue.request_abort_all().await,
            None => false,
        };

        info!(aborted, "Processing abort request");

        let text = if aborted {
            "Aborting all operations..."
        } else {
            "Nothing to abort"
        };

        ctx.bot
            .answer_callback_query(query.id.clone())
            .text(text)
            .await?;

        Ok::<_, Error>(())
    }
    .err_into()
    .await
}
