//! Telegram surface of the bot: the commands, the file submissions and the
//! queue status messages.

mod callback;
mod cmd;
mod config;
mod files;
mod transport;

use crate::naming::PatternMatcher;
use crate::prefs::PrefsStore;
use crate::prelude::*;
use crate::rename::{self, DuplicateSuppressor, Pipeline, QueueRegistry, RenameQueue};
use crate::util::media_conv::Ffmpeg;
use crate::{db, Result};
use dptree::di::DependencyMap;
use metrics::counter;
use std::sync::Arc;
use teloxide::adaptors::{CacheMe, DefaultParseMode, Throttle, Trace};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use teloxide::utils::markdown;
use transport::TgTransport;

pub(crate) use cmd::CommandError;
pub(crate) use config::*;

pub(crate) type Bot = Trace<CacheMe<DefaultParseMode<Throttle<teloxide::Bot>>>>;

pub(crate) struct Ctx {
    bot: Bot,

    /// File downloads don't go through the adaptors
    raw_bot: teloxide::Bot,

    cfg: Arc<Config>,
    prefs: Arc<dyn PrefsStore>,
    ffmpeg: Arc<Ffmpeg>,
    pipeline: Arc<Pipeline>,

    /// One queue per chat with files in flight
    queues: QueueRegistry<ChatId>,
}

impl Ctx {
    fn queue(&self, chat: ChatId) -> Arc<RenameQueue> {
        self.queues.get_or_create(chat, || {
            let transport = TgTransport {
                bot: self.bot.clone(),
                raw_bot: self.raw_bot.clone(),
                chat,
                log_chat: self.cfg.log_chat,
            };
            RenameQueue::new(Arc::new(transport), self.pipeline.clone())
        })
    }

    /// Queue of the chat only if it has files in flight
    fn existing_queue(&self, chat: ChatId) -> Option<Arc<RenameQueue>> {
        self.queues.get(&chat)
    }
}

pub(crate) struct RunBotOptions {
    pub(crate) tg_cfg: Config,
    pub(crate) rename_cfg: rename::Config,
    pub(crate) db: db::Repo,
}

pub(crate) async fn run_bot(opts: RunBotOptions) -> Result {
    let mut di = DependencyMap::new();

    let raw_bot = teloxide::Bot::new(opts.tg_cfg.token.clone());

    let bot: Bot = raw_bot
        .clone()
        .throttle(Default::default())
        .parse_mode(ParseMode::MarkdownV2)
        .cache_me()
        .trace(teloxide::adaptors::trace::Settings::all());

    let rename_cfg = opts.rename_cfg;

    let ffmpeg = Arc::new(Ffmpeg {
        ffmpeg: rename_cfg.ffmpeg.clone(),
        ffprobe: rename_cfg.ffprobe.clone(),
        remux_timeout: rename_cfg.remux_timeout(),
        probe_timeout: rename_cfg.probe_timeout(),
    });

    let prefs: Arc<dyn PrefsStore> = Arc::new(opts.db.prefs);

    let pipeline = Arc::new(Pipeline {
        prefs: prefs.clone(),
        media: ffmpeg.clone(),
        suppressor: Arc::new(DuplicateSuppressor::new(rename_cfg.suppression_window())),
        matcher: PatternMatcher::default(),
        work_dir: rename_cfg.work_dir.clone(),
        thumbnail_side: rename_cfg.thumbnail_side,
    });

    let log_chat = opts.tg_cfg.log_chat;

    di.insert(Arc::new(Ctx {
        bot: bot.clone(),
        raw_bot,
        cfg: Arc::new(opts.tg_cfg),
        prefs,
        ffmpeg,
        pipeline,
        queues: Default::default(),
    }));

    info!("Starting bot...");

    bot.set_my_commands(cmd::regular::Cmd::bot_commands())
        .await?;

    if let Some(log_chat) = log_chat {
        let notice = startup_notice(env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_SHA"));
        if let Err(err) = bot.send_message(log_chat, notice).await {
            warn!(err = tracing_err(&err), "Failed to post the startup notice");
        }
    }

    let handler = dptree::entry()
        .inspect(|update: Update| {
            counter!("tg_updates_total", "kind" => update.kind.discriminator()).increment(1);
        })
        .branch(
            Update::filter_message()
                .filter(cmd::filter_pm_with_bot)
                .filter_command::<cmd::StartCommand>()
                .endpoint(cmd::handle::<cmd::StartCommand>()),
        )
        .branch(
            Update::filter_message()
                .filter(cmd::filter_pm_with_bot)
                .filter_command::<cmd::regular::Cmd>()
                .endpoint(cmd::handle::<cmd::regular::Cmd>()),
        )
        .branch(
            Update::filter_message()
                .filter(cmd::filter_pm_with_bot)
                .chain(dptree::filter_map(files::filter_file))
                .endpoint(files::handle_file),
        )
        .branch(
            Update::filter_message()
                .filter(cmd::filter_pm_with_bot)
                .chain(dptree::filter_map(files::filter_photo))
                .endpoint(files::handle_photo),
        )
        .branch(
            Update::filter_callback_query()
                .filter(callback::filter_abort_all)
                .endpoint(callback::handle_abort_all),
        )
        .inspect(|update: Update| {
            counter!("tg_updates_skipped_total", "kind" => update.kind.discriminator())
                .increment(1);
        });

    Dispatcher::builder(bot, handler)
        .dependencies(di)
        // We don't handle all possible messages that users send,
        // so to suppress the warning that we don't do this we have
        // a noop default handler here
        .default_handler(|_| std::future::ready(()))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");

    Ok(())
}

fn startup_notice(version: &str, commit: &str) -> String {
    format!(
        "🤖 Bot restarted\nVersion: {}\nCommit: {}",
        markdown::code_inline(version),
        markdown::code_inline(commit),
    )
}
