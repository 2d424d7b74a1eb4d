//! Message dispatcher.
//!
//! The [`Dispatcher`] takes one inbound [`Session`](brass_core::Session) at a
//! time and decides what runs:
//!
//! 1. The display text is normalized; blacklisted senders are ignored
//! 2. If it starts with a command prefix, the text is split into chained
//!    sub-commands which run one after another under the sender's execution
//!    lock. Each sub-command passes the ban check, the abuse detector and the
//!    permission gate before its handler is invoked
//! 3. Every regex module enabled in the conversation is evaluated against
//!    the text; matching triggers run under a per-invocation lock
//!
//! Policy decisions come back as [`PolicyOutcome`]s and each step reports a
//! [`Step`]; a [`Halt`] ends the dispatch early, including the regex pass.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(registry, senders)
//!     .sanction(Arc::new(LogSanction::default()));
//!
//! let report = dispatcher.dispatch(session).await;
//! ```

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use crate::context::MessageContext;
use crate::error::{AbuseViolation, GrammarError, ViolationKind};
use crate::grammar::CommandParser;
use crate::handler::{HandlerResult, invoke};
use crate::module::{CommandModule, Module, RegexModule};
use crate::notice::render;
use crate::policy::{
    AbuseDetector, BanState, BanTier, BanTracker, ExecutionLockSet, PolicyOutcome, StateStore,
    UsageCounters,
};
use crate::registry::{ModuleCatalog, ModuleRegistry};
use crate::resolver::CommandResolver;
use crate::sanction::{LogSanction, Sanction};
use crate::sender::SenderPolicy;
use crate::settings::DispatchSettings;
use brass_core::{BoxedSession, remove_duplicate_space};

/// Why a dispatch stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    /// The sender is blacklisted and not whitelisted.
    Blacklisted,
    /// Too many chained sub-commands for a non-superuser.
    TooManyChained,
    /// The sender already has a dispatch in flight.
    LockBusy,
    /// The sender is inside a ban window.
    Banned,
    /// An abuse threshold was crossed.
    Violation(ViolationKind),
}

/// Whether the chain loop goes on after a sub-command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Halt(Halt),
}

/// Summary of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Command handler invocations.
    pub commands: usize,
    /// Regex trigger invocations.
    pub triggers: usize,
    pub halted: Option<Halt>,
}

/// Entries removed by [`Dispatcher::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub counters: usize,
    pub bans: usize,
}

/// The command and trigger dispatcher.
///
/// A `Dispatcher` owns all per-sender policy state. It is `Send + Sync`;
/// share it behind an `Arc` and call [`dispatch`](Self::dispatch)
/// concurrently.
pub struct Dispatcher {
    settings: DispatchSettings,
    resolver: CommandResolver,
    catalog: ModuleCatalog,
    senders: Arc<dyn SenderPolicy>,
    sanction: Arc<dyn Sanction>,
    abuse: AbuseDetector,
    bans: BanTracker,
    locks: ExecutionLockSet,
}

impl Dispatcher {
    /// Creates a dispatcher with default settings.
    pub fn new(registry: Arc<dyn ModuleRegistry>, senders: Arc<dyn SenderPolicy>) -> Self {
        Self::with_settings(registry, senders, DispatchSettings::default())
    }

    pub fn with_settings(
        registry: Arc<dyn ModuleRegistry>,
        senders: Arc<dyn SenderPolicy>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            resolver: CommandResolver::new(
                settings.prefixes.clone(),
                settings.chain_separator.clone(),
            ),
            catalog: ModuleCatalog::new(registry),
            senders,
            sanction: Arc::new(LogSanction::new(settings.notices.clone())),
            abuse: AbuseDetector::new(settings.limits),
            bans: BanTracker::new(settings.ban),
            locks: ExecutionLockSet::new(),
            settings,
        }
    }

    /// Replaces the sanction sink.
    pub fn sanction(mut self, sanction: Arc<dyn Sanction>) -> Self {
        self.sanction = sanction;
        self
    }

    /// Backs the abuse counters and ban states with the given stores.
    pub fn state_stores(
        mut self,
        usage: Arc<dyn StateStore<UsageCounters>>,
        bans: Arc<dyn StateStore<BanState>>,
    ) -> Self {
        self.abuse = AbuseDetector::with_store(self.settings.limits, usage);
        self.bans = BanTracker::with_store(self.settings.ban, bans);
        self
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn abuse(&self) -> &AbuseDetector {
        &self.abuse
    }

    pub fn bans(&self) -> &BanTracker {
        &self.bans
    }

    pub fn locks(&self) -> &ExecutionLockSet {
        &self.locks
    }

    /// Dispatches one inbound message.
    pub async fn dispatch(&self, session: BoxedSession) -> DispatchReport {
        let span = info_span!(
            "dispatch",
            sender = %session.sender_id(),
            target = %session.target_id()
        );
        self.run(session).instrument(span).await
    }

    /// Evicts abuse counters and ban states whose windows have passed.
    pub fn sweep(&self, now: Instant) -> SweepReport {
        let report = SweepReport {
            counters: self.abuse.sweep(now),
            bans: self.bans.sweep(now),
        };
        debug!(
            counters = report.counters,
            bans = report.bans,
            "Swept stale policy state"
        );
        report
    }

    async fn run(&self, session: BoxedSession) -> DispatchReport {
        let mut report = DispatchReport::default();

        let display = remove_duplicate_space(&session.display());
        if display.is_empty() {
            return report;
        }

        let sender = session.sender_id().to_string();
        if self.senders.is_blacklisted(&sender).await && !self.senders.is_whitelisted(&sender).await
        {
            debug!("Ignoring blacklisted sender");
            report.halted = Some(Halt::Blacklisted);
            return report;
        }

        let ctx = Arc::new(MessageContext::new(session, display));
        let enabled = self.senders.enabled_modules(ctx.target_id()).await;

        if let Some((prefix, body)) = self.resolver.strip_prefix(ctx.display()) {
            if body.is_empty() {
                return report;
            }
            if let Step::Halt(halt) = self.run_chain(&ctx, prefix, body, &enabled, &mut report).await
            {
                report.halted = Some(halt);
                return report;
            }
        }

        ctx.set_trigger_msg(ctx.display());
        ctx.set_parsed_msg(None);
        if let Step::Halt(halt) = self.run_triggers(&ctx, &enabled, &mut report).await {
            report.halted = Some(halt);
        }
        report
    }

    // =========================================================================
    // Explicit commands
    // =========================================================================

    async fn run_chain(
        &self,
        ctx: &Arc<MessageContext>,
        prefix: &str,
        body: &str,
        enabled: &HashSet<String>,
        report: &mut DispatchReport,
    ) -> Step {
        let session = ctx.session();
        let origin = if session.sender_from() != session.target_from() {
            format!(" ({})", ctx.target_id())
        } else {
            String::new()
        };
        info!("[{}{}] -> [Bot]: {}", ctx.sender_id(), origin, ctx.display());

        let commands = self.resolver.split_chain(body);
        if commands.len() > self.settings.max_chained && !session.check_superuser().await {
            let max = self.settings.max_chained.to_string();
            ctx.reply(&render(
                &self.settings.notices.too_many_chained,
                &[("max", max.as_str())],
            ))
            .await;
            return Step::Halt(Halt::TooManyChained);
        }

        let Some(_lock) = self.locks.try_acquire(ctx.sender_id()) else {
            ctx.reply(&self.settings.notices.already_executing).await;
            return Step::Halt(Halt::LockBusy);
        };

        let modules = self.catalog.modules();
        let aliases = self.catalog.aliases();
        for command in &commands {
            let step = self
                .run_command(ctx, prefix, command, &modules, &aliases, enabled, report)
                .await;
            if let Step::Halt(_) = step {
                return step;
            }
        }
        Step::Continue
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_command(
        &self,
        ctx: &Arc<MessageContext>,
        prefix: &str,
        command: &str,
        modules: &HashMap<String, Arc<Module>>,
        aliases: &HashMap<String, String>,
        enabled: &HashSet<String>,
        report: &mut DispatchReport,
    ) -> Step {
        ctx.set_trigger_msg(command);
        let resolved = match self.resolver.resolve(command, modules, aliases) {
            Ok(resolved) => resolved,
            Err(e) => {
                trace!(error = %e, "Skipping sub-command");
                return Step::Continue;
            }
        };
        ctx.set_trigger_msg(resolved.command.as_str());
        let keyword = resolved.keyword.as_str();

        let step = self
            .enforce(ctx, keyword, self.bans.check(ctx.sender_id(), Instant::now()))
            .await;
        if step != Step::Continue {
            return step;
        }
        let step = self
            .enforce(
                ctx,
                keyword,
                self.abuse.record(ctx.sender_id(), keyword, Instant::now()),
            )
            .await;
        if step != Step::Continue {
            return step;
        }

        let module = match resolved.module.as_ref() {
            Module::Command(module) => module,
            other => {
                if let Some(desc) = other.desc() {
                    ctx.reply(&render(
                        &self.settings.notices.module_desc,
                        &[("desc", desc)],
                    ))
                    .await;
                }
                return Step::Continue;
            }
        };

        if !self.admit_command(ctx, keyword, module, enabled).await {
            return Step::Continue;
        }

        if module.match_list().is_empty() {
            warn!(module = keyword, "Module has no bound handler");
            let report_suffix = self.settings.report_suffix();
            ctx.reply(&render(
                &self.settings.notices.unbound_module,
                &[("module", keyword), ("report", report_suffix.as_str())],
            ))
            .await;
            return Step::Continue;
        }

        if !module.has_grammar() {
            ctx.set_parsed_msg(None);
            for entry in module.match_list() {
                let result = invoke(entry.handler(), Arc::clone(ctx), true).await;
                report.commands += 1;
                if let Err(step) = self.settle(ctx, keyword, result).await {
                    return step;
                }
            }
            return Step::Continue;
        }

        let parsed = CommandParser::new(module, prefix)
            .and_then(|parser| parser.parse(&resolved.command));

        let (entry, args) = match parsed {
            Ok(selected) => selected,
            Err(GrammarError::InvalidFormat { usage }) => {
                ctx.reply(&render(
                    &self.settings.notices.invalid_format,
                    &[("usage", usage.as_str())],
                ))
                .await;
                return Step::Continue;
            }
            Err(e @ GrammarError::InvalidHelpDoc { .. }) => {
                error!(module = keyword, error = %e, "Malformed help doc");
                let report_suffix = self.settings.report_suffix();
                ctx.reply(&render(
                    &self.settings.notices.invalid_help_doc,
                    &[("module", keyword), ("report", report_suffix.as_str())],
                ))
                .await;
                return Step::Continue;
            }
        };

        let session = ctx.session();
        if entry.is_superuser_only() {
            if !session.check_superuser().await {
                ctx.reply(&self.settings.notices.superuser_only).await;
                return Step::Continue;
            }
        } else if entry.is_admin_only() && !session.check_permission().await {
            ctx.reply(&self.settings.notices.sub_admin_only).await;
            return Step::Continue;
        }

        ctx.set_parsed_msg(Some(args));
        let result = invoke(entry.handler(), Arc::clone(ctx), true).await;
        report.commands += 1;
        match self.settle(ctx, keyword, result).await {
            Ok(()) => Step::Continue,
            Err(step) => step,
        }
    }

    /// Superuser, enablement and admin checks for a command module. Sends
    /// the rejection notice and returns `false` when the sender may not run
    /// it.
    async fn admit_command(
        &self,
        ctx: &MessageContext,
        keyword: &str,
        module: &CommandModule,
        enabled: &HashSet<String>,
    ) -> bool {
        let notices = &self.settings.notices;
        let session = ctx.session();

        let rejection = if module.is_superuser_only() {
            (!session.check_superuser().await).then(|| notices.superuser_only.clone())
        } else if !module.is_base() && !enabled.contains(keyword) {
            Some(render(
                &notices.module_disabled,
                &[
                    ("module", keyword),
                    ("prefix", self.settings.display_prefix()),
                ],
            ))
        } else if module.is_admin_only() {
            (!session.check_permission().await)
                .then(|| render(&notices.admin_only, &[("module", keyword)]))
        } else {
            None
        };

        match rejection {
            Some(notice) => {
                debug!(module = keyword, "Permission gate rejected sub-command");
                ctx.reply(&notice).await;
                false
            }
            None => true,
        }
    }

    /// Interprets a handler result on the explicit path. `Err` carries the
    /// step to take instead of running the rest of the sub-command.
    async fn settle(
        &self,
        ctx: &MessageContext,
        keyword: &str,
        result: HandlerResult,
    ) -> Result<(), Step> {
        let Err(err) = result else {
            return Ok(());
        };
        match err.downcast::<AbuseViolation>() {
            Ok(violation) => Err(self
                .enforce(ctx, keyword, PolicyOutcome::Violation(*violation))
                .await),
            Err(err) => {
                error!(module = keyword, error = %ErrorChain(&*err), "Handler failed");
                let report_suffix = self.settings.report_suffix();
                let message = err.to_string();
                ctx.reply(&render(
                    &self.settings.notices.handler_error,
                    &[("error", message.as_str()), ("report", report_suffix.as_str())],
                ))
                .await;
                Err(Step::Continue)
            }
        }
    }

    /// Acts on a policy decision: notices, sanctions and ban updates.
    async fn enforce(&self, ctx: &MessageContext, keyword: &str, outcome: PolicyOutcome) -> Step {
        let notices = &self.settings.notices;
        match outcome {
            PolicyOutcome::Allowed => Step::Continue,
            PolicyOutcome::Blocked { tier, remaining } => {
                let template = match tier {
                    BanTier::First => &notices.ban_first,
                    BanTier::Repeat => &notices.ban_repeat,
                };
                let seconds = remaining.as_secs().to_string();
                ctx.reply(&render(template, &[("seconds", seconds.as_str())])).await;
                Step::Halt(Halt::Banned)
            }
            PolicyOutcome::Escalated => {
                warn!(sender = %ctx.sender_id(), "Banned sender kept issuing commands");
                self.sanction.warn_target(ctx, None).await;
                Step::Halt(Halt::Banned)
            }
            PolicyOutcome::Violation(violation) => {
                let reason = match violation.kind {
                    ViolationKind::SameCommand => {
                        render(&notices.same_command_reason, &[("module", keyword)])
                    }
                    ViolationKind::Volume => notices.volume_reason.clone(),
                };
                warn!(
                    sender = %ctx.sender_id(),
                    module = keyword,
                    kind = violation.kind.as_str(),
                    "Abuse violation"
                );
                self.sanction.warn_target(ctx, Some(&reason)).await;
                self.bans.on_violation(ctx.sender_id(), Instant::now());
                Step::Halt(Halt::Violation(violation.kind))
            }
        }
    }

    // =========================================================================
    // Regex triggers
    // =========================================================================

    async fn run_triggers(
        &self,
        ctx: &Arc<MessageContext>,
        enabled: &HashSet<String>,
        report: &mut DispatchReport,
    ) -> Step {
        let modules = self.catalog.regex_modules();
        for module in modules.iter().filter(|m| enabled.contains(m.keyword())) {
            let step = self.run_regex_module(ctx, module, report).await;
            if step != Step::Continue {
                return step;
            }
        }
        Step::Continue
    }

    async fn run_regex_module(
        &self,
        ctx: &Arc<MessageContext>,
        module: &RegexModule,
        report: &mut DispatchReport,
    ) -> Step {
        if module.match_list().is_empty() {
            warn!(module = module.keyword(), "Regex module has no bound trigger");
            return Step::Continue;
        }

        let session = ctx.session();
        for entry in module.match_list() {
            let Some(matched) = entry.evaluate(ctx.display()) else {
                continue;
            };

            if module.is_superuser_only() {
                if !session.check_superuser().await {
                    continue;
                }
            } else if module.is_admin_only() && !session.check_permission().await {
                continue;
            }

            let Some(lock) = self.locks.try_acquire(ctx.sender_id()) else {
                ctx.reply(&self.settings.notices.already_executing).await;
                return Step::Halt(Halt::LockBusy);
            };
            ctx.set_matched_msg(Some(matched));
            let result = invoke(entry.handler(), Arc::clone(ctx), entry.shows_typing()).await;
            report.triggers += 1;
            drop(lock);

            if let Err(err) = result {
                return match err.downcast::<AbuseViolation>() {
                    Ok(violation) => {
                        self.enforce(ctx, module.keyword(), PolicyOutcome::Violation(*violation))
                            .await
                    }
                    Err(err) => {
                        error!(
                            module = module.keyword(),
                            error = %ErrorChain(&*err),
                            "Regex handler failed"
                        );
                        Step::Continue
                    }
                };
            }
        }
        Step::Continue
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("settings", &self.settings)
            .field("tracked_counters", &self.abuse.tracked())
            .field("tracked_bans", &self.bans.tracked())
            .field("locked", &self.locks.len())
            .finish_non_exhaustive()
    }
}

/// Formats an error with its whole `source()` chain.
struct ErrorChain<'a>(&'a (dyn Error + 'static));

impl fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerFn;
    use crate::module::{CommandEntry, MatchMode, RegexMatch, StubModule};
    use crate::notice::Notices;
    use crate::registry::StaticRegistry;
    use crate::sender::MemorySenderPolicy;
    use crate::test_support::{RecordingSanction, RecordingSession};
    use brass_core::BoxError;
    use parking_lot::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Fixture {
        dispatcher: Dispatcher,
        registry: Arc<StaticRegistry>,
        senders: Arc<MemorySenderPolicy>,
        sanction: Arc<RecordingSanction>,
        log: Log,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(StaticRegistry::new());
            let senders = Arc::new(MemorySenderPolicy::new());
            let sanction = RecordingSanction::new();
            let dispatcher = Dispatcher::new(registry.clone(), senders.clone())
                .sanction(sanction.clone());
            Self {
                dispatcher,
                registry,
                senders,
                sanction,
                log: Arc::default(),
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().clone()
        }

        async fn send(&self, session: &Arc<RecordingSession>, text: &str) -> DispatchReport {
            session.set_display(text);
            self.dispatcher.dispatch(session.clone()).await
        }
    }

    fn notices() -> Notices {
        Notices::default()
    }

    /// A handler that logs `name:<trigger_msg>`.
    fn record(log: &Log, name: &'static str) -> impl HandlerFn {
        let log = Arc::clone(log);
        move |ctx: Arc<MessageContext>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:{}", ctx.trigger_msg()));
                Ok::<_, BoxError>(())
            }
        }
    }

    fn command(log: &Log, keyword: &'static str) -> CommandModule {
        CommandModule::new(keyword).base(true).handle(record(log, keyword))
    }

    #[tokio::test]
    async fn test_plain_command_runs() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));

        let session = RecordingSession::new("alice", "group");
        let report = fx.send(&session, "  ~PING   now ").await;

        assert_eq!(fx.log(), vec!["ping:ping now"]);
        assert_eq!(report.commands, 1);
        assert_eq!(report.halted, None);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_messages_are_silent() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        let session = RecordingSession::new("alice", "group");

        assert_eq!(fx.send(&session, "~").await, DispatchReport::default());
        assert_eq!(fx.send(&session, "   ").await, DispatchReport::default());
        assert_eq!(fx.send(&session, "~nothing").await.commands, 0);
        assert!(session.replies().is_empty());
        assert!(fx.log().is_empty());
    }

    #[tokio::test]
    async fn test_blacklist_and_whitelist() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        fx.senders.blacklist("mallory");
        fx.senders.blacklist("bob");
        fx.senders.whitelist("bob");

        let mallory = RecordingSession::new("mallory", "group");
        let report = fx.send(&mallory, "~ping").await;
        assert_eq!(report.halted, Some(Halt::Blacklisted));

        let bob = RecordingSession::new("bob", "group");
        assert_eq!(fx.send(&bob, "~ping").await.commands, 1);
        assert_eq!(fx.log(), vec!["ping:ping"]);
    }

    #[tokio::test]
    async fn test_chain_order_survives_handler_failure() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "a"));
        fx.registry.register(CommandModule::new("b").base(true).handle(
            |_ctx: Arc<MessageContext>| async move { Err::<(), _>(anyhow::anyhow!("b broke")) },
        ));
        fx.registry.register(command(&fx.log, "c"));

        let session = RecordingSession::new("alice", "group");
        let report = fx.send(&session, "~a 1&&b&&~c 3").await;

        assert_eq!(fx.log(), vec!["a:a 1", "c:c 3"]);
        assert_eq!(report.commands, 3);
        assert_eq!(report.halted, None);

        let expected = render(
            &notices().handler_error,
            &[("error", "b broke"), ("report", "")],
        );
        assert_eq!(session.replies(), vec![expected]);
    }

    #[tokio::test]
    async fn test_too_many_chained_commands() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));

        let session = RecordingSession::new("alice", "group");
        let report = fx.send(&session, "~ping&&ping&&ping&&ping&&ping&&ping").await;

        assert_eq!(report.halted, Some(Halt::TooManyChained));
        assert_eq!(report.commands, 0);
        assert!(fx.log().is_empty());
        assert_eq!(
            session.replies(),
            vec![render(&notices().too_many_chained, &[("max", "5")])]
        );
        assert!(fx.dispatcher.locks().is_empty());

        session.set_superuser(true);
        session.take_replies();
        let report = fx.send(&session, "~ping&&ping&&ping&&ping&&ping&&ping").await;
        assert_eq!(report.commands, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_dispatch_is_rejected() {
        let fx = Fixture::new();
        let log = Arc::clone(&fx.log);
        fx.registry.register(CommandModule::new("slow").base(true).handle(
            move |_ctx: Arc<MessageContext>| {
                let log = Arc::clone(&log);
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    log.lock().push("slow".into());
                    Ok::<_, BoxError>(())
                }
            },
        ));

        let first = RecordingSession::with_display("alice", "group", "~slow");
        let second = RecordingSession::with_display("alice", "group", "~slow");

        let (r1, r2) = tokio::join!(
            fx.dispatcher.dispatch(first.clone()),
            fx.dispatcher.dispatch(second.clone())
        );

        assert_eq!(r1.commands, 1);
        assert_eq!(r1.halted, None);
        assert_eq!(r2.commands, 0);
        assert_eq!(r2.halted, Some(Halt::LockBusy));
        assert_eq!(second.replies(), vec![notices().already_executing]);
        assert!(first.replies().is_empty());
        assert_eq!(fx.log(), vec!["slow"]);
        assert!(fx.dispatcher.locks().is_empty());
    }

    #[tokio::test]
    async fn test_alias_resolves_like_keyword() {
        let fx = Fixture::new();
        fx.registry.register(
            CommandModule::new("wiki")
                .alias("w")
                .handle(record(&fx.log, "wiki")),
        );
        let session = RecordingSession::new("alice", "group");

        fx.send(&session, "~w Rust").await;
        fx.send(&session, "~wiki Rust").await;
        let disabled = render(
            &notices().module_disabled,
            &[("module", "wiki"), ("prefix", "~")],
        );
        assert_eq!(session.take_replies(), vec![disabled.clone(), disabled]);

        fx.senders.enable("group", "wiki");
        fx.send(&session, "~W Rust").await;
        fx.send(&session, "~wiki Rust").await;
        assert_eq!(fx.log(), vec!["wiki:wiki Rust", "wiki:wiki Rust"]);
    }

    #[tokio::test]
    async fn test_permission_gates() {
        let fx = Fixture::new();
        fx.registry.register(
            CommandModule::new("reboot")
                .required_superuser(true)
                .handle(record(&fx.log, "reboot")),
        );
        fx.registry.register(
            CommandModule::new("kick")
                .base(true)
                .required_admin(true)
                .handle(record(&fx.log, "kick")),
        );
        let session = RecordingSession::new("alice", "group");

        fx.send(&session, "~reboot").await;
        fx.send(&session, "~kick bob").await;
        assert_eq!(
            session.take_replies(),
            vec![
                notices().superuser_only,
                render(&notices().admin_only, &[("module", "kick")]),
            ]
        );
        assert!(fx.log().is_empty());

        session.set_superuser(true);
        session.set_admin(true);
        fx.send(&session, "~reboot&&kick bob").await;
        assert_eq!(fx.log(), vec!["reboot:reboot", "kick:kick bob"]);
    }

    #[tokio::test]
    async fn test_stub_and_unbound_modules() {
        let fx = Fixture::new();
        fx.registry
            .register(StubModule::new("about").desc("A friendly bot"));
        fx.registry.register(CommandModule::new("empty").base(true));

        let session = RecordingSession::new("alice", "group");
        let report = fx.send(&session, "~about&&empty").await;

        assert_eq!(report.commands, 0);
        assert_eq!(
            session.replies(),
            vec![
                render(&notices().module_desc, &[("desc", "A friendly bot")]),
                render(
                    &notices().unbound_module,
                    &[("module", "empty"), ("report", "")]
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_grammar_selects_entry() {
        let fx = Fixture::new();
        let log = Arc::clone(&fx.log);
        let query = move |ctx: Arc<MessageContext>| {
            let log = Arc::clone(&log);
            async move {
                let args = ctx.parsed_msg().ok_or("missing parsed_msg")?;
                let title = args.get_str("title").unwrap_or_default().to_string();
                log.lock().push(format!("query:{title}"));
                Ok::<_, BoxError>(())
            }
        };
        fx.registry.register(
            CommandModule::new("wiki")
                .base(true)
                .entry(CommandEntry::new(query).usage(["<title> {Query a page}"]))
                .entry(
                    CommandEntry::new(record(&fx.log, "set"))
                        .usage(["set <url>"])
                        .required_admin(true),
                ),
        );
        let session = RecordingSession::new("alice", "group");

        fx.send(&session, r#"~wiki "Rust (language)""#).await;
        assert_eq!(fx.log(), vec!["query:Rust (language)"]);

        fx.send(&session, "~wiki set https://example.org").await;
        fx.send(&session, "~wiki").await;
        assert_eq!(
            session.take_replies(),
            vec![
                notices().sub_admin_only,
                render(
                    &notices().invalid_format,
                    &[("usage", "~wiki <title> - Query a page\n~wiki set <url>")]
                ),
            ]
        );

        session.set_admin(true);
        fx.send(&session, "~wiki set https://example.org").await;
        assert_eq!(fx.log().last().unwrap(), "set:wiki set https://example.org");
    }

    #[tokio::test]
    async fn test_malformed_help_doc_is_reported() {
        let fx = Fixture::new();
        fx.registry.register(
            CommandModule::new("bad")
                .base(true)
                .entry(CommandEntry::new(record(&fx.log, "bad")).usage(["<oops"])),
        );
        fx.registry.register(command(&fx.log, "ping"));

        let session = RecordingSession::new("alice", "group");
        fx.send(&session, "~bad x&&ping").await;

        assert_eq!(fx.log(), vec!["ping:ping"]);
        assert_eq!(
            session.replies(),
            vec![render(
                &notices().invalid_help_doc,
                &[("module", "bad"), ("report", "")]
            )]
        );
    }

    #[cfg(all(feature = "command", debug_assertions))]
    #[tokio::test]
    async fn test_malformed_clap_grammar_is_reported() {
        use crate::grammar::Grammar;
        use ::clap::{Arg, Command};

        let fx = Fixture::new();
        fx.registry.register(
            CommandModule::new("bad").base(true).entry(
                CommandEntry::new(record(&fx.log, "bad")).grammar(Grammar::clap(
                    Command::new("bad").arg(Arg::new("x")).arg(Arg::new("x")),
                )),
            ),
        );
        fx.registry.register(command(&fx.log, "ping"));

        let session = RecordingSession::new("alice", "group");
        let report = fx.send(&session, "~bad 1&&ping").await;

        assert_eq!(report.halted, None);
        assert_eq!(fx.log(), vec!["ping:ping"]);
        assert_eq!(
            session.replies(),
            vec![render(
                &notices().invalid_help_doc,
                &[("module", "bad"), ("report", "")]
            )]
        );
        assert!(fx.dispatcher.locks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_eleventh_same_command_is_violation() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        fx.registry.register(command(&fx.log, "pong"));
        let session = RecordingSession::new("alice", "group");

        for _ in 0..10 {
            assert_eq!(fx.send(&session, "~ping").await.halted, None);
        }
        let report = fx.send(&session, "~ping&&pong").await;

        assert_eq!(report.halted, Some(Halt::Violation(ViolationKind::SameCommand)));
        assert_eq!(report.commands, 0);
        assert_eq!(fx.log().len(), 10);
        assert_eq!(
            fx.sanction.warnings(),
            vec![(
                "alice".to_string(),
                Some(render(&notices().same_command_reason, &[("module", "ping")]))
            )]
        );
        assert_eq!(fx.dispatcher.bans().state("alice").unwrap().count, 1);
        assert!(fx.dispatcher.locks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_thirty_first_command_is_volume_violation() {
        let fx = Fixture::new();
        for keyword in ["a", "b", "c", "d"] {
            fx.registry.register(command(&fx.log, keyword));
        }
        let session = RecordingSession::new("alice", "group");

        for keyword in ["a", "b", "c"] {
            for _ in 0..10 {
                fx.send(&session, &format!("~{keyword}")).await;
            }
        }
        assert_eq!(fx.log().len(), 30);

        let report = fx.send(&session, "~d").await;
        assert_eq!(report.halted, Some(Halt::Violation(ViolationKind::Volume)));
        assert_eq!(
            fx.sanction.warnings()[0].1.as_deref(),
            Some(notices().volume_reason.as_str())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ban_tiers_then_escalation() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        let session = RecordingSession::new("alice", "group");
        fx.dispatcher.bans().on_violation("alice", Instant::now());

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(fx.send(&session, "~ping").await.halted, Some(Halt::Banned));
        assert_eq!(
            session.take_replies(),
            vec![render(&notices().ban_first, &[("seconds", "240")])]
        );

        for _ in 0..4 {
            fx.send(&session, "~ping").await;
        }
        let replies = session.take_replies();
        assert_eq!(replies.len(), 4);
        assert!(replies.iter().all(|r| *r == render(&notices().ban_repeat, &[("seconds", "240")])));
        assert!(fx.sanction.warnings().is_empty());

        assert_eq!(fx.send(&session, "~ping").await.halted, Some(Halt::Banned));
        assert!(session.replies().is_empty());
        assert_eq!(fx.sanction.warnings(), vec![("alice".to_string(), None)]);
        assert!(fx.log().is_empty());

        tokio::time::advance(Duration::from_secs(240)).await;
        assert_eq!(fx.send(&session, "~ping").await.commands, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_raised_violation_bans_sender() {
        let fx = Fixture::new();
        fx.registry.register(CommandModule::new("spam").base(true).handle(
            |_ctx: Arc<MessageContext>| async move {
                Err::<(), _>(AbuseViolation::new(ViolationKind::Volume))
            },
        ));
        fx.registry.register(command(&fx.log, "ping"));
        let session = RecordingSession::new("alice", "group");

        let report = fx.send(&session, "~spam&&ping").await;
        assert_eq!(report.halted, Some(Halt::Violation(ViolationKind::Volume)));
        assert!(fx.log().is_empty());
        assert_eq!(fx.sanction.warnings().len(), 1);
        assert!(fx.dispatcher.bans().state("alice").is_some());
    }

    fn regex_record(log: &Log, name: &'static str) -> impl HandlerFn {
        let log = Arc::clone(log);
        move |ctx: Arc<MessageContext>| {
            let log = Arc::clone(&log);
            async move {
                let found = match ctx.matched_msg() {
                    Some(RegexMatch::Match(c)) => vec![c.text().to_string()],
                    Some(RegexMatch::FindAll(all)) => {
                        all.iter().map(|c| c.text().to_string()).collect()
                    }
                    None => Vec::new(),
                };
                log.lock().push(format!("{name}:{}", found.join(",")));
                Ok::<_, BoxError>(())
            }
        }
    }

    #[tokio::test]
    async fn test_regex_find_all_and_match() {
        let fx = Fixture::new();
        fx.registry.register(
            RegexModule::new("bv")
                .pattern(r"BV\d{4}", MatchMode::FindAll, regex_record(&fx.log, "bv"))
                .unwrap(),
        );
        fx.registry.register(
            RegexModule::new("greet")
                .pattern(r"hello", MatchMode::Match, regex_record(&fx.log, "greet"))
                .unwrap(),
        );
        fx.senders.enable("group", "bv");
        fx.senders.enable("group", "greet");
        let session = RecordingSession::new("alice", "group");

        assert_eq!(fx.send(&session, "nothing here").await.triggers, 0);
        fx.send(&session, "oh hello BV1234 and BV5678").await;
        fx.send(&session, "hello there").await;

        assert_eq!(fx.log(), vec!["bv:BV1234,BV5678", "greet:hello"]);
        assert_eq!(session.typing_started(), 2);
        assert_eq!(session.typing_stopped(), 2);
    }

    #[tokio::test]
    async fn test_regex_requires_enablement_and_permission() {
        let fx = Fixture::new();
        fx.registry.register(
            RegexModule::new("admin")
                .required_admin(true)
                .pattern(r"x", MatchMode::FindAll, regex_record(&fx.log, "admin"))
                .unwrap(),
        );
        fx.registry.register(
            RegexModule::new("off")
                .pattern(r"x", MatchMode::FindAll, regex_record(&fx.log, "off"))
                .unwrap(),
        );
        fx.senders.enable("group", "admin");
        let session = RecordingSession::new("alice", "group");

        fx.send(&session, "x").await;
        assert!(fx.log().is_empty());
        assert!(session.replies().is_empty());

        session.set_admin(true);
        fx.send(&session, "x").await;
        assert_eq!(fx.log(), vec!["admin:x"]);
    }

    #[tokio::test]
    async fn test_regex_runs_after_commands() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        fx.registry.register(
            RegexModule::new("echo")
                .trigger(
                    crate::module::RegexEntry::new(
                        r"ping",
                        MatchMode::FindAll,
                        Default::default(),
                        regex_record(&fx.log, "echo"),
                    )
                    .unwrap()
                    .show_typing(false),
                ),
        );
        fx.senders.enable("group", "echo");
        let session = RecordingSession::new("alice", "group");

        let report = fx.send(&session, "~ping").await;
        assert_eq!(report.commands, 1);
        assert_eq!(report.triggers, 1);
        assert_eq!(fx.log(), vec!["ping:ping", "echo:ping"]);
        assert_eq!(session.typing_started(), 1);
    }

    #[tokio::test]
    async fn test_regex_lock_busy_halts_triggers() {
        let fx = Fixture::new();
        for keyword in ["first", "second"] {
            fx.registry.register(
                RegexModule::new(keyword)
                    .pattern(r"hi", MatchMode::Match, regex_record(&fx.log, keyword))
                    .unwrap(),
            );
            fx.senders.enable("group", keyword);
        }
        let session = RecordingSession::new("alice", "group");

        let held = fx.dispatcher.locks().try_acquire("alice").unwrap();
        let report = fx.send(&session, "hi there").await;

        assert_eq!(report.halted, Some(Halt::LockBusy));
        assert_eq!(report.triggers, 0);
        assert_eq!(session.replies(), vec![notices().already_executing]);
        assert!(fx.log().is_empty());

        drop(held);
        session.take_replies();
        assert_eq!(fx.send(&session, "hi there").await.triggers, 2);
        assert_eq!(fx.log(), vec!["first:hi", "second:hi"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_regex_raised_violation_bans_sender() {
        let fx = Fixture::new();
        fx.registry.register(
            RegexModule::new("flood")
                .pattern(r"hi", MatchMode::Match, |_ctx: Arc<MessageContext>| async move {
                    Err::<(), _>(AbuseViolation::new(ViolationKind::SameCommand))
                })
                .unwrap(),
        );
        fx.registry.register(
            RegexModule::new("later")
                .pattern(r"hi", MatchMode::Match, regex_record(&fx.log, "later"))
                .unwrap(),
        );
        fx.senders.enable("group", "flood");
        fx.senders.enable("group", "later");
        let session = RecordingSession::new("alice", "group");

        let report = fx.send(&session, "hi").await;

        assert_eq!(report.halted, Some(Halt::Violation(ViolationKind::SameCommand)));
        assert_eq!(report.triggers, 1);
        assert!(fx.log().is_empty());
        assert_eq!(
            fx.sanction.warnings(),
            vec![(
                "alice".to_string(),
                Some(render(&notices().same_command_reason, &[("module", "flood")]))
            )]
        );
        assert_eq!(fx.dispatcher.bans().state("alice").unwrap().count, 1);
        assert!(fx.dispatcher.locks().is_empty());
    }

    #[tokio::test]
    async fn test_unbound_regex_module_is_skipped() {
        let fx = Fixture::new();
        fx.registry.register(RegexModule::new("hollow"));
        fx.registry.register(
            RegexModule::new("greet")
                .pattern(r"hello", MatchMode::Match, regex_record(&fx.log, "greet"))
                .unwrap(),
        );
        fx.senders.enable("group", "hollow");
        fx.senders.enable("group", "greet");
        let session = RecordingSession::new("alice", "group");

        let report = fx.send(&session, "hello").await;

        assert_eq!(report.halted, None);
        assert_eq!(report.triggers, 1);
        assert_eq!(fx.log(), vec!["greet:hello"]);
        assert!(session.replies().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_evicts_stale_state() {
        let fx = Fixture::new();
        fx.registry.register(command(&fx.log, "ping"));
        let session = RecordingSession::new("alice", "group");
        fx.send(&session, "~ping").await;
        fx.dispatcher.bans().on_violation("bob", Instant::now());

        assert_eq!(fx.dispatcher.sweep(Instant::now()), SweepReport::default());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(
            fx.dispatcher.sweep(Instant::now()),
            SweepReport {
                counters: 1,
                bans: 1
            }
        );
        assert_eq!(fx.dispatcher.abuse().tracked(), 0);
        assert_eq!(fx.dispatcher.bans().tracked(), 0);
    }
}
