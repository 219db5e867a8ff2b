//! 变更调度器
//!
//! 把页面上的 DOM 变更合并为防抖后的翻译周期。调度器是一个运行在 `LocalSet` 上的
//! actor，通过 [`SchedulerHandle`] 接收命令：
//!
//! - 变更通知：自动翻译开启时重置防抖计时器，计时器到期后开始一个周期
//! - 立即翻译：直接尝试开始周期，周期结束后应答
//! - 切换自动翻译：翻转开关，打开时立即尝试开始周期
//!
//! 状态机为 `Idle → Debouncing → Cycling → Idle`。同一时刻最多一个周期，
//! 周期运行期间到期的防抖会在周期结束后补跑一次。

use std::rc::Rc;
use std::time::Duration;

use markup5ever_rcdom::Handle;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::translation::core::{CycleReport, CycleTrigger, TranslationService};
use crate::translation::error::{TranslationError, TranslationResult};

const EVENT_CAPACITY: usize = 16;

/// 调度器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Debouncing,
    Cycling,
}

/// 一个周期结束后广播的事件
#[derive(Debug, Clone)]
pub struct CycleEvent {
    pub trigger: CycleTrigger,
    pub result: Result<CycleReport, TranslationError>,
}

/// "立即翻译"命令的应答
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    Completed(CycleReport),
    Failed(TranslationError),
    /// 已有周期在运行，本次命令未产生新周期
    Busy,
}

enum Command {
    Mutation,
    ApplyNow(oneshot::Sender<ApplyOutcome>),
    Toggle(oneshot::Sender<bool>),
    Shutdown,
}

/// 调度器句柄，可克隆
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SchedulerState>,
    enabled: watch::Receiver<bool>,
    events: broadcast::Sender<CycleEvent>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Command::Mutation => "Mutation",
            Command::ApplyNow(_) => "ApplyNow",
            Command::Toggle(_) => "Toggle",
            Command::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

impl SchedulerHandle {
    /// 报告一次 DOM 变更（新增或删除了子节点）
    pub fn notify_mutation(&self) -> TranslationResult<()> {
        self.send(Command::Mutation)
    }

    /// 立即翻译，周期结束后返回
    pub async fn apply_now(&self) -> TranslationResult<ApplyOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::ApplyNow(reply))?;
        rx.await
            .map_err(|_| TranslationError::DeliveryError("调度器在应答前已停止".to_string()))
    }

    /// 切换自动翻译，返回新的开关状态
    pub async fn toggle_auto_translate(&self) -> TranslationResult<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Toggle(reply))?;
        rx.await
            .map_err(|_| TranslationError::DeliveryError("调度器在应答前已停止".to_string()))
    }

    /// 当前状态
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// 状态变化的订阅端
    pub fn watch_state(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// 自动翻译是否开启
    pub fn auto_translate_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// 订阅周期结束事件
    pub fn subscribe(&self) -> broadcast::Receiver<CycleEvent> {
        self.events.subscribe()
    }

    /// 停止调度器，正在运行的周期会继续跑完
    pub fn shutdown(&self) -> TranslationResult<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> TranslationResult<()> {
        self.commands
            .send(command)
            .map_err(|e| TranslationError::DeliveryError(format!("调度器已停止，无法投递 {:?}", e.0)))
    }
}

/// 变更调度器
pub struct MutationScheduler {
    service: Rc<TranslationService>,
    document: Handle,
    debounce: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    done_tx: mpsc::UnboundedSender<CycleTrigger>,
    done_rx: mpsc::UnboundedReceiver<CycleTrigger>,
    state: watch::Sender<SchedulerState>,
    enabled: watch::Sender<bool>,
    events: broadcast::Sender<CycleEvent>,
    deadline: Option<Instant>,
    pending_rerun: bool,
}

impl MutationScheduler {
    /// 构造调度器，自动翻译开关取自当前设置（读取失败时默认开启）
    pub fn new(
        service: Rc<TranslationService>,
        document: Handle,
        debounce: Duration,
    ) -> (Self, SchedulerHandle) {
        let auto_translate = match service.settings_provider().get_settings() {
            Ok(settings) => settings.auto_translate,
            Err(e) => {
                tracing::warn!("读取设置失败，默认开启自动翻译: {}", e);
                true
            }
        };

        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(SchedulerState::Idle);
        let (enabled, enabled_rx) = watch::channel(auto_translate);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = SchedulerHandle {
            commands: commands_tx,
            state: state_rx,
            enabled: enabled_rx,
            events: events.clone(),
        };

        let scheduler = Self {
            service,
            document,
            debounce,
            commands,
            done_tx,
            done_rx,
            state,
            enabled,
            events,
            deadline: None,
            pending_rerun: false,
        };

        (scheduler, handle)
    }

    /// 在当前 `LocalSet` 上启动调度器
    pub fn spawn_local(
        service: Rc<TranslationService>,
        document: Handle,
        debounce: Duration,
    ) -> (SchedulerHandle, JoinHandle<()>) {
        let (scheduler, handle) = Self::new(service, document, debounce);
        let task = tokio::task::spawn_local(scheduler.run());
        (handle, task)
    }

    /// 调度循环，直到收到停止命令或所有句柄被丢弃
    pub async fn run(mut self) {
        tracing::debug!(
            "调度器启动: 自动翻译={}, 防抖={:?}",
            self.is_enabled(),
            self.debounce
        );

        if self.is_enabled() {
            self.start_cycle(CycleTrigger::InitialLoad, None);
        }

        loop {
            let deadline = self.deadline;
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(trigger) = self.done_rx.recv() => self.on_cycle_done(trigger),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_debounce_elapsed();
                }
            }
        }

        self.deadline = None;
        if !self.service.is_cycling() {
            self.set_state(SchedulerState::Idle);
        }
        tracing::debug!("调度器已停止");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Mutation => self.on_mutation(),
            Command::ApplyNow(reply) => {
                self.start_cycle(CycleTrigger::ApplyNow, Some(reply));
            }
            Command::Toggle(reply) => {
                let enabled = !self.is_enabled();
                self.enabled.send_replace(enabled);
                tracing::info!("自动翻译已{}", if enabled { "开启" } else { "关闭" });

                if enabled {
                    self.start_cycle(CycleTrigger::Toggle, None);
                } else {
                    self.deadline = None;
                    self.pending_rerun = false;
                    if !self.service.is_cycling() {
                        self.set_state(SchedulerState::Idle);
                    }
                }
                let _ = reply.send(enabled);
            }
            Command::Shutdown => {}
        }
    }

    fn on_mutation(&mut self) {
        if !self.is_enabled() {
            return;
        }

        self.deadline = Some(Instant::now() + self.debounce);
        if !self.service.is_cycling() {
            self.set_state(SchedulerState::Debouncing);
        }
    }

    fn on_debounce_elapsed(&mut self) {
        self.deadline = None;
        if !self.is_enabled() {
            return;
        }

        if self.service.is_cycling() {
            tracing::debug!("防抖到期时周期仍在运行，结束后补跑");
            self.pending_rerun = true;
            return;
        }

        self.start_cycle(CycleTrigger::Mutation, None);
    }

    fn on_cycle_done(&mut self, trigger: CycleTrigger) {
        tracing::debug!("{} 周期结束", trigger);

        // 仍有未到期的防抖时由它补跑，排队的补跑随之作废
        let rerun = std::mem::take(&mut self.pending_rerun);
        if rerun && self.is_enabled() && self.deadline.is_none() {
            self.start_cycle(CycleTrigger::Mutation, None);
            return;
        }

        if self.deadline.is_some() {
            self.set_state(SchedulerState::Debouncing);
        } else {
            self.set_state(SchedulerState::Idle);
        }
    }

    /// 尝试开始一个周期，已有周期运行时应答 `Busy` 并返回 `false`
    fn start_cycle(&mut self, trigger: CycleTrigger, reply: Option<oneshot::Sender<ApplyOutcome>>) -> bool {
        let Some(guard) = self.service.begin_cycle() else {
            tracing::debug!("已有周期在运行，忽略 {} 触发", trigger);
            if let Some(reply) = reply {
                let _ = reply.send(ApplyOutcome::Busy);
            }
            return false;
        };

        self.set_state(SchedulerState::Cycling);

        let service = Rc::clone(&self.service);
        let document = self.document.clone();
        let events = self.events.clone();
        let done = self.done_tx.clone();

        tokio::task::spawn_local(async move {
            let result = service.run_cycle_with_guard(guard, &document, trigger).await;

            // 没有订阅者时发送失败，忽略
            let _ = events.send(CycleEvent {
                trigger,
                result: result.clone(),
            });
            if let Some(reply) = reply {
                let _ = reply.send(match result {
                    Ok(report) => ApplyOutcome::Completed(report),
                    Err(e) => ApplyOutcome::Failed(e),
                });
            }
            let _ = done.send(trigger);
        });

        true
    }

    fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }
}
