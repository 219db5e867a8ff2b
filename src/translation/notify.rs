//! 用户可见的通知
//!
//! 通知是即发即忘的：发送方不等待、不关心结果，通知失败不会影响翻译周期。

use tokio::sync::mpsc;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// 一条短暂显示的通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// 通知接收端
pub trait Notifier: Send + Sync {
    /// 必须立即返回
    fn notify(&self, notice: Notice);
}

/// 把通知写入日志的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!("✓ {}", notice.message),
            NoticeLevel::Error => tracing::warn!("✗ {}", notice.message),
        }
    }
}

/// 把通知转发到通道，接收端关闭后静默丢弃
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.tx.send(notice).is_err() {
            tracing::debug!("通知接收端已关闭，丢弃通知");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_notifier_forwards() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Notice::success("ok"));
        notifier.notify(Notice::error("bad"));

        assert_eq!(rx.try_recv().unwrap(), Notice::success("ok"));
        assert_eq!(rx.try_recv().unwrap().level, NoticeLevel::Error);
    }

    #[test]
    fn test_closed_channel_is_not_fatal() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Notice::success("nobody listening"));
        TracingNotifier.notify(Notice::error("logged only"));
    }
}
