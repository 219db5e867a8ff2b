//! 变更调度集成测试
//!
//! 使用暂停的 tokio 时钟验证防抖、单飞与开关行为

use std::sync::Arc;
use std::time::Duration;

use tokio::task::LocalSet;
use tokio::time::Instant;

use page_translator::translation::config::{Settings, TranslationConfig};
use page_translator::translation::core::{CycleOutcome, CycleTrigger};
use page_translator::translation::error::TranslationError;
use page_translator::translation::oracle::{MockMode, MockOracle};
use page_translator::translation::scheduler::{
    ApplyOutcome, MutationScheduler, SchedulerHandle, SchedulerState,
};

mod common {
    include!("common/mod.rs");
}

use common::{HtmlTestHelper, TestEnvironment};

const DEBOUNCE: Duration = Duration::from_millis(350);

fn environment(mode: MockMode, delay: Duration, auto_translate: bool) -> TestEnvironment {
    TestEnvironment::with_parts(
        Arc::new(MockOracle::with_delay(mode, delay)),
        Settings::new("test-key").with_auto_translate(auto_translate),
        TranslationConfig::default(),
    )
}

async fn wait_idle(handle: &SchedulerHandle) {
    let mut state = handle.watch_state();
    state
        .wait_for(|s| *s == SchedulerState::Idle)
        .await
        .unwrap();
}

/// 两次相隔 100ms 的变更合并为一个周期，周期在第二次变更 350ms 之后开始
#[tokio::test(start_paused = true)]
async fn test_mutations_are_coalesced_by_debounce() {
    LocalSet::new()
        .run_until(async {
            let env = environment(MockMode::Suffix(" [fr]".to_string()), Duration::ZERO, true);
            let dom = HtmlTestHelper::create_test_dom("<html><body></body></html>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);
            let mut events = handle.subscribe();

            let initial = events.recv().await.unwrap();
            assert_eq!(initial.trigger, CycleTrigger::InitialLoad);
            assert_eq!(initial.result.unwrap().outcome, CycleOutcome::NothingToTranslate);

            HtmlTestHelper::insert(&dom, "<p>First insert</p>");
            handle.notify_mutation().unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;

            HtmlTestHelper::insert(&dom, "<p>Second insert</p>");
            let second_mutation = Instant::now();
            handle.notify_mutation().unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(handle.state(), SchedulerState::Debouncing);

            let event = events.recv().await.unwrap();
            assert_eq!(event.trigger, CycleTrigger::Mutation);
            assert_eq!(event.result.unwrap().changed, 2);

            let calls = env.oracle.calls();
            assert_eq!(calls.len(), 1);
            assert!(calls[0].at >= second_mutation + DEBOUNCE);
            let texts: Vec<&str> = calls[0].strings.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(texts, vec!["First insert", "Second insert"]);

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert_eq!(env.oracle.call_count(), 1);
            assert_eq!(handle.state(), SchedulerState::Idle);
        })
        .await;
}

/// 周期运行期间的手动触发不会启动第二个周期
#[tokio::test(start_paused = true)]
async fn test_apply_now_during_cycle_is_busy() {
    LocalSet::new()
        .run_until(async {
            let env = environment(
                MockMode::Suffix(" [fr]".to_string()),
                Duration::from_millis(500),
                false,
            );
            let dom = HtmlTestHelper::create_test_dom("<body><p>Hello there</p></body>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);

            let (first, second) = tokio::join!(handle.apply_now(), handle.apply_now());

            match first.unwrap() {
                ApplyOutcome::Completed(report) => assert_eq!(report.changed, 1),
                other => panic!("expected Completed, got {:?}", other),
            }
            assert!(matches!(second.unwrap(), ApplyOutcome::Busy));
            assert_eq!(env.oracle.call_count(), 1);
            assert_eq!(HtmlTestHelper::texts(&dom), vec!["Hello there [fr]"]);

            wait_idle(&handle).await;
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_apply_now_works_with_auto_translate_off() {
    LocalSet::new()
        .run_until(async {
            let env = environment(MockMode::Suffix(" [de]".to_string()), Duration::ZERO, false);
            let dom = HtmlTestHelper::create_test_dom("<body><p>Manual only</p></body>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);

            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(env.oracle.call_count(), 0, "关闭时不运行首次周期");

            let outcome = handle.apply_now().await.unwrap();
            assert!(matches!(outcome, ApplyOutcome::Completed(_)));
            assert_eq!(HtmlTestHelper::texts(&dom), vec!["Manual only [de]"]);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_toggle_controls_mutation_handling() {
    LocalSet::new()
        .run_until(async {
            let env = environment(MockMode::Suffix(" [fr]".to_string()), Duration::ZERO, false);
            let dom = HtmlTestHelper::create_test_dom("<body><p>Already here</p></body>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);
            let mut events = handle.subscribe();

            // 打开：立即运行一个周期
            assert!(handle.toggle_auto_translate().await.unwrap());
            assert!(handle.auto_translate_enabled());
            let event = events.recv().await.unwrap();
            assert_eq!(event.trigger, CycleTrigger::Toggle);
            assert_eq!(HtmlTestHelper::texts(&dom), vec!["Already here [fr]"]);

            // 关闭：变更被忽略
            assert!(!handle.toggle_auto_translate().await.unwrap());
            HtmlTestHelper::insert(&dom, "<p>Ignored insert</p>");
            handle.notify_mutation().unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            assert_eq!(env.oracle.call_count(), 1);
            assert_eq!(handle.state(), SchedulerState::Idle);

            // 再次打开：之前遗漏的内容被补上
            assert!(handle.toggle_auto_translate().await.unwrap());
            let event = events.recv().await.unwrap();
            assert_eq!(event.result.unwrap().changed, 1);
            assert_eq!(
                HtmlTestHelper::texts(&dom),
                vec!["Already here [fr]", "Ignored insert [fr]"]
            );
        })
        .await;
}

/// 防抖在周期运行期间到期，周期结束后补跑一次
#[tokio::test(start_paused = true)]
async fn test_debounce_during_cycle_reruns_after_completion() {
    LocalSet::new()
        .run_until(async {
            let env = environment(
                MockMode::Suffix(" [fr]".to_string()),
                Duration::from_secs(1),
                true,
            );
            let dom = HtmlTestHelper::create_test_dom("<body><p>Initial content</p></body>");
            let start = Instant::now();
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);
            let mut events = handle.subscribe();

            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(handle.state(), SchedulerState::Cycling);

            HtmlTestHelper::insert(&dom, "<p>Late content</p>");
            handle.notify_mutation().unwrap();

            let first = events.recv().await.unwrap();
            assert_eq!(first.trigger, CycleTrigger::InitialLoad);
            let second = events.recv().await.unwrap();
            assert_eq!(second.trigger, CycleTrigger::Mutation);

            let calls = env.oracle.calls();
            assert_eq!(calls.len(), 2);
            assert_eq!(calls[1].strings.len(), 1);
            assert_eq!(calls[1].strings[0].text, "Late content");
            assert!(calls[1].at >= start + Duration::from_secs(1));

            wait_idle(&handle).await;
            assert_eq!(
                HtmlTestHelper::texts(&dom),
                vec!["Initial content [fr]", "Late content [fr]"]
            );
        })
        .await;
}

/// 失败的周期释放单飞标志，之后的手动触发可以重试
#[tokio::test(start_paused = true)]
async fn test_failed_cycle_releases_guard() {
    LocalSet::new()
        .run_until(async {
            let env = environment(MockMode::Suffix(" [fr]".to_string()), Duration::ZERO, false);
            env.oracle.push_reply(MockMode::Error(TranslationError::TransportError {
                status: 429,
                body: "too many requests".to_string(),
            }));
            let dom = HtmlTestHelper::create_test_dom("<body><p>Retry me</p></body>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);

            match handle.apply_now().await.unwrap() {
                ApplyOutcome::Failed(TranslationError::TransportError { status, .. }) => {
                    assert_eq!(status, 429)
                }
                other => panic!("expected Failed, got {:?}", other),
            }
            wait_idle(&handle).await;
            assert!(!env.service.is_cycling());

            let outcome = handle.apply_now().await.unwrap();
            assert!(matches!(outcome, ApplyOutcome::Completed(_)));
            assert_eq!(HtmlTestHelper::texts(&dom), vec!["Retry me [fr]"]);
        })
        .await;
}

/// 周期运行期间防抖到期后又有新变更，结束时只由新的防抖启动一个周期
#[tokio::test(start_paused = true)]
async fn test_rearmed_debounce_replaces_queued_rerun() {
    LocalSet::new()
        .run_until(async {
            let env = environment(
                MockMode::Suffix(" [fr]".to_string()),
                Duration::from_secs(1),
                true,
            );
            let dom = HtmlTestHelper::create_test_dom("<body><p>Initial content</p></body>");
            let (handle, _task) =
                MutationScheduler::spawn_local(env.service.clone(), dom.document.clone(), DEBOUNCE);
            let mut events = handle.subscribe();

            // 10ms 的变更在 360ms 到期，此时首次周期仍在运行
            tokio::time::sleep(Duration::from_millis(10)).await;
            HtmlTestHelper::insert(&dom, "<p>Early insert</p>");
            handle.notify_mutation().unwrap();

            // 800ms 的变更把防抖推迟到 1150ms，晚于首次周期结束
            tokio::time::sleep(Duration::from_millis(790)).await;
            HtmlTestHelper::insert(&dom, "<p>Later insert</p>");
            handle.notify_mutation().unwrap();

            let first = events.recv().await.unwrap();
            assert_eq!(first.trigger, CycleTrigger::InitialLoad);
            let second = events.recv().await.unwrap();
            assert_eq!(second.trigger, CycleTrigger::Mutation);
            assert_eq!(second.result.unwrap().changed, 2);

            tokio::time::sleep(Duration::from_secs(5)).await;
            assert!(events.try_recv().is_err(), "不应再有第三个周期");
            assert_eq!(env.service.get_stats().snapshot().cycles_started, 2);
            assert_eq!(env.oracle.call_count(), 2);
            assert_eq!(handle.state(), SchedulerState::Idle);
            assert_eq!(
                HtmlTestHelper::texts(&dom),
                vec!["Initial content [fr]", "Early insert [fr]", "Later insert [fr]"]
            );
        })
        .await;
}
