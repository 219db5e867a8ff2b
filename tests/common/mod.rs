// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::rc::Rc;
use std::sync::Arc;

use html5ever::tendril::TendrilSink;
use html5ever::parse_document;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tokio::sync::mpsc::UnboundedReceiver;

use page_translator::parsers::html::dom::{append_html, find_body};
use page_translator::translation::config::{Settings, StaticSettings, TranslationConfig};
use page_translator::translation::core::TranslationService;
use page_translator::translation::notify::{ChannelNotifier, Notice};
use page_translator::translation::oracle::{MockMode, MockOracle};

/// 测试环境：模拟端点 + 可变设置 + 通知通道 + 翻译服务
#[allow(dead_code)]
pub struct TestEnvironment {
    pub oracle: Arc<MockOracle>,
    pub settings: Arc<StaticSettings>,
    pub config: TranslationConfig,
    pub notices: UnboundedReceiver<Notice>,
    pub service: Rc<TranslationService>,
}

#[allow(dead_code)]
impl TestEnvironment {
    pub fn new(mode: MockMode) -> Self {
        Self::with_parts(Arc::new(MockOracle::new(mode)), Settings::new("test-key"), TranslationConfig::default())
    }

    pub fn with_settings(mode: MockMode, settings: Settings) -> Self {
        Self::with_parts(Arc::new(MockOracle::new(mode)), settings, TranslationConfig::default())
    }

    pub fn with_parts(oracle: Arc<MockOracle>, settings: Settings, config: TranslationConfig) -> Self {
        let settings = Arc::new(StaticSettings::new(settings));
        let (notifier, notices) = ChannelNotifier::new();
        let service = TranslationService::new(settings.clone(), oracle.clone(), &config)
            .with_notifier(Arc::new(notifier));

        Self {
            oracle,
            settings,
            config,
            notices,
            service: Rc::new(service),
        }
    }

    /// 取出目前收到的所有通知
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }
}

/// HTML 测试辅助
pub struct HtmlTestHelper;

#[allow(dead_code)]
impl HtmlTestHelper {
    pub fn create_test_dom(html: &str) -> RcDom {
        parse_document(RcDom::default(), Default::default()).one(html)
    }

    pub fn body(dom: &RcDom) -> Handle {
        find_body(&dom.document).unwrap_or_else(|| dom.document.clone())
    }

    /// 模拟页面动态插入内容
    pub fn insert(dom: &RcDom, fragment: &str) -> Vec<Handle> {
        append_html(&Self::body(dom), fragment)
    }

    /// 文档中所有文本节点的内容（按文档顺序，去掉纯空白节点）
    pub fn texts(dom: &RcDom) -> Vec<String> {
        let mut texts = Vec::new();
        let mut stack = vec![dom.document.clone()];
        while let Some(node) = stack.pop() {
            if let NodeData::Text { ref contents } = node.data {
                let text = contents.borrow().to_string();
                if !text.trim().is_empty() {
                    texts.push(text);
                }
            }
            for child in node.children.borrow().iter().rev() {
                stack.push(child.clone());
            }
        }
        texts
    }

    pub fn simple_page() -> &'static str {
        r#"<!DOCTYPE html>
<html>
<head><title>Test Page</title><style>p { color: red; }</style></head>
<body>
  <h1>Welcome</h1>
  <p>First paragraph</p>
  <p>Second paragraph</p>
  <script>var greeting = "Hello";</script>
</body>
</html>"#
    }
}

/// 测试数据生成器
pub struct TestDataGenerator;

#[allow(dead_code)]
impl TestDataGenerator {
    /// 生成包含 `count` 个段落的页面，段落内容为 "Paragraph N"
    pub fn paragraphs(count: usize) -> String {
        let body: String = (1..=count)
            .map(|i| format!("<p>Paragraph {}</p>", i))
            .collect();
        format!("<html><body>{}</body></html>", body)
    }
}
