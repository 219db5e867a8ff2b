//! 可见性过滤器模块
//!
//! 判断一个文本节点是否值得翻译：存在渲染父元素、父元素可见、
//! 父元素不在排除标签集合内、去除首尾空白后至少有最小长度。
//! 过滤是纯判断，不修改 DOM。

use std::collections::HashSet;

use markup5ever_rcdom::{Handle, NodeData};

use crate::parsers::css::parse_inline_style;
use crate::parsers::html::dom::{get_node_attr, get_node_name, get_parent_element, get_parent_node};
use crate::translation::config::constants;

/// 文本节点被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// 不是文本节点
    NotText,
    /// 没有渲染父元素（已脱离文档）
    NoParent,
    /// 父元素在排除集合内
    ExcludedTag,
    /// 父元素或其祖先不可见
    Hidden,
    /// 文本过短
    TooShort,
}

/// 可见性过滤器
#[derive(Debug, Clone)]
pub struct VisibilityFilter {
    skip_elements: HashSet<String>,
    min_text_length: usize,
}

impl VisibilityFilter {
    pub fn new<I, S>(skip_elements: I, min_text_length: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            skip_elements: skip_elements
                .into_iter()
                .map(|tag| tag.as_ref().to_ascii_lowercase())
                .collect(),
            min_text_length,
        }
    }

    /// 文本节点是否可翻译
    pub fn is_eligible(&self, node: &Handle) -> bool {
        self.check(node).is_ok()
    }

    /// 检查文本节点，返回拒绝原因
    pub fn check(&self, node: &Handle) -> Result<(), Rejection> {
        let text = match &node.data {
            NodeData::Text { contents } => contents.borrow(),
            _ => return Err(Rejection::NotText),
        };

        let parent = get_parent_element(node).ok_or(Rejection::NoParent)?;

        if !is_rendered(&parent) {
            return Err(Rejection::Hidden);
        }

        if get_node_name(&parent).is_some_and(|tag| self.is_skipped_tag(tag)) {
            return Err(Rejection::ExcludedTag);
        }

        if text.trim().chars().count() < self.min_text_length {
            return Err(Rejection::TooShort);
        }

        Ok(())
    }

    pub fn is_skipped_tag(&self, tag: &str) -> bool {
        self.skip_elements.contains(&tag.to_ascii_lowercase())
    }

    pub fn min_text_length(&self) -> usize {
        self.min_text_length
    }
}

impl Default for VisibilityFilter {
    fn default() -> Self {
        Self::new(constants::SKIP_ELEMENTS.iter(), constants::MIN_TEXT_LENGTH)
    }
}

/// 元素是否被渲染
///
/// 自身或任一祖先声明 `display: none`（或带 `hidden` 属性）时不渲染；
/// `visibility` 由最近的声明决定。
pub fn is_rendered(element: &Handle) -> bool {
    let mut visibility_hidden: Option<bool> = None;
    let mut current = Some(element.clone());

    while let Some(node) = current {
        if let NodeData::Element { .. } = node.data {
            if get_node_attr(&node, "hidden").is_some() {
                return false;
            }

            if let Some(style) = get_node_attr(&node, "style") {
                let style = parse_inline_style(&style);
                if style.display_none() {
                    return false;
                }
                if visibility_hidden.is_none() {
                    visibility_hidden = style.visibility().map(|v| v.hides());
                }
            }
        }

        current = get_parent_node(&node);
    }

    !visibility_hidden.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{detach_node, html_to_dom};
    use markup5ever_rcdom::RcDom;

    fn text_nodes(node: &Handle, out: &mut Vec<Handle>) {
        if let NodeData::Text { .. } = node.data {
            out.push(node.clone());
        }
        for child in node.children.borrow().iter() {
            text_nodes(child, out);
        }
    }

    fn first_text_containing(html: &str, needle: &str) -> (RcDom, Handle) {
        let dom = html_to_dom(html.as_bytes(), "utf-8");
        let mut nodes = Vec::new();
        text_nodes(&dom.document, &mut nodes);
        let node = nodes
            .into_iter()
            .find(|n| {
                if let NodeData::Text { contents } = &n.data {
                    contents.borrow().contains(needle)
                } else {
                    false
                }
            })
            .unwrap();
        (dom, node)
    }

    #[test]
    fn test_plain_text_is_eligible() {
        let (_dom, node) = first_text_containing("<p>Hello</p>", "Hello");
        assert!(VisibilityFilter::default().is_eligible(&node));
    }

    #[test]
    fn test_excluded_tags() {
        let filter = VisibilityFilter::default();
        for tag in ["code", "pre", "script", "style", "textarea", "option"] {
            let html = format!("<div><{tag}>Skip me</{tag}></div>");
            let (_dom, node) = first_text_containing(&html, "Skip me");
            assert_eq!(filter.check(&node), Err(Rejection::ExcludedTag), "tag {}", tag);
        }
    }

    #[test]
    fn test_only_direct_parent_tag_is_checked() {
        let (_dom, node) = first_text_containing("<pre><span>Inside span</span></pre>", "Inside span");
        assert!(VisibilityFilter::default().is_eligible(&node));
    }

    #[test]
    fn test_short_and_whitespace_text() {
        let filter = VisibilityFilter::default();
        let (_dom, node) = first_text_containing("<p>a</p>", "a");
        assert_eq!(filter.check(&node), Err(Rejection::TooShort));

        let (_dom, node) = first_text_containing("<p>   x  </p>", "x");
        assert_eq!(filter.check(&node), Err(Rejection::TooShort));
    }

    #[test]
    fn test_hidden_by_inline_style() {
        let filter = VisibilityFilter::default();
        let (_dom, node) = first_text_containing("<p style=\"display:none\">Gone</p>", "Gone");
        assert_eq!(filter.check(&node), Err(Rejection::Hidden));

        let (_dom, node) = first_text_containing(
            "<div style=\"visibility: hidden\"><span>Ghost</span></div>",
            "Ghost",
        );
        assert_eq!(filter.check(&node), Err(Rejection::Hidden));
    }

    #[test]
    fn test_nearest_visibility_wins() {
        let (_dom, node) = first_text_containing(
            "<div style=\"visibility:hidden\"><span style=\"visibility:visible\">Shown</span></div>",
            "Shown",
        );
        assert!(VisibilityFilter::default().is_eligible(&node));
    }

    #[test]
    fn test_hidden_ancestor_and_attribute() {
        let filter = VisibilityFilter::default();
        let (_dom, node) = first_text_containing(
            "<section style=\"display: none\"><p><b>Deep</b></p></section>",
            "Deep",
        );
        assert_eq!(filter.check(&node), Err(Rejection::Hidden));

        let (_dom, node) = first_text_containing("<div hidden><p>Secret</p></div>", "Secret");
        assert_eq!(filter.check(&node), Err(Rejection::Hidden));
    }

    #[test]
    fn test_detached_text_has_no_parent() {
        let (_dom, node) = first_text_containing("<p>Detached</p>", "Detached");
        detach_node(&node);
        assert_eq!(VisibilityFilter::default().check(&node), Err(Rejection::NoParent));
    }

    #[test]
    fn test_custom_skip_list() {
        let filter = VisibilityFilter::new(["SPAN"], 2);
        let (_dom, node) = first_text_containing("<p><span>Custom</span></p>", "Custom");
        assert!(filter.is_skipped_tag("span"));
        assert_eq!(filter.check(&node), Err(Rejection::ExcludedTag));
        assert_eq!(filter.min_text_length(), 2);
    }
}
