//! HTML 文档元数据处理模块
//!
//! 读取翻译周期需要的文档级信息：页面语言、字符编码和标题。

use markup5ever_rcdom::{Handle, NodeData};

use super::dom::{find_nodes, get_node_attr};

/// 获取页面语言
///
/// 优先读取 `<html lang>`，其次是 `<meta name="language" content>`。
/// 结果转换为小写，未声明时返回 `None`。
pub fn get_page_lang(document: &Handle) -> Option<String> {
    let html_lang = find_nodes(document, vec!["html"])
        .first()
        .and_then(|html| get_node_attr(html, "lang"))
        .filter(|lang| !lang.trim().is_empty());

    let lang = html_lang.or_else(|| {
        find_nodes(document, vec!["html", "head", "meta"])
            .iter()
            .find(|meta| {
                get_node_attr(meta, "name")
                    .unwrap_or_default()
                    .eq_ignore_ascii_case("language")
            })
            .and_then(|meta| get_node_attr(meta, "content"))
    })?;

    let lang = lang.trim().to_lowercase();
    if lang.is_empty() {
        None
    } else {
        Some(lang)
    }
}

/// 页面语言是否已经是目标语言
///
/// 页面语言包含小写的目标语言标签时视为匹配，例如 `english-us` 匹配 `English`。
/// 语言代码与语言名称不会互相转换，`en` 不匹配 `English`。
pub fn page_lang_matches(page_lang: &str, target_lang: &str) -> bool {
    let target = target_lang.trim().to_lowercase();
    !page_lang.is_empty() && !target.is_empty() && page_lang.to_lowercase().contains(&target)
}

/// 获取文档字符编码
///
/// 支持 `<meta charset>` 以及 `<meta http-equiv="content-type" content="...; charset=...">`。
pub fn get_charset(node: &Handle) -> Option<String> {
    for meta_node in find_nodes(node, vec!["html", "head", "meta"]).iter() {
        if let Some(meta_charset_node_attr_value) = get_node_attr(meta_node, "charset") {
            return Some(meta_charset_node_attr_value);
        }

        if get_node_attr(meta_node, "http-equiv")
            .unwrap_or_default()
            .eq_ignore_ascii_case("content-type")
        {
            if let Some(content) = get_node_attr(meta_node, "content") {
                if let Some(charset) = charset_from_content_type(&content) {
                    return Some(charset);
                }
            }
        }
    }

    None
}

/// 从 Content-Type 值中提取 charset 参数
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| value.to_string())
        } else {
            None
        }
    })
}

/// 获取文档标题
pub fn get_title(node: &Handle) -> Option<String> {
    for title_node in find_nodes(node, vec!["html", "head", "title"]).iter() {
        for child_node in title_node.children.borrow().iter() {
            if let NodeData::Text { ref contents } = child_node.data {
                return Some(contents.borrow().to_string());
            }
        }
    }

    None
}
