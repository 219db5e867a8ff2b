//! HTML解析和处理模块
//!
//! - `dom`: 基础DOM操作
//! - `metadata`: 文档元数据处理
//! - `serializer`: 序列化功能

pub mod dom;
pub mod metadata;
pub mod serializer;

pub use dom::{
    append_html, detach_node, find_body, find_nodes, get_node_attr,
    get_node_name, get_parent_element, get_parent_node, get_text, html_to_dom, set_node_attr,
    set_text,
};
pub use metadata::{get_charset, get_page_lang, get_title, page_lang_matches};
pub use serializer::serialize_document;
