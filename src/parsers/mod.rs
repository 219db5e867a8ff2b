//! # 解析器模块
//!
//! - `html` - HTML文档解析、DOM操作、元数据处理
//! - `css` - 内联样式声明解析

pub mod css;
pub mod html;

pub use css::{parse_inline_style, InlineStyle, Visibility};
pub use html::{
    find_body, get_charset, get_page_lang, html_to_dom, page_lang_matches, serialize_document,
};
