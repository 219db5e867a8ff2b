use std::io;

use encoding_rs::Encoding;
use html5ever::serialize::{serialize, SerializeOpts};
use markup5ever_rcdom::{RcDom, SerializableHandle};

/// 序列化文档
///
/// 按文档原始编码输出字节，编码为空或无法识别时输出 UTF-8。
pub fn serialize_document(dom: &RcDom, document_encoding: &str) -> io::Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();

    let serializable: SerializableHandle = dom.document.clone().into();
    serialize(&mut buf, &serializable, SerializeOpts::default())?;

    if !document_encoding.is_empty() {
        if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
            if encoding != encoding_rs::UTF_8 {
                let s: &str = &String::from_utf8_lossy(&buf);
                let (data, _, _) = encoding.encode(s);
                buf = data.to_vec();
            }
        }
    }

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::super::dom::{find_body, html_to_dom, set_text};
    use super::*;

    #[test]
    fn test_serialize_reflects_text_changes() {
        let dom = html_to_dom(b"<html><body><p>Hello</p></body></html>", "utf-8");
        let body = find_body(&dom.document).unwrap();
        let p = body.children.borrow()[0].clone();
        let text = p.children.borrow()[0].clone();
        set_text(&text, "Bonjour");

        let html = String::from_utf8(serialize_document(&dom, "utf-8").unwrap()).unwrap();
        assert!(html.contains("<p>Bonjour</p>"));
    }

    #[test]
    fn test_serialize_with_legacy_encoding() {
        let dom = html_to_dom("<html><body><p>café</p></body></html>".as_bytes(), "utf-8");
        let bytes = serialize_document(&dom, "windows-1252").unwrap();
        assert!(bytes.contains(&0xE9));
    }
}
