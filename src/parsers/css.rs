//! 内联样式解析模块
//!
//! 页面没有层叠计算引擎，元素是否渲染只由其 `style` 属性中的声明决定。
//! 此模块使用 cssparser 对声明块进行分词，提取 `display` 和 `visibility`
//! 等与可见性相关的属性。

use cssparser::{Parser, ParserInput, Token};

/// 单条样式声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub value: String,
    pub important: bool,
}

/// `visibility` 属性的取值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
    Collapse,
}

impl Visibility {
    fn from_value(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "visible" => Some(Visibility::Visible),
            "hidden" => Some(Visibility::Hidden),
            "collapse" => Some(Visibility::Collapse),
            _ => None,
        }
    }

    /// 是否隐藏内容
    pub fn hides(self) -> bool {
        !matches!(self, Visibility::Visible)
    }
}

/// 解析后的内联样式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    declarations: Vec<Declaration>,
}

impl InlineStyle {
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// 获取属性的生效值
    ///
    /// 后出现的声明覆盖先出现的，`!important` 声明不会被普通声明覆盖。
    pub fn get(&self, property: &str) -> Option<&str> {
        let mut winner: Option<&Declaration> = None;

        for declaration in self.declarations.iter().filter(|d| d.name == property) {
            match winner {
                Some(current) if current.important && !declaration.important => {}
                _ => winner = Some(declaration),
            }
        }

        winner.map(|d| d.value.as_str())
    }

    /// 是否声明了 `display: none`
    pub fn display_none(&self) -> bool {
        self.get("display")
            .is_some_and(|value| value.eq_ignore_ascii_case("none"))
    }

    /// 声明的 `visibility`，未声明或取值无法识别时为 `None`
    pub fn visibility(&self) -> Option<Visibility> {
        self.get("visibility").and_then(Visibility::from_value)
    }
}

/// 解析 `style` 属性内容
///
/// 无效的声明会被跳过，不影响后续声明。
pub fn parse_inline_style(style: &str) -> InlineStyle {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);

    let mut declarations = Vec::new();
    let mut name: Option<String> = None;
    let mut value_start = None;
    let mut invalid = false;

    loop {
        let token_offset = parser.position();
        let next = parser.next().cloned();
        let token = match next {
            Ok(token) => token,
            Err(_) => {
                if let (Some(name), Some(start), false) = (name.take(), value_start, invalid) {
                    push_declaration(&mut declarations, name, parser.slice_from(start));
                }
                break;
            }
        };

        match token {
            Token::Semicolon => {
                if let (Some(name), Some(start), false) = (name.take(), value_start, invalid) {
                    push_declaration(&mut declarations, name, parser.slice(start..token_offset));
                }
                name = None;
                value_start = None;
                invalid = false;
            }
            Token::Ident(ident) if name.is_none() && !invalid => {
                name = Some(ident.to_ascii_lowercase());
            }
            Token::Colon if name.is_some() && value_start.is_none() => {
                value_start = Some(parser.position());
            }
            _ if value_start.is_some() => {}
            _ => invalid = true,
        }
    }

    InlineStyle { declarations }
}

fn push_declaration(declarations: &mut Vec<Declaration>, name: String, raw_value: &str) {
    let raw_value = raw_value.trim();
    let (value, important) = match raw_value.rfind('!') {
        Some(index) if raw_value[index + 1..].trim().eq_ignore_ascii_case("important") => {
            (raw_value[..index].trim(), true)
        }
        _ => (raw_value, false),
    };

    if value.is_empty() {
        return;
    }

    declarations.push(Declaration {
        name,
        value: value.to_string(),
        important,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_none() {
        assert!(parse_inline_style("display:none").display_none());
        assert!(parse_inline_style("color: red; DISPLAY : None ;").display_none());
        assert!(!parse_inline_style("display: block").display_none());
        assert!(!parse_inline_style("").display_none());
    }

    #[test]
    fn test_later_declaration_wins() {
        let style = parse_inline_style("display: none; display: inline");
        assert!(!style.display_none());
        assert_eq!(style.get("display"), Some("inline"));
    }

    #[test]
    fn test_important_is_not_overridden() {
        let style = parse_inline_style("visibility: hidden !important; visibility: visible");
        assert_eq!(style.visibility(), Some(Visibility::Hidden));
        assert!(style.declarations()[0].important);
    }

    #[test]
    fn test_invalid_declarations_are_skipped() {
        let style = parse_inline_style("42px; : none; background: url(a.png); visibility: collapse");
        assert_eq!(style.get("background"), Some("url(a.png)"));
        assert_eq!(style.visibility(), Some(Visibility::Collapse));
        assert!(Visibility::Collapse.hides());
        assert_eq!(style.declarations().len(), 2);
    }

    #[test]
    fn test_unknown_visibility_value() {
        assert_eq!(parse_inline_style("visibility: inherit").visibility(), None);
    }
}
