// ABOUTME: Minimal CSS handling for the markup converter
// ABOUTME: Parses simple stylesheets, inline declarations and CSS lengths

use crate::layout::{PT_PER_PX, PX_PER_INCH};
use log::debug;
use std::collections::HashMap;

/// Property name to value, later insertions win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations(HashMap<String, String>);

impl Declarations {
    /// Parse the body of a rule or a `style` attribute: `a: b; c: d`.
    pub fn parse(text: &str) -> Self {
        let mut decls = Declarations::default();
        for item in text.split(';') {
            if let Some((name, value)) = item.split_once(':') {
                let name = name.trim().to_ascii_lowercase();
                let value = value.trim().trim_end_matches("!important").trim();
                if !name.is_empty() && !value.is_empty() {
                    decls.0.insert(name, value.to_string());
                }
            }
        }
        decls
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Copy every declaration of `other` over this one.
    pub fn merge(&mut self, other: &Declarations) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Background color from `background-color` or a plain `background`.
    pub fn background_color(&self) -> Option<&str> {
        self.get("background-color").or_else(|| {
            self.get("background")
                .filter(|v| !v.contains("url(") && !v.contains("gradient"))
        })
    }

    /// Target of `background-image: url(...)` or `background: url(...)`.
    pub fn background_image(&self) -> Option<String> {
        let value = self.get("background-image").or_else(|| self.get("background"))?;
        let start = value.find("url(")? + 4;
        let end = value[start..].find(')')? + start;
        let target = value[start..end].trim().trim_matches(|c| c == '"' || c == '\'');
        Some(target.to_string())
    }

    pub fn has_gradient(&self) -> bool {
        ["background", "background-image"]
            .iter()
            .filter_map(|p| self.get(p))
            .any(|v| v.contains("gradient("))
    }

    /// Border color and width in points, when a visible border is declared.
    pub fn border(&self) -> Option<(String, f64)> {
        let value = self.get("border")?;
        if value == "none" || value == "0" {
            return None;
        }
        let mut width_pt = 0.75;
        let mut color = None;
        for token in value.split_whitespace() {
            if let Some(len) = Length::parse(token) {
                width_pt = len.to_pt(16.0);
            } else if !matches!(token, "solid" | "dashed" | "dotted" | "double") {
                color = Some(token.to_string());
            }
        }
        if width_pt <= 0.0 {
            return None;
        }
        Some((color.unwrap_or_else(|| "#000000".to_string()), width_pt))
    }
}

/// A CSS length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Pt(f64),
    In(f64),
    Em(f64),
    Percent(f64),
}

impl Length {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        let split = value
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(value.len());
        let (number, unit) = value.split_at(split);
        let number: f64 = number.parse().ok()?;
        match unit.trim() {
            "px" => Some(Length::Px(number)),
            "" if number == 0.0 => Some(Length::Px(0.0)),
            "pt" => Some(Length::Pt(number)),
            "in" => Some(Length::In(number)),
            "cm" => Some(Length::In(number / 2.54)),
            "mm" => Some(Length::In(number / 25.4)),
            "em" | "rem" => Some(Length::Em(number)),
            "%" => Some(Length::Percent(number)),
            _ => None,
        }
    }

    /// Resolve to points; `em` is relative to `font_size_pt`.
    pub fn to_pt(self, font_size_pt: f64) -> f64 {
        match self {
            Length::Px(v) => v * PT_PER_PX,
            Length::Pt(v) => v,
            Length::In(v) => v * 72.0,
            Length::Em(v) => v * font_size_pt,
            Length::Percent(v) => v / 100.0 * font_size_pt,
        }
    }

    /// Resolve to inches; percentages are relative to `reference_in`.
    pub fn to_inches(self, font_size_pt: f64, reference_in: f64) -> f64 {
        match self {
            Length::Px(v) => v / PX_PER_INCH,
            Length::Percent(v) => v / 100.0 * reference_in,
            other => other.to_pt(font_size_pt) / 72.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Selector {
    tag: Option<String>,
    class: Option<String>,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty()
            || text.contains(|c: char| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '['))
        {
            return None;
        }
        let (tag, class) = match text.split_once('.') {
            Some((tag, class)) => (tag, Some(class)),
            None => (text, None),
        };
        if class.map_or(false, |c| c.contains('.')) || tag.starts_with('#') {
            return None;
        }
        Some(Selector {
            tag: (!tag.is_empty() && tag != "*").then(|| tag.to_ascii_lowercase()),
            class: class.map(str::to_string),
        })
    }

    fn specificity(&self) -> u8 {
        u8::from(self.tag.is_some()) + 10 * u8::from(self.class.is_some())
    }

    fn matches(&self, tag: &str, classes: &[String]) -> bool {
        self.tag.as_deref().map_or(true, |t| t == tag)
            && self
                .class
                .as_deref()
                .map_or(true, |c| classes.iter().any(|k| k == c))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    order: usize,
    declarations: Declarations,
}

/// Rules from `<style>` blocks. Only type, class and `type.class`
/// selectors are understood; anything else is skipped.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    pub fn parse(text: &str) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.add(text);
        sheet
    }

    /// Append the rules of another `<style>` block.
    pub fn add(&mut self, text: &str) {
        let text = strip_comments(text);
        let mut rest = text.as_str();
        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let body_start = open + 1;
            let Some(body_len) = matching_brace(&rest[body_start..]) else {
                break;
            };
            let body = &rest[body_start..body_start + body_len];
            rest = &rest[body_start + body_len + 1..];

            if prelude.starts_with('@') {
                debug!("Skipping at-rule {}", prelude);
                continue;
            }
            let declarations = Declarations::parse(body);
            for part in prelude.split(',') {
                match Selector::parse(part) {
                    Some(selector) => self.rules.push(Rule {
                        selector,
                        order: self.rules.len(),
                        declarations: declarations.clone(),
                    }),
                    None => debug!("Ignoring unsupported selector {:?}", part.trim()),
                }
            }
        }
    }

    /// Cascaded declarations for an element, by specificity then order.
    pub fn declarations_for(&self, tag: &str, classes: &[String]) -> Declarations {
        let mut matching: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.selector.matches(tag, classes))
            .collect();
        matching.sort_by_key(|r| (r.selector.specificity(), r.order));
        let mut decls = Declarations::default();
        for rule in matching {
            decls.merge(&rule.declarations);
        }
        decls
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Length of the block up to the brace closing an already opened one.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 1usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
