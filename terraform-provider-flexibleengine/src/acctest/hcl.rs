//! HCL fixture builder
//!
//! Test configurations are built as [`Configuration`]s of resource and data
//! blocks. They render to HCL text through `Display` and are applied by the
//! harness block by block, resolving references against earlier state.

use anyhow::{anyhow, bail, Context};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum HclValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Traversal such as `flexibleengine_vpc_v1.test.id`
    Ref(String),
    List(Vec<HclValue>),
    Map(Vec<(String, HclValue)>),
}

impl HclValue {
    pub fn reference(expr: &str) -> Self {
        HclValue::Ref(expr.to_string())
    }

    pub fn map<K: Into<String>, V: Into<HclValue>>(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        HclValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Evaluate against already known object states
    pub fn resolve(&self, states: &HashMap<String, Value>) -> anyhow::Result<Value> {
        Ok(match self {
            HclValue::String(s) => Value::String(s.clone()),
            HclValue::Int(i) => Value::from(*i),
            HclValue::Float(f) => Value::from(*f),
            HclValue::Bool(b) => Value::Bool(*b),
            HclValue::Ref(expr) => resolve_reference(expr, states)?,
            HclValue::List(items) => Value::Array(
                items
                    .iter()
                    .map(|i| i.resolve(states))
                    .collect::<anyhow::Result<_>>()?,
            ),
            HclValue::Map(entries) => {
                let mut map = Map::new();
                for (k, v) in entries {
                    map.insert(k.clone(), v.resolve(states)?);
                }
                Value::Object(map)
            }
        })
    }
}

impl From<&str> for HclValue {
    fn from(s: &str) -> Self {
        HclValue::String(s.to_string())
    }
}

impl From<String> for HclValue {
    fn from(s: String) -> Self {
        HclValue::String(s)
    }
}

impl From<&String> for HclValue {
    fn from(s: &String) -> Self {
        HclValue::String(s.clone())
    }
}

impl From<i64> for HclValue {
    fn from(i: i64) -> Self {
        HclValue::Int(i)
    }
}

impl From<i32> for HclValue {
    fn from(i: i32) -> Self {
        HclValue::Int(i64::from(i))
    }
}

impl From<f64> for HclValue {
    fn from(f: f64) -> Self {
        HclValue::Float(f)
    }
}

impl From<bool> for HclValue {
    fn from(b: bool) -> Self {
        HclValue::Bool(b)
    }
}

impl<T: Into<HclValue>> From<Vec<T>> for HclValue {
    fn from(items: Vec<T>) -> Self {
        HclValue::List(items.into_iter().map(Into::into).collect())
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    // Literal `${` would start an interpolation
    out = out.replace("${", "$${");
    out.push('"');
    out
}

impl fmt::Display for HclValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HclValue::String(s) => write!(f, "{}", quote(s)),
            HclValue::Int(i) => write!(f, "{}", i),
            HclValue::Float(x) => write!(f, "{}", x),
            HclValue::Bool(b) => write!(f, "{}", b),
            HclValue::Ref(expr) => write!(f, "{}", expr),
            HclValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            HclValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} = {}", k, v)?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// Attributes and nested blocks of a block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    attributes: Vec<(String, HclValue)>,
    blocks: Vec<(String, Body)>,
}

impl Body {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, value: impl Into<HclValue>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    /// Attribute set to a traversal expression
    pub fn reference(self, name: &str, expr: &str) -> Self {
        self.attr(name, HclValue::reference(expr))
    }

    pub fn block(mut self, name: &str, body: Body) -> Self {
        self.blocks.push((name.to_string(), body));
        self
    }

    /// Resolve into a JSON object; repeated nested blocks become lists
    pub fn resolve(&self, states: &HashMap<String, Value>) -> anyhow::Result<Value> {
        let mut map = Map::new();
        for (name, value) in &self.attributes {
            let resolved = value
                .resolve(states)
                .with_context(|| format!("in attribute \"{}\"", name))?;
            map.insert(name.clone(), resolved);
        }
        for (name, body) in &self.blocks {
            let resolved = body.resolve(states)?;
            match map
                .entry(name.clone())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                Value::Array(items) => items.push(resolved),
                _ => bail!("\"{}\" is used as both an attribute and a block", name),
            }
        }
        Ok(Value::Object(map))
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        let width = self.attributes.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
        for (name, value) in &self.attributes {
            writeln!(f, "{}{:<width$} = {}", pad, name, value, width = width)?;
        }
        for (name, body) in &self.blocks {
            writeln!(f)?;
            writeln!(f, "{}{} {{", pad, name)?;
            body.write_indented(f, indent + 1)?;
            writeln!(f, "{}}}", pad)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Resource,
    Data,
}

/// Top-level `resource` or `data` block
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub type_name: String,
    pub name: String,
    pub body: Body,
}

impl Block {
    pub fn resource(type_name: &str, name: &str, body: Body) -> Self {
        Self {
            kind: BlockKind::Resource,
            type_name: type_name.to_string(),
            name: name.to_string(),
            body,
        }
    }

    pub fn data(type_name: &str, name: &str, body: Body) -> Self {
        Self {
            kind: BlockKind::Data,
            type_name: type_name.to_string(),
            name: name.to_string(),
            body,
        }
    }

    /// Address used in references and checks
    pub fn address(&self) -> String {
        match self.kind {
            BlockKind::Resource => format!("{}.{}", self.type_name, self.name),
            BlockKind::Data => format!("data.{}.{}", self.type_name, self.name),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self.kind {
            BlockKind::Resource => "resource",
            BlockKind::Data => "data",
        };
        writeln!(f, "{} \"{}\" \"{}\" {{", keyword, self.type_name, self.name)?;
        self.body.write_indented(f, 1)?;
        writeln!(f, "}}")
    }
}

/// A complete test configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub blocks: Vec<Block>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Append every block of `other`
    pub fn extend(mut self, other: Configuration) -> Self {
        self.blocks.extend(other.blocks);
        self
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

enum Step {
    Key(String),
    Index(usize),
}

fn parse_traversal(expr: &str) -> anyhow::Result<Vec<Step>> {
    let mut steps = Vec::new();
    for part in expr.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() {
            bail!("invalid reference \"{}\"", expr);
        }
        steps.push(match name.parse::<usize>() {
            Ok(index) => Step::Index(index),
            Err(_) => Step::Key(name.to_string()),
        });
        while let Some(stripped) = rest.strip_prefix('[') {
            let end = stripped
                .find(']')
                .ok_or_else(|| anyhow!("unclosed index in reference \"{}\"", expr))?;
            let index = stripped[..end]
                .parse::<usize>()
                .with_context(|| format!("invalid index in reference \"{}\"", expr))?;
            steps.push(Step::Index(index));
            rest = &stripped[end + 1..];
        }
    }
    Ok(steps)
}

/// Resolve `type.name.attr[...]` or `data.type.name.attr[...]`
pub fn resolve_reference(expr: &str, states: &HashMap<String, Value>) -> anyhow::Result<Value> {
    let steps = parse_traversal(expr)?;
    let keys: Vec<&str> = steps
        .iter()
        .map_while(|s| match s {
            Step::Key(k) => Some(k.as_str()),
            Step::Index(_) => None,
        })
        .collect();

    let address_len = if keys.first() == Some(&"data") { 3 } else { 2 };
    if keys.len() < address_len {
        bail!("reference \"{}\" does not name an object", expr);
    }
    let address = keys[..address_len].join(".");
    let mut current = states
        .get(&address)
        .ok_or_else(|| anyhow!("reference to undeclared or not yet created object \"{}\"", address))?;

    for step in &steps[address_len..] {
        current = match step {
            Step::Key(k) => current.get(k.as_str()),
            Step::Index(i) => current.get(*i),
        }
        .filter(|v| !v.is_null())
        .ok_or_else(|| anyhow!("reference \"{}\" has no value", expr))?;
    }
    Ok(current.clone())
}
