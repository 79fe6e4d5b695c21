//! Namespace traversal
//!
//! Nodes are plain paths. Descending with [`Namespace::child`] is free;
//! the bridge is only asked once a node is listed or a leaf is read.

use crate::bridge::Bridge;
use crate::class::Class;
use crate::error::{Error, Result};
use crate::function::Function;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The kinds of thing a foreign name can denote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "func")]
    Function,
    #[serde(rename = "class")]
    Class,
    #[serde(rename = "const")]
    Constant,
    #[serde(rename = "global")]
    Global,
}

impl Kind {
    /// Name used on the wire by `resolveName`.
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Function => "func",
            Kind::Class => "class",
            Kind::Constant => "const",
            Kind::Global => "global",
        }
    }

    pub(crate) fn noun(self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::Class => "class",
            Kind::Constant => "constant",
            Kind::Global => "global",
        }
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "func" | "function" => Ok(Kind::Function),
            "class" => Ok(Kind::Class),
            "const" | "constant" => Ok(Kind::Constant),
            "global" => Ok(Kind::Global),
            other => Err(format!("unknown kind '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Namespace {
    bridge: Bridge,
    path: String,
}

impl Namespace {
    pub(crate) fn new(bridge: Bridge, path: &str) -> Self {
        let path = path
            .trim_matches(|c| bridge.config().separator.contains(c))
            .to_string();
        Self { bridge, path }
    }

    /// Fully-qualified path without leading or trailing separators.
    /// Empty for the root namespace.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn qualify(&self, name: &str) -> String {
        let separator = &self.bridge.config().separator;
        let name = name.trim_start_matches(separator.as_str());
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", self.path, separator, name)
        }
    }

    pub fn child(&self, segment: &str) -> Namespace {
        Namespace::new(self.bridge.clone(), &self.qualify(segment))
    }

    /// Functions, classes and constants declared directly in this namespace.
    pub fn entries(&self) -> Result<Vec<String>> {
        let separator = &self.bridge.config().separator;
        let listing = self.bridge.listing(&self.path)?;
        Ok(listing
            .iter()
            .filter(|name| !name.contains(separator.as_str()))
            .cloned()
            .collect())
    }

    /// Names of the namespaces nested directly below this one.
    pub fn children(&self) -> Result<Vec<String>> {
        let separator = &self.bridge.config().separator;
        let listing = self.bridge.listing(&self.path)?;
        let mut children: Vec<String> = Vec::new();
        for name in listing.iter() {
            if let Some((head, _)) = name.split_once(separator.as_str()) {
                if !children.iter().any(|c| c == head) {
                    children.push(head.to_string());
                }
            }
        }
        Ok(children)
    }

    /// Look up a leaf, letting the configured precedence pick the kind.
    pub fn get(&self, name: &str) -> Result<Value> {
        self.bridge.resolve(&self.qualify(name), None)
    }

    pub fn get_kind(&self, name: &str, kind: Kind) -> Result<Value> {
        self.bridge.resolve(&self.qualify(name), Some(kind))
    }

    pub fn function(&self, name: &str) -> Result<Function> {
        match self.get_kind(name, Kind::Function)? {
            Value::Function(function) => Ok(function),
            other => Err(Error::malformed(format!("expected a function, got {}", other.type_name()))),
        }
    }

    pub fn class(&self, name: &str) -> Result<Class> {
        match self.get_kind(name, Kind::Class)? {
            Value::Class(class) => Ok(class),
            other => Err(Error::malformed(format!("expected a class, got {}", other.type_name()))),
        }
    }
}
