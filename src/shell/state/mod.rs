//! Shared shell state: the alias table and the session history.
//!
//! Both live behind one mutex. The parallel runner executes commands on
//! worker threads that resolve aliases while the main loop may be defining
//! new ones, so every access goes through the same lock.

use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use super::syntax;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AliasError {
    #[error("alias: missing '=' in definition")]
    MissingEquals,
    #[error("alias: empty name")]
    EmptyName,
    #[error("alias: empty value")]
    EmptyValue,
}

struct Tables {
    aliases: BTreeMap<String, String>,
    history: Vec<String>,
}

pub struct ShellState {
    tables: Mutex<Tables>,
}

impl ShellState {
    pub fn new() -> Self {
        ShellState {
            tables: Mutex::new(Tables {
                aliases: BTreeMap::new(),
                history: Vec::new(),
            }),
        }
    }

    /// Define an alias from the raw assignment text after the `alias` word,
    /// e.g. `ll='ls -l'`. The name is trimmed; if the value is single-quoted,
    /// exactly one leading and one trailing quote character are removed (not
    /// balanced-quote parsing). Redefinition overwrites.
    pub fn define_alias(&self, raw: &str) -> Result<(), AliasError> {
        let eq = raw.find('=').ok_or(AliasError::MissingEquals)?;
        let name = raw[..eq].trim();
        let mut value = raw[eq + 1..].to_string();
        if value.starts_with('\'') {
            value.remove(0);
        }
        if value.ends_with('\'') {
            value.pop();
        }
        if name.is_empty() {
            return Err(AliasError::EmptyName);
        }
        if value.is_empty() {
            return Err(AliasError::EmptyValue);
        }
        let mut tables = self.tables.lock().expect("state lock poisoned");
        tables.aliases.insert(name.to_string(), value);
        Ok(())
    }

    /// Snapshot of all definitions, sorted by name.
    pub fn aliases(&self) -> Vec<(String, String)> {
        let tables = self.tables.lock().expect("state lock poisoned");
        tables
            .aliases
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    /// Expand the leading token in place if it names an alias: the alias
    /// value is tokenized and replaces token 0, with the original tokens 1..
    /// appended unchanged. Exactly one level deep — the replacement's own
    /// first token is never looked up again. Returns whether an expansion
    /// happened.
    pub fn resolve_alias(&self, tokens: &mut Vec<String>) -> bool {
        let first = match tokens.first() {
            Some(t) => t.clone(),
            None => return false,
        };
        let replacement = {
            let tables = self.tables.lock().expect("state lock poisoned");
            match tables.aliases.get(&first) {
                Some(v) => v.clone(),
                None => return false,
            }
        };
        let mut expanded = syntax::tokenize(&replacement);
        expanded.extend(tokens.drain(..).skip(1));
        *tokens = expanded;
        true
    }

    pub fn record_history(&self, line: &str) {
        let mut tables = self.tables.lock().expect("state lock poisoned");
        tables.history.push(line.to_string());
    }

    pub fn history(&self) -> Vec<String> {
        let tables = self.tables.lock().expect("state lock poisoned");
        tables.history.clone()
    }
}
