//! The reader's mutable grammar tables (§4.1). Exposed to the evaluator
//! only through the narrow `add_*`/`merge` methods here — never as raw
//! mutable maps — per §9's "mutable grammar from the evaluator" note.

use std::collections::{HashMap, HashSet};

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Left,
    Right,
}

/// Every switch table the lexer/parser consult, independently mutable.
#[derive(Clone)]
pub struct Switches {
    /// User-defined token type -> regex, tried in declaration order and at
    /// the highest lexical priority.
    tokens: Vec<(String, Regex)>,
    symbols: HashSet<String>,
    symbol_regex: Regex,
    prefixes: HashSet<String>,
    keywords: HashSet<String>,
    precedence: HashMap<String, (Assoc, i64)>,
    pub guard_precedence: i64,
}

impl Switches {
    pub fn new() -> Switches {
        let mut switches = Switches {
            tokens: Vec::new(),
            symbols: HashSet::new(),
            symbol_regex: Regex::new("$^").unwrap(),
            prefixes: HashSet::new(),
            keywords: HashSet::new(),
            precedence: HashMap::new(),
            guard_precedence: 0,
        };
        for symbol in [
            "->", "=>", "(", ")", "{", "}", "[", "]", "=", ",", "!", "_", ".", "*", "+",
        ] {
            switches.symbols.insert(symbol.to_string());
        }
        for keyword in [
            "division", "if", "else", "case", "expect", "needs", "hidden", "exposed", "ret",
            "secret", "obj", "umbrella", "for", "new",
        ] {
            switches.keywords.insert(keyword.to_string());
        }
        switches.update_symbol_regex();
        switches
    }

    pub fn tokens(&self) -> &[(String, Regex)] {
        &self.tokens
    }

    pub fn is_keyword(&self, spelling: &str) -> bool {
        self.keywords.contains(spelling)
    }

    pub fn is_prefix(&self, kind: &str) -> bool {
        self.prefixes.contains(kind)
    }

    pub fn precedence_of(&self, kind: &str) -> Option<(Assoc, i64)> {
        self.precedence.get(kind).copied()
    }

    pub fn symbol_regex(&self) -> &Regex {
        &self.symbol_regex
    }

    pub fn add_token(&mut self, kind: impl Into<String>, pattern: &str) -> Result<(), String> {
        let anchored = format!("^(?:{})", pattern);
        let regex = Regex::new(&anchored).map_err(|e| e.to_string())?;
        self.tokens.push((kind.into(), regex));
        Ok(())
    }

    pub fn add_symbol(&mut self, symbol: impl Into<String>) {
        self.symbols.insert(symbol.into());
        self.update_symbol_regex();
    }

    /// A non-alphabetic prefix type (e.g. a bare symbol used as a prefix
    /// operator) also needs to lex at all, so it is folded into `symbols`
    /// too -- mirrors the source's `add_prefix`/`add_operator`, which
    /// special-case `not op[0].isalpha()` the same way.
    pub fn add_prefix(&mut self, kind: impl Into<String>) {
        let kind = kind.into();
        if !kind.chars().next().is_some_and(|c| c.is_alphabetic()) {
            self.symbols.insert(kind.clone());
            self.update_symbol_regex();
        }
        self.prefixes.insert(kind);
    }

    pub fn add_keyword(&mut self, spelling: impl Into<String>) {
        self.keywords.insert(spelling.into());
    }

    pub fn add_operator(&mut self, kind: impl Into<String>, assoc: Assoc, precedence: i64) {
        let kind = kind.into();
        if !kind.chars().next().is_some_and(|c| c.is_alphabetic()) {
            self.symbols.insert(kind.clone());
            self.update_symbol_regex();
        }
        self.precedence.insert(kind, (assoc, precedence));
    }

    /// Rebuilds the combined symbol regex: escape each literal, sort by
    /// descending length (so e.g. `->` is tried before `-`), join with
    /// alternation.
    fn update_symbol_regex(&mut self) {
        let mut symbols: Vec<&String> = self.symbols.iter().collect();
        symbols.sort_by(|a, b| b.len().cmp(&a.len()));
        let joined = symbols
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = if joined.is_empty() {
            "$^".to_string()
        } else {
            format!("^(?:{})", joined)
        };
        self.symbol_regex = Regex::new(&pattern).expect("combined symbol regex must compile");
    }

    /// Union-updates every table from `other` into `self`. Used when a
    /// `needs` import brings in a module that defined new operators.
    pub fn merge(&mut self, other: &Switches) {
        for (kind, _) in &other.tokens {
            if !self.tokens.iter().any(|(k, _)| k == kind) {
                if let Some((_, regex)) = other.tokens.iter().find(|(k, _)| k == kind) {
                    self.tokens.push((kind.clone(), regex.clone()));
                }
            }
        }
        self.symbols.extend(other.symbols.iter().cloned());
        self.prefixes.extend(other.prefixes.iter().cloned());
        self.keywords.extend(other.keywords.iter().cloned());
        for (kind, value) in &other.precedence {
            self.precedence.entry(kind.clone()).or_insert(*value);
        }
        self.update_symbol_regex();
    }
}

impl Default for Switches {
    fn default() -> Switches {
        Switches::new()
    }
}
