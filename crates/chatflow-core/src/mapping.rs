//! Request-matching guards shared by routes, scenario transitions and
//! advanced-scenario active conditions.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;

use crate::error::{FlowError, Result};
use crate::request::UpdateRequest;
use crate::types::{MessageType, RequestType};

/// Pattern that matches any text, including a missing one.
pub const CATCH_ALL: &str = "**";

/// A guard over the request type, message shape and text of an update.
///
/// Pattern syntax: literal text matches exactly, `*` matches any run of
/// characters and `{name}` captures a non-empty run without whitespace.
/// `**` (or no pattern) matches everything.
#[derive(Clone)]
pub struct RequestMapping {
    pattern: Option<CompiledPattern>,
    request_type: Option<RequestType>,
    message_types: Vec<MessageType>,
    exclusive_message_type: bool,
}

#[derive(Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
    placeholders: Vec<String>,
    has_glob: bool,
}

impl RequestMapping {
    /// Matches every request.
    pub fn any() -> Self {
        Self {
            pattern: None,
            request_type: None,
            message_types: Vec::new(),
            exclusive_message_type: false,
        }
    }

    /// Matches requests whose text fits `pattern`.
    pub fn text(pattern: &str) -> Result<Self> {
        let mut mapping = Self::any();
        if pattern != CATCH_ALL {
            mapping.pattern = Some(CompiledPattern::compile(pattern)?);
        }
        Ok(mapping)
    }

    /// Shorthand for a `/command` on a plain message.
    pub fn command(name: &str) -> Result<Self> {
        let name = name.trim_start_matches('/');
        Ok(Self::text(&format!("/{name}"))?
            .with_request_type(RequestType::Message)
            .with_message_type(MessageType::Command))
    }

    pub fn with_request_type(mut self, request_type: RequestType) -> Self {
        self.request_type = Some(request_type);
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        if !self.message_types.contains(&message_type) {
            self.message_types.push(message_type);
        }
        self
    }

    /// Require the request's message types to equal this mapping's set
    /// instead of merely overlapping it.
    pub fn exclusive(mut self) -> Self {
        self.exclusive_message_type = true;
        self
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_ref().map(|p| p.source.as_str()).unwrap_or(CATCH_ALL)
    }

    pub fn matches(&self, request: &UpdateRequest) -> bool {
        self.match_request(request).is_some()
    }

    /// Match against a request, returning the captured template variables.
    pub fn match_request(&self, request: &UpdateRequest) -> Option<HashMap<String, String>> {
        self.match_parts(
            request.request_type(),
            request.message_types(),
            request.text(),
        )
    }

    pub fn match_parts(
        &self,
        request_type: RequestType,
        message_types: &[MessageType],
        text: Option<&str>,
    ) -> Option<HashMap<String, String>> {
        if let Some(expected) = self.request_type {
            if expected != request_type {
                return None;
            }
        }

        if !self.message_types.is_empty() {
            let ok = if self.exclusive_message_type {
                message_types.len() == self.message_types.len()
                    && message_types.iter().all(|t| self.message_types.contains(t))
            } else {
                message_types.iter().any(|t| self.message_types.contains(t))
            };
            if !ok {
                return None;
            }
        }

        match &self.pattern {
            None => Some(HashMap::new()),
            Some(pattern) => pattern.captures(text?),
        }
    }

    /// Higher is more specific. Used to order competing routes.
    pub fn specificity(&self) -> u8 {
        let text_score = match &self.pattern {
            None => 0,
            Some(p) if p.has_glob => 1,
            Some(p) if !p.placeholders.is_empty() => 2,
            Some(_) => 3,
        };
        let type_score = u8::from(self.request_type.is_some()) + u8::from(!self.message_types.is_empty());
        text_score * 4 + type_score
    }
}

impl Default for RequestMapping {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Debug for RequestMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestMapping")
            .field("pattern", &self.pattern())
            .field("request_type", &self.request_type)
            .field("message_types", &self.message_types)
            .field("exclusive_message_type", &self.exclusive_message_type)
            .finish()
    }
}

impl CompiledPattern {
    fn compile(source: &str) -> Result<Self> {
        let mut expr = String::from("^");
        let mut placeholders = Vec::new();
        let mut has_glob = false;
        let mut rest = source;

        while let Some(idx) = rest.find(['*', '{']) {
            expr.push_str(&regex::escape(&rest[..idx]));
            let tail = &rest[idx..];
            if let Some(after) = tail.strip_prefix('*') {
                expr.push_str("(?s:.*)");
                has_glob = true;
                rest = after;
                continue;
            }
            match tail.find('}') {
                Some(end) if end > 1 => {
                    placeholders.push(tail[1..end].to_string());
                    expr.push_str(r"(\S+)");
                    rest = &tail[end + 1..];
                }
                Some(_) => {
                    return Err(FlowError::Config(format!(
                        "empty placeholder name in pattern: {source}"
                    )))
                }
                None => {
                    return Err(FlowError::Config(format!(
                        "unterminated placeholder in pattern: {source}"
                    )))
                }
            }
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| FlowError::Config(format!("invalid pattern {source}: {e}")))?;

        Ok(Self {
            source: source.to_string(),
            regex,
            placeholders,
            has_glob,
        })
    }

    fn captures(&self, text: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(text)?;
        // Globs compile to non-capturing groups, so groups 1..n are the
        // placeholders in declaration order.
        let vars = self
            .placeholders
            .iter()
            .zip(caps.iter().skip(1))
            .filter_map(|(name, group)| group.map(|g| (name.clone(), g.as_str().to_string())))
            .collect();
        Some(vars)
    }
}
