//! Script rule selection and command-line token expansion.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;

use crate::config::ScriptConfig;
use crate::exec::runner::{ScriptError, ScriptOutput, ScriptRequest};
use crate::rules::{Rule, RuleSet};

/// Values substituted for `{{source}}`, `{{root}}` and `{{url}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokens {
    pub source: String,
    pub root: String,
    pub url: String,
}

impl Tokens {
    pub fn new(absolute: &Path, root: &Path, url: &str) -> Self {
        Self {
            source: absolute.to_string_lossy().into_owned(),
            root: root.to_string_lossy().into_owned(),
            url: url.to_string(),
        }
    }

    /// Command lines get the source path quoted for the shell.
    pub fn expand_command(&self, template: &str) -> String {
        self.expand(template, &format!("\"{}\"", self.source))
    }

    /// Environment values get it verbatim.
    pub fn expand_value(&self, template: &str) -> String {
        self.expand(template, &self.source)
    }

    fn expand(&self, template: &str, source: &str) -> String {
        template
            .replace("{{source}}", source)
            .replace("{{root}}", &self.root)
            .replace("{{url}}", &self.url)
    }
}

/// First script rule matching the absolute path, with `/` separators.
pub fn select<'a>(rules: &'a RuleSet, absolute: &Path) -> Option<&'a Rule> {
    if rules.is_empty() {
        return None;
    }
    let subject = absolute.to_string_lossy().replace('\\', "/");
    rules
        .iter()
        .find(|rule| rule.config().command.is_some() && rule.test(&subject))
}

/// Build the invocation for `rule` against one file.
pub fn prepare(
    rule: &Rule,
    absolute: &Path,
    tokens: &Tokens,
    stdin: Bytes,
    limits: &ScriptConfig,
) -> Option<ScriptRequest> {
    let config = rule.config();
    let command = tokens.expand_command(config.command.as_deref()?);
    let env = config.env.as_ref().map(|env| {
        env.iter()
            .map(|(key, value)| (key.clone(), tokens.expand_value(value)))
            .collect()
    });

    Some(ScriptRequest {
        command,
        cwd: absolute.parent().unwrap_or(absolute).to_path_buf(),
        env,
        stdin,
        timeout: Duration::from_secs(limits.timeout_secs),
        max_buffer: limits.max_buffer_bytes,
    })
}

/// Stdout when non-empty, else stderr.
pub fn response_body(output: ScriptOutput) -> Result<Bytes, ScriptError> {
    if !output.stdout.is_empty() {
        Ok(output.stdout)
    } else if !output.stderr.is_empty() {
        Ok(output.stderr)
    } else {
        Err(ScriptError::NoOutput)
    }
}
