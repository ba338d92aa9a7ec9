use std::io::Write as _;
use std::process::{Command, Stdio};

use crate::foundation::error::{DataraceError, DataraceResult};
use crate::scene::dataset::Dataset;

/// Produces a whole dataset for a free-text topic. Called off the tick thread.
pub trait DatasetGenerator: Send + Sync {
    /// Generate a dataset about `topic`. Any failure is [`DataraceError::Generation`].
    fn generate(&self, topic: &str) -> DataraceResult<Dataset>;
}

const INSTRUCTIONS: &str = "\
You are a data visualization expert. Generate strict JSON data for a bar chart race animation.
Output one JSON object with:
1. title: a catchy title.
2. subtitle: a descriptive subtitle.
3. source: a credible source for this data.
4. entities: an array of {id, label, color, icon} competitors. Use distinct, high contrast hex
   colors. icon is an optional image URL; omit it when unknown.
5. timeline: an array of time points, each {label, values} where values maps entity id to a
   number.
Span a reasonable timeframe for the topic (10-20 points for yearly data) with realistic values.
Do not explain. Return JSON only.";

/// Prompt text sent to a generator for `topic`.
pub fn generation_prompt(topic: &str) -> String {
    format!("{INSTRUCTIONS}\n\nGenerate a bar chart race dataset for: {topic}.\n")
}

/// Runs an external program and parses its stdout as a dataset document.
///
/// The program receives [`generation_prompt`] on stdin and the bare topic as its last argument.
#[derive(Clone, Debug)]
pub struct CommandGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    /// Run `program` with leading `args`.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl DatasetGenerator for CommandGenerator {
    #[tracing::instrument(skip(self), fields(program = %self.program))]
    fn generate(&self, topic: &str) -> DataraceResult<Dataset> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(DataraceError::generation("topic must not be empty"));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(topic)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DataraceError::generation(format!("failed to spawn '{}': {e}", self.program))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A generator that ignores stdin may close it early.
            if let Err(e) = stdin.write_all(generation_prompt(topic).as_bytes()) {
                tracing::debug!(error = %e, "generator did not read the prompt");
            }
        }

        let output = child.wait_with_output().map_err(|e| {
            DataraceError::generation(format!("failed to wait for '{}': {e}", self.program))
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DataraceError::generation(format!(
                "'{}' exited with status {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let ds = parse_generated(&text)?;
        tracing::info!(
            title = %ds.title,
            entities = ds.entities.len(),
            snapshots = ds.timeline.len(),
            "dataset generated"
        );
        Ok(ds)
    }
}

/// Parse generator output, tolerating a surrounding markdown code fence.
pub fn parse_generated(text: &str) -> DataraceResult<Dataset> {
    let body = strip_code_fence(text.trim());
    if body.is_empty() {
        return Err(DataraceError::generation("generator returned no output"));
    }
    Dataset::from_json_str(body).map_err(|e| {
        DataraceError::generation(format!("generator returned an invalid dataset: {e}"))
    })
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
#[path = "../../tests/unit/generate/command.rs"]
mod tests;
