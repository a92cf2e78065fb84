//! State of an interactive chat: the attached image and the transcript.

use anyhow::{bail, Context, Result};
use foodfinder_agents::ChatMessage;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

pub const UPLOAD_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Uploads older than this are deleted when a new one arrives
pub const UPLOAD_MAX_AGE: Duration = Duration::from_secs(3600);

/// Copy an image into the temp directory as `upload_<unix-ts>.<ext>`.
///
/// Stale uploads are removed first.
pub fn stage_upload(source: &Path, temp_dir: &Path, timestamp: i64) -> Result<PathBuf> {
    let extension = source
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "Unsupported image type '{}'. Use one of: {}",
            source.display(),
            UPLOAD_EXTENSIONS.join(", ")
        );
    }
    if !source.is_file() {
        bail!("Image not found: {}", source.display());
    }

    fs::create_dir_all(temp_dir)
        .with_context(|| format!("Failed to create {}", temp_dir.display()))?;
    let removed = clean_stale_uploads(temp_dir, SystemTime::now(), UPLOAD_MAX_AGE);
    if removed > 0 {
        debug!("Removed {} stale uploads", removed);
    }

    let target = temp_dir.join(format!("upload_{}.{}", timestamp, extension));
    fs::copy(source, &target)
        .with_context(|| format!("Failed to copy {} to {}", source.display(), target.display()))?;
    Ok(target)
}

/// Delete `upload_*` files last modified more than `max_age` before `now`
pub fn clean_stale_uploads(temp_dir: &Path, now: SystemTime, max_age: Duration) -> usize {
    let Ok(entries) = fs::read_dir(temp_dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let is_upload = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with("upload_"))
            .unwrap_or(false);
        if !is_upload {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if matches!(age, Some(age) if age > max_age) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// The prompt sent to the agent, mentioning the attached image if any
pub fn enhance_prompt(prompt: &str, image: Option<&Path>) -> String {
    match image {
        Some(path) => format!("{}\n\n[Image uploaded: {}]", prompt, path.display()),
        None => prompt.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub question: String,
    pub image: Option<PathBuf>,
    pub answer: String,
}

#[derive(Debug, Default)]
pub struct ChatSession {
    attachment: Option<PathBuf>,
    turns: Vec<Turn>,
}

impl ChatSession {
    pub fn attach(&mut self, path: PathBuf) {
        self.attachment = Some(path);
    }

    pub fn attachment(&self) -> Option<&Path> {
        self.attachment.as_deref()
    }

    /// Prompt for the next question, consuming the attachment
    pub fn take_prompt(&mut self, question: &str) -> (String, Option<PathBuf>) {
        let image = self.attachment.take();
        (enhance_prompt(question, image.as_deref()), image)
    }

    pub fn record(&mut self, question: &str, image: Option<PathBuf>, answer: &str) {
        self.turns.push(Turn {
            question: question.to_string(),
            image,
            answer: answer.to_string(),
        });
    }

    /// Record the outcome of a question and return the text to show.
    ///
    /// Failed turns are shown but kept out of the history.
    pub fn finish<E: Display>(
        &mut self,
        question: &str,
        image: Option<PathBuf>,
        outcome: std::result::Result<String, E>,
    ) -> String {
        match outcome {
            Ok(answer) => {
                self.record(question, image, &answer);
                answer
            }
            Err(e) => format!("Error: {}", e),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Earlier turns as chat messages, for follow-up questions
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage::user(enhance_prompt(&turn.question, turn.image.as_deref())),
                    ChatMessage::assistant(turn.answer.clone()),
                ]
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.attachment = None;
        self.turns.clear();
    }
}
