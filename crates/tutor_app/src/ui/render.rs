use std::io::{self, Write};

use tutor_core::{AnimationView, AppViewModel, JobStatus, Role};

/// Prints the conversation incrementally: new messages once, animation lines
/// whenever their rendered text changes.
#[derive(Debug, Default)]
pub struct Renderer {
    printed_messages: usize,
    job_lines: Vec<Vec<String>>,
    awaiting_shown: bool,
    quality_shown: Option<&'static str>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, out: &mut impl Write, view: &AppViewModel) -> io::Result<()> {
        let quality = view.quality.as_str();
        if self.quality_shown.is_some_and(|shown| shown != quality) {
            writeln!(out, "* quality set to {quality}")?;
        }
        self.quality_shown = Some(quality);

        for (index, message) in view.messages.iter().enumerate() {
            if index >= self.printed_messages {
                let speaker = match message.role {
                    Role::User => "you",
                    Role::Assistant => "tutor",
                };
                writeln!(out, "{speaker}> {}", message.content)?;
                for question in &message.follow_ups {
                    writeln!(out, "    ? {question}")?;
                }
                self.job_lines.push(Vec::new());
            }

            let lines = &mut self.job_lines[index];
            for (slot, animation) in message.animations.iter().enumerate() {
                let line = animation_line(animation);
                match lines.get_mut(slot) {
                    Some(previous) if *previous == line => {}
                    Some(previous) => {
                        writeln!(out, "{line}")?;
                        *previous = line;
                    }
                    None => {
                        writeln!(out, "{line}")?;
                        lines.push(line);
                    }
                }
            }
        }
        self.printed_messages = view.messages.len();

        if view.awaiting_reply && !self.awaiting_shown {
            writeln!(out, "  (the tutor is thinking...)")?;
        }
        self.awaiting_shown = view.awaiting_reply;
        out.flush()
    }
}

fn animation_line(animation: &AnimationView) -> String {
    let title = animation.title.as_deref().unwrap_or("Visualization");
    let mut line = format!("  [{}] {title}: ", animation.job_id);
    if animation.stale {
        line.push_str("status unknown");
    } else {
        line.push_str(animation.status.as_str());
    }
    match animation.status {
        JobStatus::Completed => {
            if let Some(url) = &animation.video_url {
                line.push_str(&format!(" -> {url}"));
            }
        }
        JobStatus::Failed => {
            if let Some(error) = &animation.error {
                line.push_str(&format!(" ({error})"));
            }
        }
        JobStatus::Queued | JobStatus::Rendering => {}
    }
    if let Some(notice) = &animation.notice {
        line.push_str(&format!(" [{notice}]"));
    }
    if animation.can_regenerate {
        line.push_str(&format!("  /regen {}", animation.job_id));
    }
    line
}
