//! Line editor thread
//!
//! rustyline blocks the calling thread while it reads, so the editor lives
//! on its own thread and serves one read request at a time. The async side
//! sends a prompt and awaits the reply, which lets the REPL keep polling the
//! evaluation while a line is being typed.

use std::future::Future;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use anyhow::{anyhow, Context};
use rustyline::config::Config;
use rustyline::error::ReadlineError;
use rustyline::{CompletionType, DefaultEditor, EditMode};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::util::config::ReplConfig;

/// What a read produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    Line(String),
    /// Ctrl-C
    Interrupted,
    /// Ctrl-D
    Eof,
}

struct ReadRequest {
    prompt: String,
    reply: oneshot::Sender<anyhow::Result<EditorEvent>>,
}

/// Cloneable handle for issuing reads
#[derive(Clone)]
pub struct EditorHandle {
    requests: std_mpsc::Sender<ReadRequest>,
}

impl EditorHandle {
    /// Queue a read with `prompt`. The returned future does not borrow the
    /// handle.
    pub fn read_line(
        &self,
        prompt: impl Into<String>,
    ) -> impl Future<Output = anyhow::Result<EditorEvent>> + 'static {
        let (reply, response) = oneshot::channel();
        let sent = self.requests.send(ReadRequest {
            prompt: prompt.into(),
            reply,
        });
        async move {
            sent.map_err(|_| anyhow!("line editor thread stopped"))?;
            response.await.context("line editor thread stopped")?
        }
    }
}

/// Owns the editor thread; saves history when shut down
pub struct LineEditor {
    handle: EditorHandle,
    thread: Option<JoinHandle<()>>,
}

impl LineEditor {
    /// Start the editor thread, failing if the terminal cannot be set up.
    pub fn spawn(config: &ReplConfig) -> anyhow::Result<Self> {
        let (requests, inbox) = std_mpsc::channel::<ReadRequest>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<()>>();
        let config = config.clone();

        let thread = std::thread::Builder::new()
            .name("quill-editor".to_string())
            .spawn(move || {
                let mut editor = match build_editor(&config) {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                serve(&mut editor, inbox);
                save_history(&mut editor, config.history_file.as_ref());
            })
            .context("failed to spawn line editor thread")?;

        ready_rx
            .recv()
            .context("line editor thread exited during startup")??;

        Ok(Self {
            handle: EditorHandle { requests },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> EditorHandle {
        self.handle.clone()
    }

    /// Stop the thread once every handle is gone and wait for it.
    pub fn shutdown(mut self) {
        let thread = self.thread.take();
        drop(self);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("line editor thread panicked");
            }
        }
    }
}

fn build_editor(config: &ReplConfig) -> anyhow::Result<DefaultEditor> {
    let rl_config = Config::builder()
        .history_ignore_space(true)
        .max_history_size(config.history_size)
        .context("invalid history size")?
        .completion_type(CompletionType::List)
        .edit_mode(if config.vi_mode {
            EditMode::Vi
        } else {
            EditMode::Emacs
        })
        .build();

    let mut editor = DefaultEditor::with_config(rl_config).context("failed to initialise line editor")?;

    // Load history if file exists
    if let Some(history_file) = &config.history_file {
        if history_file.exists() {
            if let Err(err) = editor.load_history(history_file) {
                debug!(error = %err, "could not load history");
            }
        }
    }
    Ok(editor)
}

fn serve(
    editor: &mut DefaultEditor,
    inbox: std_mpsc::Receiver<ReadRequest>,
) {
    while let Ok(request) = inbox.recv() {
        let event = match editor.readline(&request.prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = editor.add_history_entry(line.as_str());
                }
                Ok(EditorEvent::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(EditorEvent::Interrupted),
            Err(ReadlineError::Eof) => Ok(EditorEvent::Eof),
            Err(err) => Err(anyhow!("readline error: {}", err)),
        };
        if request.reply.send(event).is_err() {
            debug!("read abandoned by caller");
        }
    }
}

fn save_history(
    editor: &mut DefaultEditor,
    history_file: Option<&PathBuf>,
) {
    let Some(history_file) = history_file else {
        return;
    };
    if let Some(parent) = history_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(err) = editor.save_history(history_file) {
        warn!(error = %err, path = %history_file.display(), "could not save history");
    }
}
